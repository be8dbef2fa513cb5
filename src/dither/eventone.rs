//! # Eventone
//!
//! Error diffusion in the segment-position domain, steered by the distance
//! to the nearest dot of the same lane.
//!
//! ## Decision
//!
//! Every pixel adds twice its segment position to a running carry (plus
//! the error diffused from the row above, stored in sixteenths). The upper
//! ink prints when the carry, corrected by the distance term, crosses half
//! scale:
//!
//! ```text
//! carry    += 2 × rangepoint + error / 16
//! inkspot   = carry − rangepoint
//! inkspot  += r² × aspect − C1 × 65535 / rangepoint
//! inkspot ≥ 32768  →  upper ink, carry −= 2 × 65535
//! ```
//!
//! Dots far from their neighbours get a boost, dots crowding a neighbour a
//! penalty. Light tones therefore come out as evenly spaced dots instead of
//! the worms of plain error diffusion.
//!
//! ## Distance Field
//!
//! Squared distances are tracked incrementally: moving one column adds
//! `dx2` and grows it by `2·ax`, moving one row adds `dy2` and grows it by
//! `2·ay`. The field holds the running distance along the row plus the
//! value left in every column by the row above.
//!
//! ```text
//!   row above   · · ● · · · ·        column record, stepped down one row
//!   this row    ● · · · ◆            running distance, stepped one column
//!                       ▲
//!                  min of both
//! ```

use crate::channel::{Channel, ChannelRegistry};
use crate::ink::range::{MAX_VALUE, find_segment};
use crate::ink::shade::split_shades;
use crate::output::{ChannelRow, ScanlineBuffers};

use super::ed::{ErrorDiffusion, ErrorRows, MAX_SPREAD};
use super::row::{Geometry, columns, direction};

/// Spacing constant of the distance term.
pub const EVEN_C1: i64 = 256;

/// `EVEN_C1 × √3 / 2`: hexagonal packing factor.
pub const EVEN_C2: i64 = 221;

const DISTANCE_CAP: i32 = 1 << 20;

/// Largest resolution ratio the distance term distinguishes; steeper grids
/// share its weights.
pub const MAX_ASPECT_RATIO: u32 = 16;

/// Sampling-grid geometry of the distance term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aspect {
    /// Squared-distance weight of one column step
    pub ax: i32,
    /// Squared-distance weight of one row step
    pub ay: i32,
    /// Scale of `r²` in the threshold correction
    pub weight: i64,
    /// Error share sent straight down, in sixteenths
    pub down: i32,
    /// Error share sent down and behind, in sixteenths
    pub behind: i32,
}

impl Aspect {
    pub fn new(x_aspect: u32, y_aspect: u32) -> Self {
        let x_aspect = x_aspect.max(1);
        let y_aspect = y_aspect.max(1);
        let xa = (x_aspect / y_aspect).clamp(1, MAX_ASPECT_RATIO) as i32;
        let ya = (y_aspect / x_aspect).clamp(1, MAX_ASPECT_RATIO) as i32;
        let (down, behind) = if xa >= 4 {
            (2, 1)
        } else if xa >= 2 {
            (2, 2)
        } else if ya >= 2 {
            (4, 3)
        } else {
            (3, 2)
        };
        Self {
            ax: ya * ya,
            ay: xa * xa,
            weight: EVEN_C2 / (xa * ya) as i64,
            down,
            behind,
        }
    }
}

/// Incremental squared distance to the nearest dot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Distance {
    pub r_sq: i32,
    pub dx2: i32,
    pub dy2: i32,
}

impl Distance {
    /// No dot anywhere near.
    pub fn far(aspect: &Aspect) -> Self {
        Self {
            r_sq: DISTANCE_CAP,
            dx2: aspect.ax,
            dy2: aspect.ay,
        }
    }

    /// A dot right here.
    pub fn at_dot(aspect: &Aspect) -> Self {
        Self {
            r_sq: 0,
            dx2: aspect.ax,
            dy2: aspect.ay,
        }
    }

    #[inline]
    fn step_x(&mut self, aspect: &Aspect) {
        self.r_sq = (self.r_sq + self.dx2).min(DISTANCE_CAP);
        self.dx2 = (self.dx2 + 2 * aspect.ax).min(DISTANCE_CAP);
    }

    #[inline]
    fn stepped_y(self, aspect: &Aspect) -> Self {
        Self {
            r_sq: (self.r_sq + self.dy2).min(DISTANCE_CAP),
            dx2: self.dx2,
            dy2: (self.dy2 + 2 * aspect.ay).min(DISTANCE_CAP),
        }
    }
}

/// Running distance plus the per-column record of the row above.
#[derive(Debug, Clone)]
pub struct DistanceField {
    running: Distance,
    columns: Vec<Distance>,
}

impl DistanceField {
    pub fn new(width: usize, aspect: &Aspect) -> Self {
        Self {
            running: Distance::far(aspect),
            columns: vec![Distance::far(aspect); width],
        }
    }

    /// Step to column `x` and return the nearest-dot distance there.
    #[inline]
    pub fn advance(&mut self, x: usize, aspect: &Aspect) -> i32 {
        self.running.step_x(aspect);
        let above = self.columns[x].stepped_y(aspect);
        if above.r_sq < self.running.r_sq {
            self.running = above;
        }
        self.running.r_sq
    }

    /// Record the state left at column `x`, marking a dot if one printed.
    #[inline]
    pub fn settle(&mut self, x: usize, dot: bool, aspect: &Aspect) {
        if dot {
            self.running = Distance::at_dot(aspect);
        }
        self.columns[x] = self.running;
    }

    pub fn begin_row(&mut self, aspect: &Aspect) {
        self.running = Distance::far(aspect);
    }

    pub fn reset(&mut self, aspect: &Aspect) {
        self.running = Distance::far(aspect);
        self.columns.fill(Distance::far(aspect));
    }

    pub fn column(&self, x: usize) -> Option<&Distance> {
        self.columns.get(x)
    }

    pub fn is_reset(&self, aspect: &Aspect) -> bool {
        let far = Distance::far(aspect);
        self.running == far && self.columns.iter().all(|d| *d == far)
    }
}

/// Carried error in sixteenths back to the segment-position scale, rounded.
#[inline]
pub fn round16(error: i32) -> i32 {
    (error + 8) / 16
}

/// Distance correction of the decision value.
///
/// Saturated inputs pass straight through so carried error alone can fire
/// a dot on a zero input.
#[inline]
pub fn eventone_adjust(inkspot: i32, r_sq: i32, desired: u32, weight: i64) -> i32 {
    if inkspot <= 0 {
        0
    } else if inkspot >= MAX_VALUE as i32 {
        MAX_VALUE as i32
    } else if desired == 0 {
        0
    } else {
        let adjusted = inkspot as i64 + r_sq as i64 * weight - EVEN_C1 * 65535 / desired as i64;
        adjusted.clamp(0, MAX_VALUE as i64) as i32
    }
}

/// Eventone state of one lane.
#[derive(Debug, Clone)]
pub struct EventoneLane {
    errors: ErrorRows,
    distance: DistanceField,
    carry: i32,
}

impl EventoneLane {
    fn new(width: usize, aspect: &Aspect) -> Self {
        Self {
            errors: ErrorRows::new(width),
            distance: DistanceField::new(width, aspect),
            carry: 0,
        }
    }

    pub fn errors(&self) -> &ErrorRows {
        &self.errors
    }

    fn reset(&mut self, aspect: &Aspect) {
        self.errors.clear();
        self.distance.reset(aspect);
        self.carry = 0;
    }

    fn is_reset(&self, aspect: &Aspect) -> bool {
        self.carry == 0 && self.errors.is_zero() && self.distance.is_reset(aspect)
    }
}

/// Eventone state of a job. Channels without explicit shades go through
/// the embedded error diffusion instead.
#[derive(Debug, Clone)]
pub struct Eventone {
    aspect: Aspect,
    width: usize,
    lane_count: usize,
    lanes: Option<Vec<EventoneLane>>,
    fallback: ErrorDiffusion,
    amounts: Vec<u32>,
}

impl Eventone {
    pub fn new(aspect: Aspect, fallback: ErrorDiffusion, width: usize, lane_count: usize) -> Self {
        Self {
            aspect,
            width,
            lane_count,
            lanes: None,
            fallback,
            amounts: Vec::new(),
        }
    }

    pub fn lane(&self, lane: usize) -> Option<&EventoneLane> {
        self.lanes.as_ref()?.get(lane)
    }

    pub fn fallback(&self) -> &ErrorDiffusion {
        &self.fallback
    }

    /// Zero every carried error and forget every dot.
    pub fn reset(&mut self) {
        let aspect = self.aspect;
        if let Some(lanes) = &mut self.lanes {
            lanes.iter_mut().for_each(|l| l.reset(&aspect));
        }
        self.fallback.reset();
    }

    /// Whether no lane carries anything from previous rows.
    pub fn is_reset(&self) -> bool {
        let lanes_clear = self
            .lanes
            .as_ref()
            .is_none_or(|lanes| lanes.iter().all(|l| l.is_reset(&self.aspect)));
        let fallback_clear =
            (0..self.lane_count).all(|l| self.fallback.lane(l).is_none_or(ErrorRows::is_zero));
        lanes_clear && fallback_clear
    }

    pub fn dither_row(
        &mut self,
        row: usize,
        channels: &ChannelRegistry,
        geometry: &Geometry,
        samples: &[u16],
        out: &mut ScanlineBuffers,
    ) {
        for (c, channel) in channels.iter().enumerate() {
            let first = channels.lane_offset(c);
            let row_out = out.channel_mut(c);
            if channel.explicit_shades {
                self.dither_channel(row, c, channel, first, geometry, samples, row_out);
            } else {
                self.fallback
                    .dither_channel(row, c, channel, first, geometry, samples, row_out);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn dither_channel(
        &mut self,
        row: usize,
        c: usize,
        channel: &Channel,
        first_lane: usize,
        geometry: &Geometry,
        samples: &[u16],
        out: &mut ChannelRow,
    ) {
        let aspect = self.aspect;
        let (width, lane_count) = (self.width, self.lane_count);
        let lanes = self.lanes.get_or_insert_with(|| {
            (0..lane_count)
                .map(|_| EventoneLane::new(width, &aspect))
                .collect()
        });
        let shades = channel.shades.len();
        let lanes = &mut lanes[first_lane..first_lane + shades];
        for lane in lanes.iter_mut() {
            lane.errors.begin_row(row);
            lane.distance.begin_row(&aspect);
            lane.carry = 0;
        }
        let amounts = &mut self.amounts;
        amounts.resize(shades, 0);

        let dir = direction(row);
        for x in columns(row, geometry.dst_width) {
            let value = channel.adjust(geometry.sample(samples, x, c));
            split_shades(&channel.shades, value, amounts);
            let xi = x + MAX_SPREAD;
            for (s, shade) in channel.shades.iter().enumerate() {
                let lane = &mut lanes[s];
                let r_sq = lane.distance.advance(x, &aspect);

                let (segment, rangepoint) = match find_segment(&shade.ranges, amounts[s]) {
                    Some(i) => (&shade.ranges[i], shade.ranges[i].rangepoint(amounts[s])),
                    None => (&shade.ranges[0], 0),
                };

                let (cur, next) = lane.errors.split_mut();
                lane.carry += 2 * rangepoint as i32 + round16(cur[xi]);
                let inkspot =
                    eventone_adjust(lane.carry - rangepoint as i32, r_sq, rangepoint, aspect.weight);
                let ink = if inkspot >= 32768 {
                    lane.carry -= 2 * MAX_VALUE as i32;
                    segment.upper
                } else {
                    segment.lower
                };
                if ink.prints() {
                    out.fire(ink.subchannel, x, ink.bit_pattern);
                }
                lane.distance.settle(x, ink.prints(), &aspect);

                let v = lane.carry;
                next[xi] += aspect.down * v;
                next[(xi as isize - dir) as usize] += aspect.behind * v;
                lane.carry -= (aspect.down + aspect.behind) * v / 16;
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
