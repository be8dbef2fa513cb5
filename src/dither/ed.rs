//! # Error Diffusion
//!
//! Hybrid error diffusion: the residual of every decision is spread over a
//! triangular footprint on the current and the next row, while the print
//! threshold and the upper/lower ink choice are taken from the dither
//! matrix.
//!
//! ## Scan Order
//!
//! Rows alternate direction (serpentine), so "ahead" on the current row is
//! to the right on even rows and to the left on odd rows.
//!
//! ## Error Scale
//!
//! Carried error is stored at 8× the residual: half of it is deposited on
//! the current row ahead of the pixel, half on the next row around it.
//! Reading it back divides by 8 with truncation toward zero.
//!
//! ```text
//! spread 16 / dense input         narrow footprint (k = 2)
//!
//!        X  4r ──►                        X   2d₁  d₁ ──►
//!       4r                        d   2d  3d  2d   d
//! ```
//!
//! Footprint half-width `k` shrinks as the input gets darker and as the
//! spread parameter grows; it never exceeds the margin around each row.
//!
//! ## Adaptive Hybrid
//!
//! Adaptive channels fall back to ordered thresholding when the undithered
//! base is at or below the adaptive limit. Those pixels neither consume nor
//! create carried error.

use crate::channel::Channel;
use crate::ink::range::{InkDefinition, MAX_VALUE, find_segment};
use crate::ink::shade::{Shade, split_shades};
use crate::output::ChannelRow;

use super::row::{Geometry, columns, direction};

/// Margin on both sides of every error row; bounds the footprint.
pub const MAX_SPREAD: usize = 32;

/// Above this base level the footprint collapses to the two neighbours.
const WIDE_SPREAD_LIMIT: u32 = 2048;

/// Carried error back to the residual scale, truncating toward zero.
///
/// ```
/// use inkdither::dither::ed::div8;
///
/// assert_eq!(div8(9), 1);
/// assert_eq!(div8(-9), -1);
/// assert_eq!(div8(-1), 0);
/// ```
#[inline]
pub fn div8(error: i32) -> i32 {
    if error >= 0 { error >> 3 } else { -((-error) >> 3) }
}

/// Two alternating error rows of one lane.
///
/// Slot `row & 1` holds the error deposited for `row`; the other slot
/// collects deposits for `row + 1`.
#[derive(Debug, Clone)]
pub struct ErrorRows {
    rows: [Vec<i32>; 2],
    current: usize,
}

impl ErrorRows {
    pub fn new(width: usize) -> Self {
        let len = width + 2 * MAX_SPREAD;
        Self {
            rows: [vec![0; len], vec![0; len]],
            current: 0,
        }
    }

    /// Make `row`'s slot current and clear the slot for the next row.
    pub fn begin_row(&mut self, row: usize) {
        self.current = row & 1;
        self.rows[self.current ^ 1].fill(0);
    }

    pub fn current(&self) -> &[i32] {
        &self.rows[self.current]
    }

    pub fn next(&self) -> &[i32] {
        &self.rows[self.current ^ 1]
    }

    /// Both slots, current first.
    pub fn split_mut(&mut self) -> (&mut [i32], &mut [i32]) {
        let [a, b] = &mut self.rows;
        if self.current == 0 {
            (a.as_mut_slice(), b.as_mut_slice())
        } else {
            (b.as_mut_slice(), a.as_mut_slice())
        }
    }

    /// Carried error at output column `x` of the current row.
    #[inline]
    pub fn at(&self, x: usize) -> i32 {
        self.rows[self.current][x + MAX_SPREAD]
    }

    pub fn clear(&mut self) {
        self.rows.iter_mut().for_each(|r| r.fill(0));
    }

    pub fn is_zero(&self) -> bool {
        self.rows.iter().all(|r| r.iter().all(|&e| e == 0))
    }
}

/// Footprint computation for one spread setting.
#[derive(Debug, Clone)]
pub struct Diffusion {
    spread: u32,
    mask: i32,
    offset0: [i32; MAX_SPREAD + 1],
    offset1: [i32; MAX_SPREAD + 1],
}

impl Diffusion {
    pub fn new(spread: u32) -> Self {
        let spread = spread.min(16);
        let mut offset0 = [1; MAX_SPREAD + 1];
        let mut offset1 = [1; MAX_SPREAD + 1];
        for k in 0..=MAX_SPREAD as i32 {
            offset0[k as usize] = (k + 1) * (k + 1);
            offset1[k as usize] = ((k + 1) * k / 2).max(1);
        }
        Self {
            spread,
            mask: (1 << spread) - 1,
            offset0,
            offset1,
        }
    }

    /// Half-width of the footprint for `residual` at base level `base`.
    #[inline]
    pub fn footprint(&self, residual: i32, base: u32) -> usize {
        if self.spread >= 16 || base >= WIDE_SPREAD_LIMIT {
            return 0;
        }
        let scaled = (base << 5) as i32;
        let k = ((MAX_VALUE as i32 - scaled) >> self.spread) as usize
            + usize::from((residual & self.mask) > (scaled & self.mask));
        k.min(MAX_SPREAD)
    }

    /// Spread `residual` from padded index `xi` into both rows.
    pub fn diffuse(
        &self,
        cur: &mut [i32],
        next: &mut [i32],
        xi: usize,
        dir: isize,
        residual: i32,
        base: u32,
    ) {
        let r = residual.min(MAX_VALUE as i32);
        if r == 0 {
            return;
        }
        let ahead = |i: usize| (xi as isize + dir * i as isize) as usize;
        match self.footprint(r, base) {
            0 => {
                cur[ahead(1)] += 4 * r;
                next[xi] += 4 * r;
            }
            1 => {
                cur[ahead(1)] += 4 * r;
                next[xi - 1] += r;
                next[xi + 1] += r;
                next[xi] += 2 * r;
            }
            k => {
                let total = 4 * r;
                let dist = total / self.offset0[k];
                let dist1 = total / self.offset1[k];
                next[xi] += dist * (k as i32 + 1);
                for i in 1..=k {
                    let w = (k + 1 - i) as i32;
                    next[xi - i] += dist * w;
                    next[xi + i] += dist * w;
                    cur[ahead(i)] += dist1 * w;
                }
            }
        }
    }
}

/// Per-job settings of the error-diffusion decision.
#[derive(Debug, Clone, Copy)]
pub struct EdParams {
    pub adaptive: bool,
    pub adaptive_limit: i32,
    pub randomizer_cutoff: u32,
}

/// Randomizer strength after the linear decay above the cutoff.
#[inline]
pub fn effective_randomizer(randomizer: u32, base: u32, cutoff: u32) -> u32 {
    if base <= cutoff || cutoff >= MAX_VALUE {
        randomizer
    } else {
        (randomizer as u64 * (MAX_VALUE - base.min(MAX_VALUE)) as u64
            / (MAX_VALUE - cutoff) as u64) as u32
    }
}

/// One pixel of one lane.
///
/// Returns the residual to diffuse and the ink to print, if any.
pub fn decide(
    params: &EdParams,
    shade: &Shade,
    base: u32,
    adjusted: i32,
    dither_point: u32,
    pick_point: u32,
    randomizer: u32,
) -> (i32, Option<InkDefinition>) {
    if base == 0 {
        return (adjusted, None);
    }
    let Some(index) = find_segment(&shade.ranges, base) else {
        return (adjusted, None);
    };
    let seg = &shade.ranges[index];
    let ordered = params.adaptive && base as i32 <= params.adaptive_limit;
    if !ordered && adjusted <= 0 {
        return (adjusted, None);
    }

    let rangepoint = seg.rangepoint(base);
    let virtual_value = seg.virtual_value(rangepoint) as i64;
    let (value, threshold) = if ordered {
        (base as i64, dither_point as i64 * virtual_value / 65536)
    } else {
        let r = effective_randomizer(randomizer, base, params.randomizer_cutoff) as i64;
        let threshold = if r == 0 {
            virtual_value / 2
        } else {
            let scaled = dither_point as i64 * virtual_value / 65535;
            if r < MAX_VALUE as i64 {
                scaled * r / 65535 + virtual_value * (65535 - r) / 131070
            } else {
                scaled
            }
        };
        (adjusted as i64, threshold)
    };

    if value < threshold {
        return (if ordered { 0 } else { adjusted }, None);
    }
    let ink = if seg.is_same_ink || rangepoint >= pick_point {
        seg.upper
    } else {
        seg.lower
    };
    let residual = if ordered { 0 } else { adjusted - ink.value as i32 };
    (residual, ink.prints().then_some(ink))
}

/// Error-diffusion state of a job.
#[derive(Debug, Clone)]
pub struct ErrorDiffusion {
    params: EdParams,
    diffusion: Diffusion,
    width: usize,
    lane_count: usize,
    lanes: Option<Vec<ErrorRows>>,
    amounts: Vec<u32>,
}

impl ErrorDiffusion {
    pub fn new(params: EdParams, spread: u32, width: usize, lane_count: usize) -> Self {
        Self {
            params,
            diffusion: Diffusion::new(spread),
            width,
            lane_count,
            lanes: None,
            amounts: Vec::new(),
        }
    }

    /// Error rows of `lane`, once allocated.
    pub fn lane(&self, lane: usize) -> Option<&ErrorRows> {
        self.lanes.as_ref()?.get(lane)
    }

    /// Zero every carried error.
    pub fn reset(&mut self) {
        if let Some(lanes) = &mut self.lanes {
            lanes.iter_mut().for_each(ErrorRows::clear);
        }
    }

    /// Dither the lanes of channel `c`, starting at lane `first_lane`.
    #[allow(clippy::too_many_arguments)]
    pub fn dither_channel(
        &mut self,
        row: usize,
        c: usize,
        channel: &Channel,
        first_lane: usize,
        geometry: &Geometry,
        samples: &[u16],
        out: &mut ChannelRow,
    ) {
        let Self {
            params,
            diffusion,
            width,
            lane_count,
            lanes,
            amounts,
        } = self;
        let lanes = lanes
            .get_or_insert_with(|| (0..*lane_count).map(|_| ErrorRows::new(*width)).collect());
        let shades = channel.shades.len();
        let lanes = &mut lanes[first_lane..first_lane + shades];
        lanes.iter_mut().for_each(|l| l.begin_row(row));
        amounts.resize(shades, 0);

        let dir = direction(row);
        for x in columns(row, geometry.dst_width) {
            let value = channel.adjust(geometry.sample(samples, x, c));
            split_shades(&channel.shades, value, amounts);
            let xi = x + MAX_SPREAD;
            for (s, shade) in channel.shades.iter().enumerate() {
                let base = amounts[s];
                let (cur, next) = lanes[s].split_mut();
                let adjusted = base as i32 + div8(cur[xi]);
                let phase = &channel.phases[s];
                let (residual, ink) = decide(
                    params,
                    shade,
                    base,
                    adjusted,
                    phase.dither.point(x),
                    phase.pick.point(x),
                    channel.randomizer,
                );
                if let Some(ink) = ink {
                    out.fire(ink.subchannel, x, ink.bit_pattern);
                }
                diffusion.diffuse(cur, next, xi, dir, residual, base);
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ink::range::{InkLevel, build_ranges};

    fn shade(density: f64) -> Shade {
        let levels = [InkLevel {
            value: 1.0,
            bit_pattern: 1,
            dot_size: 1,
            subchannel: 0,
        }];
        Shade {
            density: MAX_VALUE,
            lower: 0,
            trans: 0,
            ranges: build_ranges(&levels, density).unwrap(),
        }
    }

    const PLAIN: EdParams = EdParams {
        adaptive: false,
        adaptive_limit: 0,
        randomizer_cutoff: 4096,
    };

    #[test]
    fn test_div8_truncates_toward_zero() {
        assert_eq!(div8(9), 1);
        assert_eq!(div8(-9), -1);
        assert_eq!(div8(-1), 0);
        assert_eq!(div8(-8), -1);
        assert_eq!(div8(7), 0);
        assert_eq!(div8(0), 0);
    }

    #[test]
    fn test_ring_alternates() {
        let mut rows = ErrorRows::new(4);
        rows.begin_row(0);
        {
            let (_, next) = rows.split_mut();
            next[MAX_SPREAD + 2] = 80;
        }
        rows.begin_row(1);
        assert_eq!(rows.at(2), 80);
        assert!(rows.next().iter().all(|&e| e == 0));
        rows.begin_row(2);
        assert!(rows.current().iter().all(|&e| e == 0));
        rows.clear();
        assert!(rows.is_zero());
    }

    #[test]
    fn test_wide_spread_goes_to_neighbours() {
        let d = Diffusion::new(16);
        let mut cur = vec![0; 8 + 2 * MAX_SPREAD];
        let mut next = cur.clone();
        d.diffuse(&mut cur, &mut next, MAX_SPREAD + 3, -1, 100, 0);
        assert_eq!(cur[MAX_SPREAD + 2], 400);
        assert_eq!(next[MAX_SPREAD + 3], 400);
    }

    #[test]
    fn test_residual_clamped() {
        let d = Diffusion::new(16);
        let mut cur = vec![0; 4 + 2 * MAX_SPREAD];
        let mut next = cur.clone();
        d.diffuse(&mut cur, &mut next, MAX_SPREAD, 1, 200_000, 0);
        assert_eq!(next[MAX_SPREAD], 4 * 65535);
    }

    #[test]
    fn test_footprint_narrows_with_input() {
        let d = Diffusion::new(13);
        let light = d.footprint(0, 0);
        let mid = d.footprint(0, 1000);
        assert!(light >= mid, "{} < {}", light, mid);
        assert_eq!(d.footprint(0, 4000), 0);
        assert!(light <= MAX_SPREAD);
    }

    #[test]
    fn test_diffusion_conserves_error() {
        for spread in [0, 4, 10, 13, 16] {
            let d = Diffusion::new(spread);
            for base in [0, 300, 1500, 5000] {
                let mut cur = vec![0; 80 + 2 * MAX_SPREAD];
                let mut next = cur.clone();
                d.diffuse(&mut cur, &mut next, MAX_SPREAD + 40, 1, 10_000, base);
                let total: i32 = cur.iter().chain(next.iter()).sum();
                assert!(total <= 80_000, "spread {} base {}: {}", spread, base, total);
                assert!(total >= 76_000, "spread {} base {}: {}", spread, base, total);
                assert!(cur[..MAX_SPREAD + 41].iter().all(|&e| e == 0), "error behind the pixel");
            }
        }
    }

    #[test]
    fn test_zero_base_never_prints() {
        let s = shade(1.0);
        for carried in [0, 30_000, 65_535, 200_000] {
            let (residual, ink) = decide(&PLAIN, &s, 0, carried, 0, 0, 65535);
            assert!(ink.is_none());
            assert_eq!(residual, carried);
        }
    }

    #[test]
    fn test_full_base_prints() {
        let s = shade(1.0);
        let (residual, ink) = decide(&PLAIN, &s, 65535, 65535, 64000, 64000, 65535);
        assert_eq!(ink.map(|i| i.bit_pattern), Some(1));
        assert_eq!(residual, 0);
    }

    #[test]
    fn test_adaptive_ordered_zone_carries_nothing() {
        let params = EdParams {
            adaptive: true,
            adaptive_limit: 32768,
            randomizer_cutoff: 4096,
        };
        let s = shade(1.0);
        let (residual, _) = decide(&params, &s, 10_000, 90_000, 30_000, 30_000, 65535);
        assert_eq!(residual, 0);
        // above the limit the carried error is used
        let (residual, ink) = decide(&params, &s, 40_000, 90_000, 30_000, 30_000, 65535);
        assert!(ink.is_some());
        assert_eq!(residual, 90_000 - 65535);
    }

    #[test]
    fn test_randomizer_decay() {
        assert_eq!(effective_randomizer(65535, 1000, 4096), 65535);
        assert_eq!(effective_randomizer(65535, 65535, 4096), 0);
        let mid = effective_randomizer(65535, 34815, 4096);
        assert!((32000..33600).contains(&mid), "{}", mid);
    }
}
