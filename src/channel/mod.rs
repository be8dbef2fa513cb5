//! # Channel Registry
//!
//! Per-job description of every physical ink channel: its shades (each with
//! its own range table), the input density adjustment, the error-diffusion
//! randomizer and where each shade reads the shared dither tile.
//!
//! ## Lanes
//!
//! Every (channel, shade) pair is a *lane*. Lanes are dithered
//! independently and each one gets its own matrix phase, so the dots of two
//! shades (or two channels) are not stacked on the same tile cells:
//!
//! ```text
//!  rc = 1 + ceil(sqrt(lanes))          tile split into rc × rc phases
//!
//!  ┌────┬────┬────┐                   lane 0 → (0, 0)
//!  │ 0  │ 3  │    │                   lane 1 → (0, y/rc)
//!  ├────┼────┼────┤                   lane 2 → (0, 2y/rc)
//!  │ 1  │ 4  │    │                   lane 3 → (x/rc, 0)
//!  ├────┼────┼────┤                   ...
//!  │ 2  │    │    │
//!  └────┴────┴────┘
//! ```
//!
//! The pick matrix (upper/lower ink choice) reads the same tile through a
//! second, staggered cursor shifted by a third of the tile. The shift
//! decorrelates the two decisions; the stagger keeps the choice from
//! following the row-by-row bias of the tile.

use std::sync::Arc;

use log::debug;

use crate::dither::config::{ChannelSpec, InkSpec, ShadeSpec};
use crate::error::{DitherError, Result};
use crate::ink::range::{
    InkLevel, MAX_VALUE, build_ranges, is_very_fast_capable, significant_bits,
};
use crate::ink::shade::Shade;
use crate::matrix::{DitherMatrix, MatrixCursor};
use crate::output::{ChannelRow, ScanlineBuffers};

/// Matrix cursors of one lane.
#[derive(Debug, Clone)]
pub struct LanePhase {
    /// Threshold tile read by the print decision
    pub dither: MatrixCursor,
    /// Threshold tile read by the upper/lower ink choice
    pub pick: MatrixCursor,
}

/// One physical ink channel.
#[derive(Debug, Clone)]
pub struct Channel {
    /// Input scale, 65536 = 1.0
    pub density_adjustment: u32,
    /// Error-diffusion threshold randomization, 0-65535
    pub randomizer: u32,
    pub shades: Vec<Shade>,
    /// One per shade
    pub phases: Vec<LanePhase>,
    /// `false` when the channel was configured with a bare ink list
    pub explicit_shades: bool,
    pub subchannels: usize,
    pub planes: usize,
    pub very_fast: bool,
}

impl Channel {
    /// Scale a raw sample by the channel's density adjustment.
    #[inline]
    pub fn adjust(&self, raw: u16) -> u32 {
        ((raw as u64 * self.density_adjustment as u64) >> 16).min(MAX_VALUE as u64) as u32
    }

    pub fn shade_count(&self) -> usize {
        self.shades.len()
    }

    fn set_row(&mut self, y: usize) {
        for phase in &mut self.phases {
            phase.dither.set_row(y);
            phase.pick.set_row(y);
        }
    }
}

/// Every channel of a job, in sample order.
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    channels: Vec<Channel>,
    lane_offsets: Vec<usize>,
    lanes: usize,
}

impl ChannelRegistry {
    /// Build all channels and range tables.
    ///
    /// Fails on the first malformed channel; nothing is kept from a partial
    /// build.
    pub fn build(specs: &[ChannelSpec], density: f64, matrix: Arc<DitherMatrix>) -> Result<Self> {
        if specs.is_empty() {
            return Err(DitherError::Config("no channels configured".to_string()));
        }

        let mut lane_offsets = Vec::with_capacity(specs.len());
        let mut lanes = 0;
        for spec in specs {
            lane_offsets.push(lanes);
            lanes += if spec.shades.is_empty() { 1 } else { spec.shades.len() };
        }

        let phases = lane_phases(lanes, matrix.x_size(), matrix.y_size());
        let mut channels = Vec::with_capacity(specs.len());
        for (index, spec) in specs.iter().enumerate() {
            let first = lane_offsets[index];
            let channel = build_channel(index, spec, density, &matrix, &phases[first..])?;
            channels.push(channel);
        }

        Ok(Self {
            channels,
            lane_offsets,
            lanes,
        })
    }

    pub fn get(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Total number of (channel, shade) lanes.
    pub fn lanes(&self) -> usize {
        self.lanes
    }

    /// Index of the first lane of `channel`.
    #[inline]
    pub(crate) fn lane_offset(&self, channel: usize) -> usize {
        self.lane_offsets[channel]
    }

    /// Largest number of shades in any channel.
    pub fn max_shades(&self) -> usize {
        self.channels.iter().map(Channel::shade_count).max().unwrap_or(0)
    }

    /// Whether every channel can be dithered by plain thresholding.
    pub fn all_very_fast(&self) -> bool {
        self.channels.iter().all(|c| c.very_fast)
    }

    /// Move every cursor to scanline `y`.
    pub fn set_row(&mut self, y: usize) {
        self.channels.iter_mut().for_each(|c| c.set_row(y));
    }

    /// Empty output buffers shaped for this job.
    pub fn allocate_output(&self, width: usize) -> ScanlineBuffers {
        ScanlineBuffers::new(
            width,
            self.channels
                .iter()
                .map(|c| ChannelRow::new(width, c.subchannels, c.planes))
                .collect(),
        )
    }
}

/// Tile offsets of each lane, column-major over an `rc × rc` grid.
fn lane_phases(lanes: usize, x_size: usize, y_size: usize) -> Vec<(usize, usize)> {
    let rc = 1 + (lanes as f64).sqrt().ceil() as usize;
    let x_n = x_size / rc;
    let y_n = y_size / rc;
    (0..rc)
        .flat_map(|i| (0..rc).map(move |j| (x_n * i, y_n * j)))
        .take(lanes)
        .collect()
}

fn build_channel(
    index: usize,
    spec: &ChannelSpec,
    density: f64,
    matrix: &Arc<DitherMatrix>,
    phases: &[(usize, usize)],
) -> Result<Channel> {
    let explicit_shades = !spec.shades.is_empty();
    let implicit;
    let shade_specs: &[ShadeSpec] = if explicit_shades {
        &spec.shades
    } else {
        implicit = [ShadeSpec {
            density: 1.0,
            lower: 0,
            trans: 0,
            inks: spec.inks.clone(),
        }];
        &implicit
    };

    let mut shades = Vec::with_capacity(shade_specs.len());
    let mut lane_phases = Vec::with_capacity(shade_specs.len());
    let mut subchannels = 1;
    let mut planes = 1;
    for (s, shade_spec) in shade_specs.iter().enumerate() {
        let levels = ink_levels(&shade_spec.inks, s);
        let ranges = build_ranges(&levels, density).map_err(|e| match e {
            DitherError::Config(msg) => {
                DitherError::Config(format!("channel {} shade {}: {}", index, s, msg))
            }
            other => other,
        })?;
        subchannels = subchannels.max(levels.iter().map(|l| l.subchannel + 1).max().unwrap_or(1));
        planes = planes.max(significant_bits(&ranges));

        debug!(
            "channel {} shade {}: density {:.3} lower {} trans {} levels {}",
            index,
            s,
            shade_spec.density,
            shade_spec.lower,
            shade_spec.trans,
            ranges.len()
        );

        shades.push(Shade {
            density: (shade_spec.density * MAX_VALUE as f64).round() as u32,
            lower: shade_spec.lower.min(MAX_VALUE),
            trans: shade_spec.trans.min(MAX_VALUE),
            ranges,
        });

        let (x_off, y_off) = phases[s];
        lane_phases.push(LanePhase {
            dither: MatrixCursor::new(matrix.clone(), x_off, y_off),
            pick: MatrixCursor::staggered(
                matrix.clone(),
                x_off + matrix.x_size() / 3,
                y_off + 2 * matrix.y_size() / 3,
            ),
        });
    }

    let very_fast = shades.len() == 1
        && is_very_fast_capable(&shades[0].ranges)
        && spec.density_adjustment == 1.0;

    Ok(Channel {
        density_adjustment: (spec.density_adjustment * 65536.0)
            .round()
            .clamp(1.0, (8 * 65536) as f64) as u32,
        randomizer: (spec.randomizer.clamp(0.0, 1.0) * MAX_VALUE as f64).round() as u32,
        shades,
        phases: lane_phases,
        explicit_shades,
        subchannels,
        planes,
        very_fast,
    })
}

fn ink_levels(inks: &[InkSpec], shade_index: usize) -> Vec<InkLevel> {
    inks.iter()
        .map(|ink| InkLevel {
            value: ink.value,
            bit_pattern: ink.bits,
            dot_size: ink.dot_size.unwrap_or(ink.bits),
            subchannel: ink.subchannel.unwrap_or(shade_index),
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
