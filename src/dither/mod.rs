//! # Dithering
//!
//! The per-job engine. A [`Dither`] is built once from a [`DitherConfig`]
//! and then fed one scanline at a time:
//!
//! ```text
//!  u16 samples ──► shade split ──► strategy ──► bit planes
//!  (pixel-major)   per channel     per lane     per subchannel
//! ```
//!
//! ## Algorithms
//!
//! | Name       | Kind                 | State             |
//! |------------|----------------------|-------------------|
//! | `VeryFast` | single-bit threshold | none              |
//! | `Fast`     | N-level ordered      | none              |
//! | `Ordered`  | N-level ordered, gated | none            |
//! | `Floyd`    | hybrid error diffusion | error rows      |
//! | `Adaptive` | ED, ordered in highlights | error rows   |
//! | `EvenTone` | distance-steered ED  | error rows + distance field |
//!
//! Stateless algorithms may process rows in any order, stateful ones need
//! increasing rows.
//!
//! ## Example
//!
//! ```
//! use inkdither::dither::{Dither, config::{ChannelSpec, DitherConfig}};
//!
//! let config = DitherConfig {
//!     algorithm: "Fast".to_string(),
//!     dst_width: 16,
//!     channels: vec![ChannelSpec::single_bit()],
//!     ..Default::default()
//! };
//! let mut dither = Dither::new(&config).unwrap();
//! let mut out = dither.allocate_output();
//! dither.process_scanline(0, &[65535; 16], false, 0, &mut out).unwrap();
//! assert_eq!(out.subchannel(0, 0).unwrap().as_bytes(), &[0xFF, 0xFF]);
//! ```

pub mod config;
pub mod ed;
pub mod eventone;
pub mod fast;
pub mod ordered;
pub mod row;
pub mod very_fast;

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::channel::ChannelRegistry;
use crate::error::{DitherError, Result};
use crate::matrix::{DitherMatrix, builtin};
use crate::output::ScanlineBuffers;

use config::DitherConfig;
use ed::{EdParams, ErrorDiffusion, ErrorRows};
use eventone::{Aspect, Eventone};
use row::{BlankRows, Geometry, RowAction};

/// Dithering algorithm selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Algorithm {
    VeryFast,
    Fast,
    Ordered,
    Floyd,
    #[default]
    Adaptive,
    EvenTone,
}

impl Algorithm {
    pub const ALL: [Algorithm; 6] = [
        Algorithm::VeryFast,
        Algorithm::Fast,
        Algorithm::Ordered,
        Algorithm::Floyd,
        Algorithm::Adaptive,
        Algorithm::EvenTone,
    ];

    /// Parse an algorithm name (case-insensitive).
    ///
    /// Unknown names fall back to [`Algorithm::Adaptive`].
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "veryfast" | "very-fast" | "very_fast" => Algorithm::VeryFast,
            "fast" => Algorithm::Fast,
            "ordered" => Algorithm::Ordered,
            "floyd" | "hybrid" | "ed" => Algorithm::Floyd,
            "adaptive" => Algorithm::Adaptive,
            "eventone" | "even-tone" | "et" => Algorithm::EvenTone,
            other => {
                warn!("unknown dither algorithm '{}', using Adaptive", other);
                Algorithm::Adaptive
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::VeryFast => "VeryFast",
            Algorithm::Fast => "Fast",
            Algorithm::Ordered => "Ordered",
            Algorithm::Floyd => "Floyd",
            Algorithm::Adaptive => "Adaptive",
            Algorithm::EvenTone => "EvenTone",
        }
    }

    /// Rows are independent of each other.
    pub fn is_stateless(&self) -> bool {
        matches!(self, Algorithm::VeryFast | Algorithm::Fast | Algorithm::Ordered)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Strategy state, one variant per algorithm family.
#[derive(Debug, Clone)]
enum Strategy {
    VeryFast,
    Fast,
    Ordered,
    ErrorDiffusion(ErrorDiffusion),
    Eventone(Eventone),
}

/// A dithering job.
#[derive(Debug, Clone)]
pub struct Dither {
    algorithm: Algorithm,
    geometry: Geometry,
    channels: ChannelRegistry,
    strategy: Strategy,
    blank: BlankRows,
}

impl Dither {
    /// Build a job. All validation happens here; nothing is kept on error.
    pub fn new(config: &DitherConfig) -> Result<Self> {
        config.validate()?;
        let algorithm = Algorithm::parse(&config.algorithm);
        let density = config.clamped_density();
        let matrix = Arc::new(select_matrix(config, algorithm)?);
        debug!(
            "dither job: algorithm {} density {:.3} matrix {}x{} src {} dst {}",
            algorithm,
            density,
            matrix.x_size(),
            matrix.y_size(),
            config.source_width(),
            config.dst_width
        );

        let channels = ChannelRegistry::build(&config.channels, density, matrix)?;
        let geometry = Geometry {
            src_width: config.source_width(),
            dst_width: config.dst_width,
            channels: channels.len(),
        };

        let params = EdParams {
            adaptive: algorithm == Algorithm::Adaptive,
            adaptive_limit: config.adaptive_limit_value(),
            randomizer_cutoff: config.randomizer_cutoff_value(),
        };
        let spread = config.clamped_spread();
        let ed = || ErrorDiffusion::new(params, spread, config.dst_width, channels.lanes());
        let strategy = match algorithm {
            Algorithm::VeryFast => {
                if !channels.all_very_fast() {
                    debug!("not every channel is single-bit full-range, VeryFast rows run as Fast");
                }
                Strategy::VeryFast
            }
            Algorithm::Fast => Strategy::Fast,
            Algorithm::Ordered => Strategy::Ordered,
            Algorithm::Floyd | Algorithm::Adaptive => Strategy::ErrorDiffusion(ed()),
            Algorithm::EvenTone => {
                let (x_aspect, y_aspect) = config.aspect();
                Strategy::Eventone(Eventone::new(
                    Aspect::new(x_aspect, y_aspect),
                    ed(),
                    config.dst_width,
                    channels.lanes(),
                ))
            }
        };

        Ok(Self {
            algorithm,
            geometry,
            channels,
            strategy,
            blank: BlankRows::default(),
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    /// Empty output buffers sized for this job. Reuse them across rows.
    pub fn allocate_output(&self) -> ScanlineBuffers {
        self.channels.allocate_output(self.geometry.dst_width)
    }

    /// Dither one scanline into `out`.
    ///
    /// `samples` holds `src_width × channels` values, pixel-major.
    /// `duplicate` flags a row identical to the previous one; `zero_mask`
    /// marks channels known to be all zero (bit `c` for channel `c`).
    /// Both are hints only: a row counts as blank when its samples are all
    /// zero, whatever the hints claim.
    pub fn process_scanline(
        &mut self,
        row: usize,
        samples: &[u16],
        duplicate: bool,
        zero_mask: u64,
        out: &mut ScanlineBuffers,
    ) -> Result<()> {
        self.check_input(samples, out)?;
        out.clear();
        self.channels.set_row(row);

        let geometry = &self.geometry;
        let channels = &self.channels;
        let action = match &self.strategy {
            Strategy::VeryFast | Strategy::Fast | Strategy::Ordered => RowAction::Process,
            Strategy::ErrorDiffusion(_) | Strategy::Eventone(_) => {
                let blank = geometry.row_is_blank(samples);
                let hinted =
                    (duplicate && self.blank.run() > 0) || geometry.mask_covers_all(zero_mask);
                if hinted && !blank {
                    debug!("row {}: blank hint contradicted by samples, dithering anyway", row);
                }
                self.blank.observe(blank)
            }
        };

        match (&mut self.strategy, action) {
            (Strategy::VeryFast | Strategy::Fast | Strategy::Ordered, _) => {
                dither_stateless(self.algorithm, channels, geometry, samples, out);
            }
            (Strategy::ErrorDiffusion(ed), RowAction::Process) => {
                for (c, channel) in channels.iter().enumerate() {
                    ed.dither_channel(
                        row,
                        c,
                        channel,
                        channels.lane_offset(c),
                        geometry,
                        samples,
                        out.channel_mut(c),
                    );
                }
            }
            (Strategy::ErrorDiffusion(ed), RowAction::Reset) => ed.reset(),
            (Strategy::Eventone(et), RowAction::Process) => {
                et.dither_row(row, channels, geometry, samples, out)
            }
            (Strategy::Eventone(et), RowAction::Reset) => et.reset(),
            (_, RowAction::Skip) => {}
        }
        Ok(())
    }

    /// Dither consecutive rows starting at `first_row`, one output buffer
    /// per row.
    ///
    /// Stateless algorithms spread the rows over the rayon pool; stateful
    /// ones run them in order.
    pub fn render_band(
        &mut self,
        first_row: usize,
        rows: &[&[u16]],
        outs: &mut [ScanlineBuffers],
    ) -> Result<()> {
        if rows.len() != outs.len() {
            return Err(DitherError::Input(format!(
                "{} input rows but {} output buffers",
                rows.len(),
                outs.len()
            )));
        }
        for (samples, out) in rows.iter().zip(outs.iter()) {
            self.check_input(samples, out)?;
        }

        if self.algorithm.is_stateless() {
            let algorithm = self.algorithm;
            let geometry = self.geometry;
            let channels = &self.channels;
            rows.par_iter()
                .zip(outs.par_iter_mut())
                .enumerate()
                .for_each_init(
                    || channels.clone(),
                    |channels, (i, (samples, out))| {
                        out.clear();
                        channels.set_row(first_row + i);
                        dither_stateless(algorithm, channels, &geometry, samples, out);
                    },
                );
        } else {
            for (i, (samples, out)) in rows.iter().zip(outs.iter_mut()).enumerate() {
                self.process_scanline(first_row + i, samples, false, 0, out)?;
            }
        }
        Ok(())
    }

    /// Error rows of one (channel, shade) lane, once allocated.
    pub fn error_rows(&self, channel: usize, shade: usize) -> Option<&ErrorRows> {
        let ch = self.channels.get(channel)?;
        if shade >= ch.shade_count() {
            return None;
        }
        let lane = self.channels.lane_offset(channel) + shade;
        match &self.strategy {
            Strategy::ErrorDiffusion(ed) => ed.lane(lane),
            Strategy::Eventone(et) if ch.explicit_shades => et.lane(lane).map(|l| l.errors()),
            Strategy::Eventone(et) => et.fallback().lane(lane),
            _ => None,
        }
    }

    /// Whether no error or distance state is carried into the next row.
    pub fn carried_state_is_clear(&self) -> bool {
        match &self.strategy {
            Strategy::ErrorDiffusion(ed) => {
                (0..self.channels.lanes()).all(|l| ed.lane(l).is_none_or(ErrorRows::is_zero))
            }
            Strategy::Eventone(et) => et.is_reset(),
            _ => true,
        }
    }

    fn check_input(&self, samples: &[u16], out: &ScanlineBuffers) -> Result<()> {
        let expected = self.geometry.samples_per_row();
        if samples.len() != expected {
            return Err(DitherError::Input(format!(
                "expected {} samples ({} pixels × {} channels), got {}",
                expected,
                self.geometry.src_width,
                self.geometry.channels,
                samples.len()
            )));
        }
        if out.width() != self.geometry.dst_width || out.channels().len() != self.channels.len() {
            return Err(DitherError::Input(
                "output buffers were not allocated for this job".to_string(),
            ));
        }
        Ok(())
    }
}

fn dither_stateless(
    algorithm: Algorithm,
    channels: &ChannelRegistry,
    geometry: &Geometry,
    samples: &[u16],
    out: &mut ScanlineBuffers,
) {
    match algorithm {
        Algorithm::VeryFast if channels.all_very_fast() => {
            very_fast::dither_row(channels, geometry, samples, out)
        }
        Algorithm::Ordered => ordered::dither_row(channels, geometry, samples, out),
        _ => fast::dither_row(channels, geometry, samples, out),
    }
}

/// Threshold tile for a job: the caller's matrix, the iterated 2×2 tile
/// for the ordered modes, or the built-in tile for the sampling aspect.
fn select_matrix(config: &DitherConfig, algorithm: Algorithm) -> Result<DitherMatrix> {
    if let Some(user) = &config.matrix {
        return DitherMatrix::from_user(user.size, &user.values, user.prescaled);
    }
    if let Some(steps) = config.iterated_steps {
        if algorithm.is_stateless() {
            return builtin::iterated_2x2(steps);
        }
        warn!("iterated matrix ignored by {}", algorithm);
    }
    let (x_aspect, y_aspect) = config.aspect();
    builtin::for_aspect(x_aspect, y_aspect)
}

// ============================================================================
// TESTS
// ============================================================================
