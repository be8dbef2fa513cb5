//! # Job Configuration
//!
//! Named options consumed once at job start. Everything is plain serde data
//! so a job can be described in JSON:
//!
//! ```json
//! {
//!   "algorithm": "EvenTone",
//!   "density": 1.0,
//!   "dst_width": 720,
//!   "channels": [
//!     { "shades": [
//!         { "density": 0.3, "lower": 0, "trans": 20000,
//!           "inks": [{ "value": 1.0, "bits": 1 }] },
//!         { "density": 1.0, "lower": 20000, "trans": 40000,
//!           "inks": [{ "value": 0.5, "bits": 1 }, { "value": 1.0, "bits": 2 }] }
//!     ] }
//!   ]
//! }
//! ```
//!
//! Out-of-range numeric options are clamped (with a warning), malformed ink
//! or shade data is rejected with [`DitherError::Config`].

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{DitherError, Result};

pub const MIN_DENSITY: f64 = 0.1;
pub const MAX_DENSITY: f64 = 8.0;
pub const MAX_SPREAD_PARAM: u32 = 16;

/// Whole-job options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DitherConfig {
    /// One of `VeryFast`, `Fast`, `Ordered`, `Floyd`, `Adaptive`, `EvenTone`
    pub algorithm: String,
    /// Overall density multiplier, 0.1-8.0
    pub density: f64,
    /// Error-diffusion ink spread, 0-16
    pub spread: u32,
    /// Adaptive hybrid switches to ordered dithering at or below this level (0-1)
    pub adaptive_limit: f64,
    /// Randomizer strength starts decaying above this level (0-1)
    pub randomizer_cutoff: f64,
    /// Horizontal sampling resolution
    pub x_aspect: u32,
    /// Vertical sampling resolution
    pub y_aspect: u32,
    /// Input pixels per row; 0 means same as `dst_width`
    pub src_width: usize,
    /// Output dots per row
    pub dst_width: usize,
    /// Caller-supplied threshold tile
    pub matrix: Option<UserMatrix>,
    /// Expansion steps of the iterated 2×2 tile used by the fast modes
    pub iterated_steps: Option<u32>,
    pub channels: Vec<ChannelSpec>,
}

impl Default for DitherConfig {
    fn default() -> Self {
        Self {
            algorithm: "Adaptive".to_string(),
            density: 1.0,
            spread: 13,
            adaptive_limit: 0.5,
            randomizer_cutoff: 0.0625,
            x_aspect: 1,
            y_aspect: 1,
            src_width: 0,
            dst_width: 0,
            matrix: None,
            iterated_steps: None,
            channels: Vec::new(),
        }
    }
}

/// A square threshold tile supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMatrix {
    pub size: usize,
    pub values: Vec<u32>,
    /// Values are already 0-65535 thresholds rather than ranks
    #[serde(default)]
    pub prescaled: bool,
}

/// One dot level of a shade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InkSpec {
    /// Darkness of the dot relative to the darkest dot, (0, 1]
    pub value: f64,
    /// Dot size token written to the bit planes
    pub bits: u32,
    /// Physical drop size; defaults to `bits`
    #[serde(default)]
    pub dot_size: Option<u32>,
    /// Output subchannel; defaults to the shade's index
    #[serde(default)]
    pub subchannel: Option<usize>,
}

/// One ink variant of a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadeSpec {
    /// Darkness of the shade relative to the darkest shade, (0, 1]
    #[serde(default = "one")]
    pub density: f64,
    /// Channel level where the shade starts printing
    #[serde(default)]
    pub lower: u32,
    /// Channel level where the shade saturates; 0 lets the darkest shade
    /// run to the top
    #[serde(default)]
    pub trans: u32,
    pub inks: Vec<InkSpec>,
}

/// One physical ink channel.
///
/// Either `inks` (a single implicit shade) or `shades` must be given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Scales the channel's input before dithering
    #[serde(default = "one")]
    pub density_adjustment: f64,
    /// Error-diffusion threshold randomization, 0-1
    #[serde(default = "one")]
    pub randomizer: f64,
    #[serde(default)]
    pub inks: Vec<InkSpec>,
    #[serde(default)]
    pub shades: Vec<ShadeSpec>,
}

fn one() -> f64 {
    1.0
}

impl ChannelSpec {
    /// A single-shade channel printing one 1-bit dot.
    pub fn single_bit() -> Self {
        Self::with_inks(vec![InkSpec {
            value: 1.0,
            bits: 1,
            dot_size: None,
            subchannel: None,
        }])
    }

    pub fn with_inks(inks: Vec<InkSpec>) -> Self {
        Self {
            density_adjustment: 1.0,
            randomizer: 1.0,
            inks,
            shades: Vec::new(),
        }
    }

    pub fn with_shades(shades: Vec<ShadeSpec>) -> Self {
        Self {
            density_adjustment: 1.0,
            randomizer: 1.0,
            inks: Vec::new(),
            shades,
        }
    }
}

impl DitherConfig {
    /// Parse a JSON job description and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks that cannot be fixed by clamping.
    pub fn validate(&self) -> Result<()> {
        if self.dst_width == 0 {
            return Err(DitherError::Config("dst_width must be positive".to_string()));
        }
        if self.channels.is_empty() {
            return Err(DitherError::Config("no channels configured".to_string()));
        }
        if self.channels.len() > 64 {
            return Err(DitherError::Config(format!(
                "{} channels configured, at most 64 supported",
                self.channels.len()
            )));
        }
        for (i, ch) in self.channels.iter().enumerate() {
            match (ch.inks.is_empty(), ch.shades.is_empty()) {
                (true, true) => {
                    return Err(DitherError::Config(format!(
                        "channel {} defines neither inks nor shades",
                        i
                    )));
                }
                (false, false) => {
                    return Err(DitherError::Config(format!(
                        "channel {} defines both inks and shades",
                        i
                    )));
                }
                _ => {}
            }
            if !(ch.density_adjustment.is_finite() && ch.density_adjustment > 0.0) {
                return Err(DitherError::Config(format!(
                    "channel {} has invalid density adjustment {}",
                    i, ch.density_adjustment
                )));
            }
            for (j, shade) in ch.shades.iter().enumerate() {
                if !(shade.density > 0.0 && shade.density <= 1.0) {
                    return Err(DitherError::Config(format!(
                        "channel {} shade {} density {} outside (0, 1]",
                        i, j, shade.density
                    )));
                }
                if shade.inks.is_empty() {
                    return Err(DitherError::Config(format!(
                        "channel {} shade {} has no inks",
                        i, j
                    )));
                }
            }
            if let Some(first) = ch.shades.first() {
                if first.lower != 0 {
                    return Err(DitherError::Config(format!(
                        "channel {} lightest shade must start at 0, got {}",
                        i, first.lower
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn source_width(&self) -> usize {
        if self.src_width == 0 { self.dst_width } else { self.src_width }
    }

    pub fn clamped_density(&self) -> f64 {
        clamp_option("density", self.density, MIN_DENSITY, MAX_DENSITY)
    }

    pub fn clamped_spread(&self) -> u32 {
        if self.spread > MAX_SPREAD_PARAM {
            warn!("spread {} clamped to {}", self.spread, MAX_SPREAD_PARAM);
        }
        self.spread.min(MAX_SPREAD_PARAM)
    }

    /// Adaptive limit on the 16-bit scale.
    pub fn adaptive_limit_value(&self) -> i32 {
        (clamp_option("adaptive_limit", self.adaptive_limit, 0.0, 1.0) * 65535.0).round() as i32
    }

    /// Randomizer cutoff on the 16-bit scale.
    pub fn randomizer_cutoff_value(&self) -> u32 {
        (clamp_option("randomizer_cutoff", self.randomizer_cutoff, 0.0, 1.0) * 65535.0).round()
            as u32
    }

    /// Sampling aspect, never zero.
    pub fn aspect(&self) -> (u32, u32) {
        (self.x_aspect.max(1), self.y_aspect.max(1))
    }
}

fn clamp_option(name: &str, value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        warn!("{} is NaN, using {}", name, min);
        return min;
    }
    if value < min || value > max {
        warn!("{} {} clamped to [{}, {}]", name, value, min, max);
    }
    value.clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_json() {
        let config = DitherConfig::from_json(
            r#"{ "dst_width": 16, "channels": [ { "inks": [ { "value": 1.0, "bits": 1 } ] } ] }"#,
        )
        .unwrap();
        assert_eq!(config.algorithm, "Adaptive");
        assert_eq!(config.source_width(), 16);
        assert_eq!(config.channels[0].randomizer, 1.0);
        assert_eq!(config.aspect(), (1, 1));
    }

    #[test]
    fn test_shades_json() {
        let config = DitherConfig::from_json(
            r#"{
                "algorithm": "EvenTone",
                "dst_width": 8,
                "channels": [ { "shades": [
                    { "density": 0.3, "lower": 0, "trans": 20000, "inks": [ { "value": 1.0, "bits": 1 } ] },
                    { "lower": 20000, "trans": 40000, "inks": [ { "value": 1.0, "bits": 1 } ] }
                ] } ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.channels[0].shades.len(), 2);
        assert_eq!(config.channels[0].shades[1].density, 1.0);
    }

    #[test]
    fn test_clamping() {
        let config = DitherConfig {
            density: 20.0,
            spread: 40,
            adaptive_limit: 2.0,
            ..Default::default()
        };
        assert_eq!(config.clamped_density(), MAX_DENSITY);
        assert_eq!(config.clamped_spread(), 16);
        assert_eq!(config.adaptive_limit_value(), 65535);
        let config = DitherConfig {
            density: 0.0,
            ..Default::default()
        };
        assert_eq!(config.clamped_density(), MIN_DENSITY);
    }

    #[test]
    fn test_rejects_structural_errors() {
        let empty = DitherConfig {
            dst_width: 8,
            ..Default::default()
        };
        assert!(empty.validate().is_err());

        let no_width = DitherConfig {
            channels: vec![ChannelSpec::single_bit()],
            ..Default::default()
        };
        assert!(no_width.validate().is_err());

        let mut both = ChannelSpec::single_bit();
        both.shades.push(ShadeSpec {
            density: 1.0,
            lower: 0,
            trans: 0,
            inks: both.inks.clone(),
        });
        let config = DitherConfig {
            dst_width: 8,
            channels: vec![both],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(DitherConfig::from_json("{ not json").is_err());
    }
}
