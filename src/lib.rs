//! # Inkdither - Inkjet Halftoning Engine
//!
//! Inkdither turns continuous-tone, multi-channel ink intensities (16-bit
//! samples, one per ink channel) into the dot planes an inkjet head fires.
//! It provides:
//!
//! - **Range tables**: which two ink levels compete at each input level
//! - **Shade splitting**: light/dark inks of the same hue
//! - **Dither matrices**: built-in, iterated or caller-supplied tiles
//! - **Strategies**: very-fast and fast thresholding, ordered, hybrid and
//!   adaptive error diffusion, and Eventone
//! - **Bit-plane output**: MSB-first packed rows, one plane per pattern bit
//!
//! ## Quick Start
//!
//! ```
//! use inkdither::{Dither, DitherConfig};
//!
//! let config = DitherConfig::from_json(r#"{
//!     "algorithm": "Floyd",
//!     "dst_width": 64,
//!     "channels": [ { "inks": [ { "value": 1.0, "bits": 1 } ] } ]
//! }"#)?;
//!
//! let mut dither = Dither::new(&config)?;
//! let mut out = dither.allocate_output();
//!
//! for row in 0..16 {
//!     let samples = vec![32768u16; 64];
//!     dither.process_scanline(row, &samples, false, 0, &mut out)?;
//!     let plane = out.subchannel(0, 0).unwrap().as_bytes();
//!     assert_eq!(plane.len(), 8);
//! }
//!
//! # Ok::<(), inkdither::error::DitherError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`ink`] | Ink definitions, range tables, shade splitting |
//! | [`matrix`] | Threshold tiles and per-channel cursors |
//! | [`channel`] | Per-job channel registry |
//! | [`dither`] | Job configuration, strategies and dispatcher |
//! | [`output`] | Bit-plane row buffers |
//! | [`error`] | Error types |
//!
//! ## Scope
//!
//! The engine only produces dot planes. Command framing, weaving and paper
//! handling belong to the driver that feeds it.

pub mod channel;
pub mod dither;
pub mod error;
pub mod ink;
pub mod matrix;
pub mod output;

// Re-exports for convenience
pub use dither::config::{ChannelSpec, DitherConfig, InkSpec, ShadeSpec};
pub use dither::{Algorithm, Dither};
pub use error::DitherError;
pub use output::ScanlineBuffers;
