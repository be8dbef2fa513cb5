//! # Ink Module
//!
//! Ink definitions, the range tables built from them and the splitting of a
//! channel's intensity across its light/dark shades.
//!
//! ## Modules
//!
//! - [`range`]: Range table builder and segment lookup
//! - [`shade`]: Shades and the shade splitter

pub mod range;
pub mod shade;

pub use range::{InkDefinition, InkLevel, RangeSegment, build_ranges};
pub use shade::{Shade, split_shades};
