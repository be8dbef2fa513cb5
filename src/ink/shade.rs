//! # Shades
//!
//! A shade is one ink of a hue: light cyan and cyan are two shades of the
//! cyan channel. Shades are ordered light to dark and each one is dithered
//! as an independent lane with its own range table.
//!
//! ## Splitting
//!
//! The requested channel intensity is distributed across shades using
//! each shade's `lower` and `trans` thresholds:
//!
//! ```text
//!  amount
//!  65535 ┤        ┌────────────────        light: lower=0, trans=20000
//!        │       ╱        ┌────────        dark:  lower=20000, trans=40000
//!        │      ╱        ╱
//!      0 ┼─────┴────────┴──────────► input
//!        0   20000    40000      65535
//! ```
//!
//! Below `lower` the shade is off, between `lower` and `trans` it ramps
//! linearly, above `trans` it saturates. The darkest shade takes whatever
//! lies above its own `lower`; without a usable `trans` its ramp runs to
//! 65535.

use super::range::{MAX_VALUE, RangeSegment};

/// One ink variant of a channel.
#[derive(Debug, Clone)]
pub struct Shade {
    /// Darkness of this shade's full-coverage relative to the darkest shade
    pub density: u32,
    /// Input where this shade starts printing
    pub lower: u32,
    /// Input where this shade saturates
    pub trans: u32,
    /// Range table of this shade's inks
    pub ranges: Vec<RangeSegment>,
}

#[inline]
fn ramp(value: u32, lower: u32, trans: u32) -> u32 {
    if value <= lower {
        0
    } else if value >= trans {
        MAX_VALUE
    } else {
        ((value - lower) as u64 * MAX_VALUE as u64 / (trans - lower) as u64) as u32
    }
}

/// Distribute `value` across `shades`, writing one amount per shade into
/// `out`. Returns the total ink, the density-weighted sum of all amounts.
///
/// Single-shade channels pass the value through unchanged.
///
/// ## Example
///
/// ```
/// use inkdither::ink::shade::{split_shades, Shade};
///
/// let light = Shade { density: 20000, lower: 0, trans: 20000, ranges: vec![] };
/// let dark = Shade { density: 65535, lower: 20000, trans: 40000, ranges: vec![] };
/// let mut out = [0u32; 2];
/// split_shades(&[light, dark], 15000, &mut out);
/// assert_eq!(out, [49151, 0]);
/// ```
pub fn split_shades(shades: &[Shade], value: u32, out: &mut [u32]) -> u32 {
    debug_assert!(out.len() >= shades.len());
    let value = value.min(MAX_VALUE);
    match shades {
        [] => 0,
        [_] => {
            out[0] = value;
            value
        }
        _ => {
            let last = shades.len() - 1;
            let mut total = 0u64;
            for (i, shade) in shades.iter().enumerate() {
                let trans = if i == last && shade.trans <= shade.lower {
                    MAX_VALUE
                } else {
                    shade.trans.max(shade.lower)
                };
                let amount = if trans == shade.lower {
                    if value > shade.lower { MAX_VALUE } else { 0 }
                } else {
                    ramp(value, shade.lower, trans)
                };
                out[i] = amount;
                total += amount as u64 * shade.density as u64 / MAX_VALUE as u64;
            }
            total.min(u32::MAX as u64) as u32
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
