//! # Range Tables
//!
//! A range table tells the dither strategies which two inks compete for a
//! given input level. Every shade owns one table, built once per job from
//! its ink definitions and the overall density multiplier.
//!
//! ## Layout
//!
//! ```text
//!  input   0 ─────────── r1 ─────────── r2 ────────────── 65535
//!          │  segment 0   │  segment 1   │   segment 2     │
//!          │ off ──► ink1 │ ink1 ──► ink2│ ink2 ──► ceiling│
//! ```
//!
//! - An implicit "off" definition (value 0, no bits) always starts the table
//! - Each ink activates at `range = value × density`, clamped to 65535
//! - If the darkest ink activates below 65535, a same-ink ceiling segment
//!   closes the table so that the segments cover `[0, 65535)` without gaps
//!
//! Within a segment the strategies pick the lower or the upper ink. When
//! both ends are the *same physical ink* (same subchannel and dot size) the
//! pick is fixed to the upper end.

use log::debug;

use crate::error::{DitherError, Result};

/// Largest sample value.
pub const MAX_VALUE: u32 = 65535;

/// One printable (or the implicit "off") ink level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InkDefinition {
    /// Dot size token written across the bit planes
    pub bit_pattern: u32,
    /// Darkness of one dot, 0-65535
    pub value: u32,
    /// Physical drop size, used to recognise repeated inks
    pub dot_size: u32,
    /// Output subchannel the dot lands in
    pub subchannel: usize,
    /// Input level at which this ink is fully active (`value × density`)
    pub range: u32,
}

impl InkDefinition {
    /// The implicit white level every table starts with.
    pub const OFF: Self = Self {
        bit_pattern: 0,
        value: 0,
        dot_size: 0,
        subchannel: 0,
        range: 0,
    };

    /// Whether printing this ink sets any bit.
    #[inline]
    pub fn prints(&self) -> bool {
        self.bit_pattern != 0
    }

    /// Same subchannel and same drop size.
    #[inline]
    pub fn same_ink(&self, other: &Self) -> bool {
        self.subchannel == other.subchannel && self.dot_size == other.dot_size
    }
}

/// A candidate ink level before density scaling.
///
/// `value` is the darkness of one dot relative to the darkest dot of the
/// channel, 0.0-1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InkLevel {
    pub value: f64,
    pub bit_pattern: u32,
    pub dot_size: u32,
    pub subchannel: usize,
}

/// Two neighbouring ink levels and the input interval between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSegment {
    pub lower: InkDefinition,
    pub upper: InkDefinition,
    /// `upper.value - lower.value`
    pub value_span: u32,
    /// `upper.range - lower.range`
    pub range_span: u32,
    /// Both ends are the same physical ink
    pub is_same_ink: bool,
}

impl RangeSegment {
    fn new(lower: InkDefinition, upper: InkDefinition) -> Self {
        Self {
            lower,
            upper,
            value_span: upper.value.saturating_sub(lower.value),
            range_span: upper.range.saturating_sub(lower.range),
            is_same_ink: lower.prints() && lower.same_ink(&upper),
        }
    }

    /// Position of `input` inside the segment, scaled to 0-65535.
    ///
    /// Same-ink and empty segments report the midpoint.
    #[inline]
    pub fn rangepoint(&self, input: u32) -> u32 {
        if self.is_same_ink || self.range_span == 0 {
            return 32768;
        }
        let offset = input.saturating_sub(self.lower.range) as u64;
        ((offset * MAX_VALUE as u64) / self.range_span as u64).min(MAX_VALUE as u64) as u32
    }

    /// Ink value interpolated at `rangepoint`.
    #[inline]
    pub fn virtual_value(&self, rangepoint: u32) -> u32 {
        if self.value_span == 0 {
            self.upper.value
        } else if self.range_span == 0 {
            (self.upper.value + self.lower.value) / 2
        } else {
            self.lower.value + (self.value_span as u64 * rangepoint as u64 / MAX_VALUE as u64) as u32
        }
    }
}

/// Build the range table for one shade.
///
/// `density` is the overall density multiplier; it moves every activation
/// point without changing the ink values themselves.
///
/// ## Example
///
/// ```
/// use inkdither::ink::range::{build_ranges, InkLevel};
///
/// let inks = [
///     InkLevel { value: 0.5, bit_pattern: 1, dot_size: 1, subchannel: 0 },
///     InkLevel { value: 1.0, bit_pattern: 2, dot_size: 2, subchannel: 0 },
/// ];
/// let ranges = build_ranges(&inks, 1.0).unwrap();
/// assert_eq!(ranges.len(), 2);
/// assert_eq!(ranges[0].lower.range, 0);
/// assert_eq!(ranges[1].upper.range, 65535);
/// ```
pub fn build_ranges(inks: &[InkLevel], density: f64) -> Result<Vec<RangeSegment>> {
    if inks.is_empty() {
        return Err(DitherError::Config("ink list is empty".to_string()));
    }
    if !(density.is_finite() && density > 0.0) {
        return Err(DitherError::Config(format!("invalid density {}", density)));
    }

    let mut defs = Vec::with_capacity(inks.len());
    for ink in inks {
        if !(ink.value > 0.0 && ink.value <= 1.0) {
            return Err(DitherError::Config(format!(
                "ink value {} outside (0, 1]",
                ink.value
            )));
        }
        if ink.bit_pattern == 0 {
            return Err(DitherError::Config(
                "ink definitions need a non-zero bit pattern".to_string(),
            ));
        }
        let value = (ink.value * MAX_VALUE as f64).round() as u32;
        let range = (ink.value * density * MAX_VALUE as f64)
            .round()
            .min(MAX_VALUE as f64) as u32;
        defs.push(InkDefinition {
            bit_pattern: ink.bit_pattern,
            value,
            dot_size: ink.dot_size,
            subchannel: ink.subchannel,
            range,
        });
    }
    defs.sort_by_key(|d| (d.value, d.range));

    let mut segments = Vec::with_capacity(defs.len() + 1);
    let mut lower = InkDefinition::OFF;
    for def in defs {
        segments.push(RangeSegment::new(lower, def));
        lower = def;
    }
    if lower.range < MAX_VALUE {
        let ceiling = InkDefinition {
            range: MAX_VALUE,
            ..lower
        };
        segments.push(RangeSegment::new(lower, ceiling));
    }

    for (i, seg) in segments.iter().enumerate() {
        debug!(
            "  level {} value[0] {} value[1] {} range[0] {} range[1] {} same_ink {}",
            i, seg.lower.value, seg.upper.value, seg.lower.range, seg.upper.range, seg.is_same_ink
        );
    }
    Ok(segments)
}

/// Index of the segment containing `input`: the highest segment whose lower
/// activation point lies strictly below it. `None` for a zero input.
#[inline]
pub fn find_segment(ranges: &[RangeSegment], input: u32) -> Option<usize> {
    ranges.iter().rposition(|seg| input > seg.lower.range)
}

/// Whether a table can be dithered by plain thresholding: one level, one
/// bit, full activation range.
pub fn is_very_fast_capable(ranges: &[RangeSegment]) -> bool {
    match ranges {
        [only] => only.upper.bit_pattern == 1 && only.upper.range == MAX_VALUE,
        _ => false,
    }
}

/// Number of bit planes needed to hold every pattern in the table.
pub fn significant_bits(ranges: &[RangeSegment]) -> usize {
    let max = ranges.iter().map(|seg| seg.upper.bit_pattern).max().unwrap_or(0);
    (u32::BITS - max.leading_zeros()) as usize
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn level(value: f64, bits: u32) -> InkLevel {
        InkLevel {
            value,
            bit_pattern: bits,
            dot_size: bits,
            subchannel: 0,
        }
    }

    #[test]
    fn test_single_level_full_range() {
        let ranges = build_ranges(&[level(1.0, 1)], 1.0).unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].lower, InkDefinition::OFF);
        assert_eq!(ranges[0].upper.range, MAX_VALUE);
        assert!(is_very_fast_capable(&ranges));
    }

    #[test]
    fn test_low_density_adds_ceiling() {
        let ranges = build_ranges(&[level(1.0, 1)], 0.5).unwrap();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].upper.range, 32768);
        assert!(ranges[1].is_same_ink);
        assert_eq!(ranges[1].upper.range, MAX_VALUE);
        assert!(!is_very_fast_capable(&ranges));
    }

    #[test]
    fn test_high_density_clamps() {
        let ranges = build_ranges(&[level(0.5, 1), level(1.0, 2)], 4.0).unwrap();
        assert!(ranges.iter().all(|s| s.upper.range <= MAX_VALUE));
        assert_eq!(ranges[0].upper.range, MAX_VALUE);
        assert_eq!(ranges[1].range_span, 0);
    }

    #[test]
    fn test_levels_are_sorted() {
        let ranges = build_ranges(&[level(1.0, 3), level(0.25, 1), level(0.5, 2)], 1.0).unwrap();
        let values: Vec<u32> = ranges.iter().map(|s| s.upper.value).collect();
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(significant_bits(&ranges), 2);
    }

    #[test]
    fn test_segments_chain_without_gaps() {
        for density in [0.1, 0.3, 0.75, 1.0, 2.5, 8.0] {
            let ranges =
                build_ranges(&[level(0.2, 1), level(0.6, 2), level(1.0, 3)], density).unwrap();
            assert_eq!(ranges[0].lower.range, 0);
            assert_eq!(ranges.last().unwrap().upper.range, MAX_VALUE);
            for pair in ranges.windows(2) {
                assert_eq!(pair[0].upper, pair[1].lower);
            }
        }
    }

    #[test]
    fn test_same_ink_detection() {
        let inks = [
            InkLevel { value: 0.5, bit_pattern: 1, dot_size: 1, subchannel: 0 },
            InkLevel { value: 0.7, bit_pattern: 1, dot_size: 1, subchannel: 0 },
            InkLevel { value: 1.0, bit_pattern: 1, dot_size: 1, subchannel: 1 },
        ];
        let ranges = build_ranges(&inks, 1.0).unwrap();
        assert!(!ranges[0].is_same_ink);
        assert!(ranges[1].is_same_ink);
        assert!(!ranges[2].is_same_ink);
    }

    #[test]
    fn test_find_segment() {
        let ranges = build_ranges(&[level(0.5, 1), level(1.0, 2)], 1.0).unwrap();
        assert_eq!(find_segment(&ranges, 0), None);
        assert_eq!(find_segment(&ranges, 1), Some(0));
        assert_eq!(find_segment(&ranges, 32768), Some(0));
        assert_eq!(find_segment(&ranges, 40000), Some(1));
        assert_eq!(find_segment(&ranges, 65535), Some(1));
    }

    #[test]
    fn test_rangepoint_and_virtual_value() {
        let ranges = build_ranges(&[level(1.0, 1)], 1.0).unwrap();
        let seg = &ranges[0];
        assert_eq!(seg.rangepoint(0), 0);
        assert_eq!(seg.rangepoint(65535), 65535);
        assert_eq!(seg.virtual_value(65535), 65535);
        assert_eq!(seg.virtual_value(0), 0);
    }

    #[test]
    fn test_rejects_bad_definitions() {
        assert!(build_ranges(&[], 1.0).is_err());
        assert!(build_ranges(&[level(1.0, 0)], 1.0).is_err());
        assert!(build_ranges(&[level(1.5, 1)], 1.0).is_err());
        assert!(build_ranges(&[level(1.0, 1)], 0.0).is_err());
        assert!(build_ranges(&[level(1.0, 1)], f64::NAN).is_err());
    }
}
