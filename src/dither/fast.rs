//! Fast N-level ordered dithering.
//!
//! Each lane looks up the segment holding its input and compares the
//! position inside the segment against the matrix threshold:
//!
//! ```text
//!  lower.range            input            upper.range
//!      ├────────────────────●───────────────────┤
//!      0                rangepoint            65535
//!
//!  rangepoint > threshold  →  upper ink
//!  otherwise               →  lower ink
//! ```
//!
//! Same-ink segments always take the upper end.

use crate::channel::ChannelRegistry;
use crate::ink::range::{InkDefinition, RangeSegment, find_segment};
use crate::ink::shade::split_shades;
use crate::output::ScanlineBuffers;

use super::row::Geometry;

/// Choose between the two ends of `segment` for `input`.
#[inline]
pub fn pick_ink(segment: &RangeSegment, input: u32, threshold: u32) -> &InkDefinition {
    if segment.is_same_ink || segment.rangepoint(input) > threshold {
        &segment.upper
    } else {
        &segment.lower
    }
}

/// Dither one row.
pub fn dither_row(
    channels: &ChannelRegistry,
    geometry: &Geometry,
    samples: &[u16],
    out: &mut ScanlineBuffers,
) {
    let mut amounts = vec![0u32; channels.max_shades()];
    for (c, channel) in channels.iter().enumerate() {
        let row = out.channel_mut(c);
        for x in 0..geometry.dst_width {
            let value = channel.adjust(geometry.sample(samples, x, c));
            if value == 0 {
                continue;
            }
            split_shades(&channel.shades, value, &mut amounts);
            for (s, shade) in channel.shades.iter().enumerate() {
                let Some(seg) = find_segment(&shade.ranges, amounts[s]) else {
                    continue;
                };
                let ink = pick_ink(&shade.ranges[seg], amounts[s], channel.phases[s].dither.point(x));
                if ink.prints() {
                    row.fire(ink.subchannel, x, ink.bit_pattern);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dither::config::{ChannelSpec, InkSpec};
    use crate::matrix::builtin;
    use std::sync::Arc;

    fn two_level() -> ChannelSpec {
        ChannelSpec::with_inks(vec![
            InkSpec {
                value: 0.5,
                bits: 1,
                dot_size: None,
                subchannel: None,
            },
            InkSpec {
                value: 1.0,
                bits: 2,
                dot_size: None,
                subchannel: None,
            },
        ])
    }

    #[test]
    fn test_full_input_prints_darkest() {
        let m = Arc::new(builtin::iterated_2x2(3).unwrap());
        let reg = ChannelRegistry::build(&[two_level()], 1.0, m).unwrap();
        let geometry = Geometry {
            src_width: 8,
            dst_width: 8,
            channels: 1,
        };
        let mut out = reg.allocate_output(8);
        dither_row(&reg, &geometry, &[65535; 8], &mut out);
        let plane = out.subchannel(0, 0).unwrap();
        assert!((0..8).all(|x| plane.pattern_at(x) == 2));
    }

    #[test]
    fn test_zero_input_prints_nothing() {
        let m = Arc::new(builtin::iterated_2x2(3).unwrap());
        let reg = ChannelRegistry::build(&[two_level()], 1.0, m).unwrap();
        let geometry = Geometry {
            src_width: 8,
            dst_width: 8,
            channels: 1,
        };
        let mut out = reg.allocate_output(8);
        dither_row(&reg, &geometry, &[0; 8], &mut out);
        assert!(out.is_blank());
    }

    #[test]
    fn test_half_input_prints_small_dots() {
        // 32768 sits exactly on the small dot's activation point: every
        // column picks the upper end of segment 0.
        let m = Arc::new(builtin::iterated_2x2(3).unwrap());
        let reg = ChannelRegistry::build(&[two_level()], 1.0, m).unwrap();
        let geometry = Geometry {
            src_width: 8,
            dst_width: 8,
            channels: 1,
        };
        let mut out = reg.allocate_output(8);
        dither_row(&reg, &geometry, &[32768; 8], &mut out);
        let plane = out.subchannel(0, 0).unwrap();
        assert!((0..8).all(|x| plane.pattern_at(x) == 1));
    }
}
