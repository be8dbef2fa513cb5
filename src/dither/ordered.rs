//! Ordered N-level dithering: the fast pick plus a print gate.
//!
//! After choosing the ink, the dot only prints where the input reaches the
//! ink's value scaled by the local threshold. Averaged over the tile the
//! gate sits at half the ink's value, which thins out isolated dark dots in
//! light areas.

use crate::channel::ChannelRegistry;
use crate::ink::range::{InkDefinition, find_segment};
use crate::ink::shade::split_shades;
use crate::output::ScanlineBuffers;

use super::fast::pick_ink;
use super::row::Geometry;

/// Whether `input` clears the print gate of `ink` at `threshold`.
#[inline]
pub fn passes_gate(ink: &InkDefinition, input: u32, threshold: u32) -> bool {
    input as u64 >= ink.value as u64 * threshold as u64 / 65536
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
                let input = amounts[s];
                let Some(seg) = find_segment(&shade.ranges, input) else {
                    continue;
                };
                let threshold = channel.phases[s].dither.point(x);
                let ink = pick_ink(&shade.ranges[seg], input, threshold);
                if ink.prints() && passes_gate(ink, input, threshold) {
                    row.fire(ink.subchannel, x, ink.bit_pattern);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dither::config::ChannelSpec;
    use crate::matrix::DitherMatrix;
    use std::sync::Arc;

    #[test]
    fn test_gate() {
        let ink = InkDefinition {
            bit_pattern: 1,
            value: 65535,
            dot_size: 1,
            subchannel: 0,
            range: 65535,
        };
        assert!(passes_gate(&ink, 1, 0));
        assert!(passes_gate(&ink, 32768, 32768));
        assert!(!passes_gate(&ink, 30000, 32768));
    }

    #[test]
    fn test_low_density_gate_thins_dots() {
        // At density 0.5 the single ink is fully active from 32768 upward,
        // so Fast would print everywhere; the gate leaves cells whose
        // threshold exceeds the input empty.
        let m = Arc::new(DitherMatrix::from_user(2, &[0, 2, 3, 1], false).unwrap());
        let mut reg = ChannelRegistry::build(&[ChannelSpec::single_bit()], 0.5, m).unwrap();
        let geometry = Geometry {
            src_width: 2,
            dst_width: 2,
            channels: 1,
        };
        let mut out = reg.allocate_output(2);
        dither_row(&reg, &geometry, &[40000, 40000], &mut out);
        // row 0 thresholds: 0 and 32768, both cleared by 40000
        assert_eq!(out.subchannel(0, 0).unwrap().as_bytes(), &[0xC0]);

        // row 1 thresholds: 49152 and 16384
        out.clear();
        reg.set_row(1);
        dither_row(&reg, &geometry, &[40000, 40000], &mut out);
        assert_eq!(out.subchannel(0, 0).unwrap().as_bytes(), &[0x40]);
    }
}
