//! Very-fast thresholding: one single-bit ink per channel, a dot fires iff
//! the sample exceeds the matrix threshold.

use crate::channel::ChannelRegistry;
use crate::output::ScanlineBuffers;

use super::row::Geometry;

/// Dither one row. Every channel must be very-fast capable.
pub fn dither_row(
    channels: &ChannelRegistry,
    geometry: &Geometry,
    samples: &[u16],
    out: &mut ScanlineBuffers,
) {
    for (c, channel) in channels.iter().enumerate() {
        let ink = channel.shades[0].ranges[0].upper;
        let cursor = &channel.phases[0].dither;
        let row = out.channel_mut(c);
        for x in 0..geometry.dst_width {
            let value = channel.adjust(geometry.sample(samples, x, c));
            if value > cursor.point(x) {
                row.fire(ink.subchannel, x, ink.bit_pattern);
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
    fn test_threshold_against_two_by_two() {
        let m = Arc::new(DitherMatrix::from_user(2, &[0, 2, 3, 1], false).unwrap());
        let mut reg = ChannelRegistry::build(&[ChannelSpec::single_bit()], 1.0, m).unwrap();
        let geometry = Geometry {
            src_width: 2,
            dst_width: 2,
            channels: 1,
        };
        let mut out = reg.allocate_output(2);

        reg.set_row(0);
        dither_row(&reg, &geometry, &[32768, 32768], &mut out);
        // thresholds 0 and 32768 on row 0
        assert_eq!(out.subchannel(0, 0).unwrap().as_bytes(), &[0x80]);

        out.clear();
        reg.set_row(1);
        dither_row(&reg, &geometry, &[32768, 32768], &mut out);
        // thresholds 49152 and 16384 on row 1
        assert_eq!(out.subchannel(0, 0).unwrap().as_bytes(), &[0x40]);
    }
}
