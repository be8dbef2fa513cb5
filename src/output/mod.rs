//! # Bit-Plane Output
//!
//! Every strategy writes its dots into caller-owned row buffers laid out
//! exactly the way protocol encoders consume them.
//!
//! ## Bit Packing
//!
//! - Bit 7 (MSB) = leftmost dot
//! - Bit 0 (LSB) = rightmost dot
//! - 1 = fire, 0 = no drop
//!
//! ```text
//! Byte value 0xF0 = 11110000 = ████░░░░
//! Byte value 0x30 = 00110000 = ░░██░░░░
//! ```
//!
//! ## Multi-Bit Dot Sizes
//!
//! A channel whose inks use K-bit patterns gets K single-bit planes per
//! subchannel, stored back to back at a fixed pitch of
//! `ceil(width / 8)` bytes. Bit k of a pattern lands in plane k:
//!
//! ```text
//!            pitch bytes
//!         ┌──────────────┐
//! plane 0 │ bit 0 of dot │  base
//! plane 1 │ bit 1 of dot │  base + pitch
//!         └──────────────┘
//!
//! pattern 0b10 at x=3 → plane 1, byte 0, bit 4
//! ```
//!
//! Reading plane k of every column and reassembling the bits gives back the
//! exact bit pattern of the ink that was fired.

/// Sets bits in one plane of a bit-packed row.
///
/// Hides the stride arithmetic: the plane starts at `plane_index × pitch`.
pub struct BitPlaneWriter<'a> {
    plane: &'a mut [u8],
}

impl<'a> BitPlaneWriter<'a> {
    pub fn new(buffer: &'a mut [u8], pitch: usize, plane_index: usize) -> Self {
        let start = plane_index * pitch;
        Self {
            plane: &mut buffer[start..start + pitch],
        }
    }

    /// Mark column `x` as firing.
    #[inline]
    pub fn set_bit(&mut self, x: usize) {
        self.plane[x / 8] |= 0x80 >> (x % 8);
    }

    /// Clear the whole plane.
    pub fn clear(&mut self) {
        self.plane.fill(0);
    }
}

/// The planes of one subchannel for one scanline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneRow {
    data: Vec<u8>,
    pitch: usize,
    planes: usize,
}

impl PlaneRow {
    pub fn new(width: usize, planes: usize) -> Self {
        let pitch = width.div_ceil(8);
        Self {
            data: vec![0; pitch * planes.max(1)],
            pitch,
            planes: planes.max(1),
        }
    }

    /// Bytes per plane.
    #[inline]
    pub fn pitch(&self) -> usize {
        self.pitch
    }

    #[inline]
    pub fn planes(&self) -> usize {
        self.planes
    }

    /// All planes, back to back.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// One plane, or `None` past the last plane.
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        (index < self.planes).then(|| &self.data[index * self.pitch..(index + 1) * self.pitch])
    }

    pub fn writer(&mut self, plane_index: usize) -> BitPlaneWriter<'_> {
        BitPlaneWriter::new(&mut self.data, self.pitch, plane_index)
    }

    /// Write `pattern` at column `x`, one bit per plane.
    #[inline]
    pub fn put(&mut self, x: usize, pattern: u32) {
        let mut bits = pattern;
        let mut plane = 0;
        while bits != 0 && plane < self.planes {
            if bits & 1 != 0 {
                self.writer(plane).set_bit(x);
            }
            bits >>= 1;
            plane += 1;
        }
    }

    /// Reassemble the pattern written at column `x`.
    pub fn pattern_at(&self, x: usize) -> u32 {
        let mask = 0x80 >> (x % 8);
        (0..self.planes)
            .filter(|p| self.data[p * self.pitch + x / 8] & mask != 0)
            .fold(0, |acc, p| acc | (1 << p))
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }
}

/// Output of one channel: its subchannels plus the span of written columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRow {
    subchannels: Vec<PlaneRow>,
    row_ends: Option<(usize, usize)>,
}

impl ChannelRow {
    pub fn new(width: usize, subchannels: usize, planes: usize) -> Self {
        Self {
            subchannels: (0..subchannels).map(|_| PlaneRow::new(width, planes)).collect(),
            row_ends: None,
        }
    }

    /// Subchannel buffer, or `None` for an unconfigured subchannel.
    pub fn subchannel(&self, index: usize) -> Option<&PlaneRow> {
        self.subchannels.get(index)
    }

    pub fn subchannels(&self) -> &[PlaneRow] {
        &self.subchannels
    }

    /// Leftmost and rightmost columns written this row.
    pub fn row_ends(&self) -> Option<(usize, usize)> {
        self.row_ends
    }

    /// Fire `pattern` at column `x` in `subchannel`.
    #[inline]
    pub fn fire(&mut self, subchannel: usize, x: usize, pattern: u32) {
        if let Some(row) = self.subchannels.get_mut(subchannel) {
            row.put(x, pattern);
            self.row_ends = Some(match self.row_ends {
                None => (x, x),
                Some((first, last)) => (first.min(x), last.max(x)),
            });
        }
    }

    pub fn clear(&mut self) {
        self.subchannels.iter_mut().for_each(PlaneRow::clear);
        self.row_ends = None;
    }

    pub fn is_blank(&self) -> bool {
        self.subchannels.iter().all(PlaneRow::is_blank)
    }
}

/// Buffers for one scanline of every channel.
///
/// Allocated by [`crate::dither::Dither::allocate_output`]; owned and
/// recycled by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanlineBuffers {
    width: usize,
    channels: Vec<ChannelRow>,
}

impl ScanlineBuffers {
    pub fn new(width: usize, channels: Vec<ChannelRow>) -> Self {
        Self { width, channels }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn channel(&self, index: usize) -> Option<&ChannelRow> {
        self.channels.get(index)
    }

    pub fn channels(&self) -> &[ChannelRow] {
        &self.channels
    }

    pub(crate) fn channel_mut(&mut self, index: usize) -> &mut ChannelRow {
        &mut self.channels[index]
    }

    /// Shorthand for `channel(c)?.subchannel(s)`.
    pub fn subchannel(&self, channel: usize, subchannel: usize) -> Option<&PlaneRow> {
        self.channel(channel)?.subchannel(subchannel)
    }

    pub fn clear(&mut self) {
        self.channels.iter_mut().for_each(ChannelRow::clear);
    }

    pub fn is_blank(&self) -> bool {
        self.channels.iter().all(ChannelRow::is_blank)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_writer_stride() {
        let mut buf = vec![0u8; 6];
        BitPlaneWriter::new(&mut buf, 2, 1).set_bit(9);
        assert_eq!(buf, vec![0, 0, 0, 0x40, 0, 0]);
        BitPlaneWriter::new(&mut buf, 2, 2).set_bit(0);
        assert_eq!(buf, vec![0, 0, 0, 0x40, 0x80, 0]);
        BitPlaneWriter::new(&mut buf, 2, 1).clear();
        assert_eq!(buf, vec![0, 0, 0, 0, 0x80, 0]);
    }

    #[test]
    fn test_put_and_read_back() {
        let mut row = PlaneRow::new(12, 2);
        assert_eq!(row.pitch(), 2);
        row.put(3, 0b10);
        row.put(11, 0b11);
        assert_eq!(row.plane(0).unwrap(), &[0x00, 0x10]);
        assert_eq!(row.plane(1).unwrap(), &[0x10, 0x10]);
        assert_eq!(row.pattern_at(3), 0b10);
        assert_eq!(row.pattern_at(11), 0b11);
        assert_eq!(row.pattern_at(0), 0);
        assert!(row.plane(2).is_none());
    }

    #[test]
    fn test_channel_row_ends() {
        let mut ch = ChannelRow::new(16, 2, 1);
        assert_eq!(ch.row_ends(), None);
        ch.fire(1, 9, 1);
        ch.fire(0, 4, 1);
        ch.fire(0, 12, 1);
        assert_eq!(ch.row_ends(), Some((4, 12)));
        ch.fire(5, 0, 1);
        assert_eq!(ch.row_ends(), Some((4, 12)));
        ch.clear();
        assert!(ch.is_blank());
        assert_eq!(ch.row_ends(), None);
    }

    #[test]
    fn test_missing_lookups() {
        let out = ScanlineBuffers::new(8, vec![ChannelRow::new(8, 1, 1)]);
        assert!(out.subchannel(0, 0).is_some());
        assert!(out.subchannel(0, 1).is_none());
        assert!(out.subchannel(3, 0).is_none());
    }
}
