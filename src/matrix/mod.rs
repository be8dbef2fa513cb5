//! # Dither Matrices
//!
//! A dither matrix is a tile of thresholds repeated across the page. Every
//! strategy reads it: ordered modes compare the input directly against it,
//! error diffusion uses it to randomize its print threshold and to pick
//! between two candidate inks.
//!
//! ## Threshold Scale
//!
//! Matrices are built from *ranks* (0..n for an n-entry tile) and stored as
//! 16-bit thresholds:
//!
//! ```text
//! threshold = rank × 65536 / n
//!
//! 2×2 ranks {0, 2, 3, 1}  →  thresholds {0, 32768, 49152, 16384}
//! ```
//!
//! A sample fires against a threshold when it is strictly greater, so 0
//! never prints and 65535 always prints.
//!
//! ## Row Phase
//!
//! Each channel reads the shared tile through a [`MatrixCursor`] holding
//! its own x/y offsets. Offsetting channels keeps their dots from landing
//! on top of each other. The cursor caches the start of the current tile
//! row, so per-pixel lookups are a mask and an add:
//!
//! ```text
//!           x_offset
//!           ──►
//!  ┌────────┬────────┐
//!  │ ▓      │ ▓      │  row_base = ((y + y_offset) mod y_size) × x_size
//!  │    ▓   │    ▓   │  point(x) = tile[row_base + (x + x_offset) mod x_size]
//!  └────────┴────────┘
//! ```

pub mod builtin;

use std::sync::Arc;

use crate::error::{DitherError, Result};

/// A tile of 16-bit thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DitherMatrix {
    x_size: usize,
    y_size: usize,
    values: Vec<u32>,
    fast_mask: Option<usize>,
}

impl DitherMatrix {
    /// Build a matrix from ranks `0..x_size*y_size`, row-major.
    pub fn from_ranks(x_size: usize, y_size: usize, ranks: &[u32]) -> Result<Self> {
        let total = x_size * y_size;
        if total == 0 {
            return Err(DitherError::Matrix("matrix has no entries".to_string()));
        }
        if ranks.len() != total {
            return Err(DitherError::Matrix(format!(
                "expected {} entries for a {}x{} matrix, got {}",
                total,
                x_size,
                y_size,
                ranks.len()
            )));
        }
        if let Some(bad) = ranks.iter().find(|&&r| r as usize >= total) {
            return Err(DitherError::Matrix(format!(
                "rank {} out of range for {} entries",
                bad, total
            )));
        }
        let values = ranks
            .iter()
            .map(|&r| ((r as u64 * 65536) / total as u64) as u32)
            .collect();
        Ok(Self::with_values(x_size, y_size, values))
    }

    /// Build a matrix from thresholds already on the 0-65535 scale.
    pub fn from_thresholds(x_size: usize, y_size: usize, thresholds: &[u32]) -> Result<Self> {
        if x_size * y_size == 0 || thresholds.len() != x_size * y_size {
            return Err(DitherError::Matrix(format!(
                "expected {} thresholds, got {}",
                x_size * y_size,
                thresholds.len()
            )));
        }
        if let Some(bad) = thresholds.iter().find(|&&t| t > 65535) {
            return Err(DitherError::Matrix(format!("threshold {} above 65535", bad)));
        }
        Ok(Self::with_values(x_size, y_size, thresholds.to_vec()))
    }

    /// Validate and build a caller-supplied matrix.
    ///
    /// User matrices must be square with a power-of-two side. A malformed
    /// matrix aborts job construction instead of silently degrading output.
    pub fn from_user(size: usize, values: &[u32], prescaled: bool) -> Result<Self> {
        if size == 0 || !size.is_power_of_two() {
            return Err(DitherError::Matrix(format!(
                "side {} is not a power of two",
                size
            )));
        }
        if values.len() != size * size {
            return Err(DitherError::Matrix(format!(
                "a {}x{} matrix needs {} values, got {}",
                size,
                size,
                size * size,
                values.len()
            )));
        }
        if prescaled {
            Self::from_thresholds(size, size, values)
        } else {
            Self::from_ranks(size, size, values)
        }
    }

    /// Expand a small base matrix by recursive self-substitution.
    ///
    /// The 2×2 base `{0, 2, 3, 1}` iterated `n` times is the classic
    /// `2ⁿ × 2ⁿ` Bayer matrix.
    pub fn iterated(base_x: usize, base_y: usize, base: &[u32], exponent: u32) -> Result<Self> {
        let cells = base_x * base_y;
        if cells == 0 || base.len() != cells || exponent == 0 {
            return Err(DitherError::Matrix(
                "iterated matrix needs a non-empty base and exponent".to_string(),
            ));
        }
        let x_size = base_x.pow(exponent);
        let y_size = base_y.pow(exponent);
        let mut ranks = Vec::with_capacity(x_size * y_size);
        for y in 0..y_size {
            for x in 0..x_size {
                let (mut xd, mut yd) = (x, y);
                let mut rank = 0u32;
                let mut weight = (cells as u32).pow(exponent - 1);
                for _ in 0..exponent {
                    rank += base[(yd % base_y) * base_x + xd % base_x] * weight;
                    xd /= base_x;
                    yd /= base_y;
                    weight /= cells as u32;
                }
                ranks.push(rank);
            }
        }
        Self::from_ranks(x_size, y_size, &ranks)
    }

    fn with_values(x_size: usize, y_size: usize, values: Vec<u32>) -> Self {
        let fast_mask = x_size.is_power_of_two().then(|| x_size - 1);
        Self {
            x_size,
            y_size,
            values,
            fast_mask,
        }
    }

    /// Swap rows and columns.
    pub fn transposed(&self) -> Self {
        let mut values = Vec::with_capacity(self.values.len());
        for x in 0..self.x_size {
            for y in 0..self.y_size {
                values.push(self.values[y * self.x_size + x]);
            }
        }
        Self::with_values(self.y_size, self.x_size, values)
    }

    #[inline]
    pub fn x_size(&self) -> usize {
        self.x_size
    }

    #[inline]
    pub fn y_size(&self) -> usize {
        self.y_size
    }

    /// Threshold at an absolute position, wrapping in both directions.
    #[inline]
    pub fn at(&self, x: usize, y: usize) -> u32 {
        self.values[(y % self.y_size) * self.x_size + x % self.x_size]
    }
}

/// A channel's view of a shared matrix: offsets plus the current row phase.
///
/// A staggered cursor also steps down one tile row every few columns. A
/// single row of a Bayer tile only holds part of the threshold range (the
/// even rows of the 2×2 base hold {0, 2}), so a decision that reads one
/// row for a whole scanline is biased row by row. Staggering lets every
/// short run of columns see all cells of the base pattern:
///
/// ```text
///  plain      x: 0 1 2 3 4 5      staggered  x: 0 1 2 3 4 5
///  row y      ● ● ● ● ● ●         row y      ● ●
///  row y+1                        row y+1        ● ●
///  row y+2                        row y+2            ● ●
/// ```
#[derive(Debug, Clone)]
pub struct MatrixCursor {
    matrix: Arc<DitherMatrix>,
    x_offset: usize,
    y_offset: usize,
    row: usize,
    row_base: usize,
    stagger: Option<u32>,
}

impl MatrixCursor {
    pub fn new(matrix: Arc<DitherMatrix>, x_offset: usize, y_offset: usize) -> Self {
        let x_offset = x_offset % matrix.x_size;
        let y_offset = y_offset % matrix.y_size;
        let mut cursor = Self {
            matrix,
            x_offset,
            y_offset,
            row: 0,
            row_base: 0,
            stagger: None,
        };
        cursor.set_row(0);
        cursor
    }

    /// A cursor that advances one tile row every `2 × stretch` columns,
    /// where `stretch` is how many columns a tile cell spans in a widened
    /// tile (1 for square and tall tiles).
    pub fn staggered(matrix: Arc<DitherMatrix>, x_offset: usize, y_offset: usize) -> Self {
        let stretch = (matrix.x_size / matrix.y_size).max(1);
        let shift = 1 + stretch.ilog2();
        Self {
            stagger: Some(shift),
            ..Self::new(matrix, x_offset, y_offset)
        }
    }

    /// Move the row phase to scanline `y`.
    #[inline]
    pub fn set_row(&mut self, y: usize) {
        self.row = (y + self.y_offset) % self.matrix.y_size;
        self.row_base = self.row * self.matrix.x_size;
    }

    /// Threshold for column `x` of the current row.
    #[inline]
    pub fn point(&self, x: usize) -> u32 {
        let col = match self.matrix.fast_mask {
            Some(mask) => (x + self.x_offset) & mask,
            None => (x + self.x_offset) % self.matrix.x_size,
        };
        let row_base = match self.stagger {
            Some(shift) => ((self.row + (x >> shift)) % self.matrix.y_size) * self.matrix.x_size,
            None => self.row_base,
        };
        self.matrix.values[row_base + col]
    }

    pub fn offsets(&self) -> (usize, usize) {
        (self.x_offset, self.y_offset)
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
    fn test_two_by_two_thresholds() {
        let m = DitherMatrix::from_user(2, &[0, 2, 3, 1], false).unwrap();
        assert_eq!(m.at(0, 0), 0);
        assert_eq!(m.at(1, 0), 32768);
        assert_eq!(m.at(0, 1), 49152);
        assert_eq!(m.at(1, 1), 16384);
    }

    #[test]
    fn test_user_matrix_validation() {
        assert!(DitherMatrix::from_user(3, &[0; 9], false).is_err());
        assert!(DitherMatrix::from_user(2, &[0, 1, 2], false).is_err());
        assert!(DitherMatrix::from_user(2, &[0, 1, 2, 4], false).is_err());
        assert!(DitherMatrix::from_user(0, &[], false).is_err());
        assert!(DitherMatrix::from_user(2, &[0, 70000, 1, 2], true).is_err());
        assert!(DitherMatrix::from_user(2, &[0, 40000, 1, 2], true).is_ok());
    }

    #[test]
    fn test_iterated_is_bayer() {
        let m = DitherMatrix::iterated(2, 2, &[0, 2, 3, 1], 2).unwrap();
        let ranks: Vec<u32> = (0..4)
            .flat_map(|y| (0..4).map(move |x| (x, y)))
            .map(|(x, y)| m.at(x, y) / 4096)
            .collect();
        assert_eq!(
            ranks,
            vec![0, 8, 2, 10, 12, 4, 14, 6, 3, 11, 1, 9, 15, 7, 13, 5]
        );
    }

    #[test]
    fn test_iterated_ranks_are_unique() {
        let m = DitherMatrix::iterated(2, 2, &[0, 2, 3, 1], 5).unwrap();
        assert_eq!(m.x_size(), 32);
        let mut seen = vec![false; 1024];
        for y in 0..32 {
            for x in 0..32 {
                let rank = (m.at(x, y) / 64) as usize;
                assert!(!seen[rank], "duplicate rank {}", rank);
                seen[rank] = true;
            }
        }
    }

    #[test]
    fn test_transpose() {
        let m = DitherMatrix::from_ranks(2, 1, &[1, 0]).unwrap();
        let t = m.transposed();
        assert_eq!((t.x_size(), t.y_size()), (1, 2));
        assert_eq!(t.at(0, 0), m.at(0, 0));
        assert_eq!(t.at(0, 1), m.at(1, 0));
    }

    #[test]
    fn test_cursor_wraps_and_offsets() {
        let m = Arc::new(DitherMatrix::from_user(2, &[0, 2, 3, 1], false).unwrap());
        let mut c = MatrixCursor::new(m.clone(), 1, 1);
        c.set_row(0);
        assert_eq!(c.point(0), m.at(1, 1));
        assert_eq!(c.point(1), m.at(0, 1));
        c.set_row(5);
        assert_eq!(c.point(2), m.at(1, 0));
    }

    #[test]
    fn test_cursor_non_power_of_two() {
        let m = Arc::new(DitherMatrix::from_ranks(3, 1, &[0, 1, 2]).unwrap());
        let c = MatrixCursor::new(m.clone(), 0, 0);
        assert_eq!(c.point(4), m.at(1, 0));
    }

    #[test]
    fn test_staggered_cursor_walks_down() {
        let m = Arc::new(DitherMatrix::from_user(2, &[0, 2, 3, 1], false).unwrap());
        let c = MatrixCursor::staggered(m, 0, 0);
        let points: Vec<u32> = (0..4).map(|x| c.point(x)).collect();
        assert_eq!(points, vec![0, 32768, 49152, 16384]);
    }

    /// Points below each quarter level over one tile width, for every row.
    fn quarter_counts(cursor: &mut MatrixCursor, rows: usize, width: usize) -> Vec<[usize; 3]> {
        (0..rows)
            .map(|y| {
                cursor.set_row(y);
                let mut counts = [0; 3];
                for x in 0..width {
                    let p = cursor.point(x);
                    for (i, level) in [16384, 32768, 49152].into_iter().enumerate() {
                        counts[i] += usize::from(p < level);
                    }
                }
                counts
            })
            .collect()
    }

    #[test]
    fn test_staggered_rows_are_balanced() {
        for (x_aspect, y_aspect) in [(720, 720), (1440, 720), (720, 1440)] {
            let m = Arc::new(builtin::for_aspect(x_aspect, y_aspect).unwrap());
            let rows = m.y_size();
            let mut cursor = MatrixCursor::staggered(m, 21, 42);
            for counts in quarter_counts(&mut cursor, rows, 64) {
                assert_eq!(counts, [16, 32, 48], "{}x{}", x_aspect, y_aspect);
            }
        }

        // Reading a single Bayer row is lopsided
        let m = Arc::new(builtin::for_aspect(720, 720).unwrap());
        let mut plain = MatrixCursor::new(m, 0, 0);
        assert_eq!(quarter_counts(&mut plain, 1, 64)[0][2], 64);
    }
}
