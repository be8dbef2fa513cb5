//! Row scaffolding shared by the strategies: horizontal resampling, scan
//! direction and blank-row hysteresis.

use log::trace;

/// Horizontal layout of one scanline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub src_width: usize,
    pub dst_width: usize,
    pub channels: usize,
}

impl Geometry {
    /// Number of samples expected per scanline.
    pub fn samples_per_row(&self) -> usize {
        self.src_width * self.channels
    }

    /// Source column feeding output column `x`.
    ///
    /// Equivalent to walking `src_width` over `dst_width` with an integer
    /// Bresenham accumulator, but addressable in either scan direction.
    #[inline]
    pub fn source_column(&self, x: usize) -> usize {
        if self.src_width == self.dst_width {
            x
        } else {
            (x as u64 * self.src_width as u64 / self.dst_width as u64) as usize
        }
    }

    /// Sample of `channel` at output column `x`.
    #[inline]
    pub fn sample(&self, samples: &[u16], x: usize, channel: usize) -> u16 {
        samples[self.source_column(x) * self.channels + channel]
    }

    /// Whether every sample of the row is zero.
    pub fn row_is_blank(&self, samples: &[u16]) -> bool {
        samples.iter().all(|&s| s == 0)
    }

    /// Whether `zero_mask` flags every channel of the job as empty.
    pub fn mask_covers_all(&self, zero_mask: u64) -> bool {
        let all = if self.channels >= 64 { u64::MAX } else { (1u64 << self.channels) - 1 };
        zero_mask & all == all
    }
}

/// Serpentine scan order: even rows run left to right.
#[inline]
pub fn direction(row: usize) -> isize {
    if row % 2 == 0 { 1 } else { -1 }
}

/// Output columns of `row` in scan order.
pub fn columns(row: usize, width: usize) -> impl Iterator<Item = usize> {
    let forward = direction(row) > 0;
    (0..width).map(move |i| if forward { i } else { width - 1 - i })
}

/// What the stateful strategies do with the current row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    /// Dither normally
    Process,
    /// Zero all carried state and skip the row
    Reset,
    /// Skip the row
    Skip,
}

/// Consecutive-blank-row counter.
///
/// ```text
/// blank run:   1    2    3    4      5+
/// action:    proc proc proc reset  skip
/// ```
///
/// A row is blank when every sample is zero; callers' hints are not trusted.
#[derive(Debug, Clone, Default)]
pub struct BlankRows {
    run: usize,
}

pub const RESET_AFTER: usize = 4;

impl BlankRows {
    pub fn observe(&mut self, blank: bool) -> RowAction {
        self.run = if blank { self.run + 1 } else { 0 };
        match self.run {
            n if n < RESET_AFTER => RowAction::Process,
            RESET_AFTER => {
                trace!("{} blank rows, clearing carried state", RESET_AFTER);
                RowAction::Reset
            }
            _ => RowAction::Skip,
        }
    }

    pub fn run(&self) -> usize {
        self.run
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hysteresis_sequence() {
        let mut rows = BlankRows::default();
        let actions: Vec<RowAction> = (0..6).map(|_| rows.observe(true)).collect();
        assert_eq!(
            actions,
            vec![
                RowAction::Process,
                RowAction::Process,
                RowAction::Process,
                RowAction::Reset,
                RowAction::Skip,
                RowAction::Skip,
            ]
        );
        assert_eq!(rows.observe(false), RowAction::Process);
        assert_eq!(rows.run(), 0);
    }

    #[test]
    fn test_non_blank_row_ends_run() {
        let mut rows = BlankRows::default();
        rows.observe(true);
        rows.observe(true);
        assert_eq!(rows.run(), 2);
        assert_eq!(rows.observe(false), RowAction::Process);
        assert_eq!(rows.run(), 0);
    }

    #[test]
    fn test_source_column_resamples() {
        let g = Geometry {
            src_width: 4,
            dst_width: 8,
            channels: 1,
        };
        let cols: Vec<usize> = (0..8).map(|x| g.source_column(x)).collect();
        assert_eq!(cols, vec![0, 0, 1, 1, 2, 2, 3, 3]);
        let g = Geometry {
            src_width: 9,
            dst_width: 3,
            channels: 2,
        };
        assert_eq!(g.source_column(2), 6);
        assert_eq!(g.samples_per_row(), 18);
    }

    #[test]
    fn test_blank_detection() {
        let g = Geometry {
            src_width: 2,
            dst_width: 2,
            channels: 2,
        };
        assert!(g.row_is_blank(&[0, 0, 0, 0]));
        assert!(!g.row_is_blank(&[0, 5, 0, 0]));
        assert!(g.mask_covers_all(0b11));
        assert!(g.mask_covers_all(0b111));
        assert!(!g.mask_covers_all(0b01));
    }

    #[test]
    fn test_mask_never_blanks_samples() {
        let g = Geometry {
            src_width: 2,
            dst_width: 2,
            channels: 2,
        };
        assert!(g.mask_covers_all(0b11));
        assert!(!g.row_is_blank(&[0, 5, 0, 0]));
    }

    #[test]
    fn test_serpentine_columns() {
        assert_eq!(columns(0, 3).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(columns(1, 3).collect::<Vec<_>>(), vec![2, 1, 0]);
    }
}
