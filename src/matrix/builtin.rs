//! Built-in threshold tiles.
//!
//! The square tile is a 64×64 Bayer matrix. Non-square sampling grids get a
//! stretched tile: each cell of the square tile is split into `r` columns
//! (or rows) so that dots stay evenly spaced in physical units when the
//! horizontal and vertical resolutions differ.

use super::DitherMatrix;
use crate::error::Result;

/// Base of the iterated fast matrix.
pub const SQ2: [u32; 4] = [0, 2, 3, 1];

/// Default expansion of [`SQ2`] for the fast modes (64×64).
pub const FAST_STEPS: u32 = 6;

const SQUARE_STEPS: u32 = 6;

/// Largest supported stretch factor; larger aspect ratios reuse it.
const MAX_STRETCH: usize = 8;

/// The 2×2 base iterated `steps` times.
pub fn iterated_2x2(steps: u32) -> Result<DitherMatrix> {
    DitherMatrix::iterated(2, 2, &SQ2, steps.clamp(1, 10))
}

/// Aspect-ratio bucket: the power-of-two stretch closest to `hi / lo`.
pub fn stretch_bucket(hi: u32, lo: u32) -> usize {
    let ratio = hi.max(1) / lo.max(1);
    let mut bucket = 1;
    while bucket < MAX_STRETCH && bucket * 2 <= ratio as usize {
        bucket *= 2;
    }
    bucket
}

/// Pick the built-in tile for a sampling grid.
///
/// `x_aspect` and `y_aspect` are the horizontal and vertical resolutions
/// (or any pair with the same ratio).
pub fn for_aspect(x_aspect: u32, y_aspect: u32) -> Result<DitherMatrix> {
    let square = iterated_2x2(SQUARE_STEPS)?;
    if x_aspect >= y_aspect {
        let r = stretch_bucket(x_aspect, y_aspect);
        if r == 1 { Ok(square) } else { stretch(&square, r) }
    } else {
        let r = stretch_bucket(y_aspect, x_aspect);
        Ok(stretch(&square, r)?.transposed())
    }
}

/// Widen a square tile by `r`, interleaving `r` sub-ranks per cell.
///
/// The sub-rank order is a bit-reversed sequence rotated by the row, so
/// neighbouring rows do not fill the same sub-column first.
fn stretch(square: &DitherMatrix, r: usize) -> Result<DitherMatrix> {
    let n = square.x_size();
    let cells = (n * square.y_size()) as u64;
    let bits = r.trailing_zeros();
    let mut ranks = Vec::with_capacity(n * r * square.y_size());
    for y in 0..square.y_size() {
        for x in 0..n * r {
            let base_rank = square.at(x / r, y) as u64 * cells / 65536;
            let sub = ((x % r) + y) % r;
            let sub = if bits == 0 {
                0
            } else {
                (sub as u32).reverse_bits() >> (u32::BITS - bits)
            };
            ranks.push((base_rank * r as u64 + sub as u64) as u32);
        }
    }
    DitherMatrix::from_ranks(n * r, square.y_size(), &ranks)
}
