//! Difference hash.

use image::imageops::{self, FilterType};
use image::GrayImage;

use super::{check_dimension, BitMatrix};
use crate::error::Result;

/// Shrink to `(N+1) × N` and record whether each pixel is darker than its
/// right-hand neighbour.
///
/// Bit `(row y, col x)` is `pixel[x+1, y] > pixel[x, y]`.
pub fn dhash(gray: &GrayImage, dim: u32) -> Result<BitMatrix> {
    let n = check_dimension(dim)?;
    let small = imageops::resize(gray, dim + 1, dim, FilterType::Lanczos3);

    Ok(BitMatrix::from_fn(n, n, |y, x| {
        let left = small.get_pixel(x as u32, y as u32)[0];
        let right = small.get_pixel(x as u32 + 1, y as u32)[0];
        right > left
    }))
}
