//! DCT-based perceptual hash.

use image::imageops::{self, FilterType};
use image::GrayImage;
use rustdct::{Dct2, DctPlanner};

use super::{check_dimension, BitMatrix};
use crate::error::{MediaSearchError, Result};

/// Shrink to `2N × 2N`, take the 2D DCT-II and keep the `N × N` low-frequency
/// block at rows `0..N`, columns `1..=N`; a bit is set when its coefficient is
/// above the block mean.
pub fn phash(gray: &GrayImage, dim: u32) -> Result<BitMatrix> {
    let n = check_dimension(dim)?;
    let side = 2 * n;
    let small = imageops::resize(gray, side as u32, side as u32, FilterType::Lanczos3);

    let pixels: Vec<f64> = small.pixels().map(|p| f64::from(p[0])).collect();
    let coefficients = dct_2d(&pixels, side)?;

    let block: Vec<f64> = (0..n)
        .flat_map(|row| (1..=n).map(move |col| (row, col)))
        .map(|(row, col)| coefficients[row * side + col])
        .collect();
    let mean = block.iter().sum::<f64>() / block.len() as f64;

    BitMatrix::new(n, n, block.iter().map(|v| *v > mean).collect())
}

/// Unnormalized DCT-II along rows, then along columns, of a square grid.
fn dct_2d(values: &[f64], size: usize) -> Result<Vec<f64>> {
    if values.len() != size * size {
        return Err(MediaSearchError::Hash(format!(
            "transform expects {} samples, got {}",
            size * size,
            values.len()
        )));
    }

    let dct = DctPlanner::<f64>::new().plan_dct2(size);
    let mut out = values.to_vec();
    for row in out.chunks_exact_mut(size) {
        dct.process_dct2(row);
    }

    let mut column = vec![0.0; size];
    for c in 0..size {
        for (r, value) in column.iter_mut().enumerate() {
            *value = out[r * size + c];
        }
        dct.process_dct2(&mut column);
        for (r, value) in column.iter().enumerate() {
            out[r * size + c] = *value;
        }
    }
    Ok(out)
}
