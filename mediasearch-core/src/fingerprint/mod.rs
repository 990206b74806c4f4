//! Perceptual fingerprints for images.
//!
//! A fingerprint is a boolean bit matrix derived from a grayscale rendition of
//! the image. Two methods are provided:
//!
//! - **dhash**: horizontal gradient signs on an `(N+1) × N` thumbnail
//! - **phash**: low-frequency DCT coefficients of a `2N × 2N` thumbnail
//!   compared against their mean
//!
//! Matrices are persisted as a canonical hex string, eight bits per byte,
//! least-significant bit first.
//!
//! # Usage
//!
//! ```no_run
//! use mediasearch_core::fingerprint::{Fingerprinter, MethodTable};
//! use mediasearch_core::MediaClass;
//!
//! let bytes = std::fs::read("image.png").unwrap();
//! let fingerprinter = Fingerprinter::new(MethodTable::default().into());
//! for fp in fingerprinter.compute(&bytes, MediaClass::Image).unwrap() {
//!     println!("{} {} {}", fp.method, fp.dim, fp.matrix.to_hex());
//! }
//! ```

mod dhash;
mod methods;
mod phash;

pub use dhash::dhash;
pub use methods::{hamming, MethodDescriptor, MethodTable, ThresholdTable, DEFAULT_DIMENSIONS};
pub use phash::phash;

use std::sync::Arc;

use image::GrayImage;
use tracing::{debug, warn};

use crate::error::{MediaSearchError, Result};
use crate::model::{FingerprintEntry, MediaClass};

/// Smallest usable bit dimension.
pub const MIN_DIMENSION: u32 = 2;

/// Row-major boolean matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMatrix {
    rows: usize,
    cols: usize,
    bits: Vec<bool>,
}

impl BitMatrix {
    pub fn new(rows: usize, cols: usize, bits: Vec<bool>) -> Result<Self> {
        if bits.len() != rows * cols {
            return Err(MediaSearchError::Hash(format!(
                "bit count {} does not match shape {}x{}",
                bits.len(),
                rows,
                cols
            )));
        }
        Ok(Self { rows, cols, bits })
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut bits = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                bits.push(f(row, col));
            }
        }
        Self { rows, cols, bits }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        self.bits[row * self.cols + col]
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn count_ones(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    /// Number of positions where the two matrices differ.
    ///
    /// Matrices of different shape are not comparable.
    pub fn hamming_distance(&self, other: &Self) -> Result<u32> {
        if self.shape() != other.shape() {
            return Err(MediaSearchError::Comparison(format!(
                "fingerprints must be of the same shape: {:?} vs {:?}",
                self.shape(),
                other.shape()
            )));
        }
        Ok(self
            .bits
            .iter()
            .zip(other.bits.iter())
            .filter(|(a, b)| a != b)
            .count() as u32)
    }

    /// Canonical hex form: bit `i` adds `2^(i % 8)` to byte `i / 8`.
    pub fn to_hex(&self) -> String {
        let bytes: Vec<u8> = self
            .bits
            .chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |acc, (i, bit)| if *bit { acc | (1 << i) } else { acc })
            })
            .collect();
        hex::encode(bytes)
    }

    /// Rebuilds a matrix of the given shape from its canonical hex form.
    pub fn from_hex(repr: &str, rows: usize, cols: usize) -> Result<Self> {
        let bytes = hex::decode(repr)
            .map_err(|e| MediaSearchError::Hash(format!("invalid fingerprint hex: {e}")))?;
        let len = rows * cols;
        if bytes.len() != len.div_ceil(8) {
            return Err(MediaSearchError::Hash(format!(
                "fingerprint hex holds {} bytes, shape {}x{} needs {}",
                bytes.len(),
                rows,
                cols,
                len.div_ceil(8)
            )));
        }
        let bits = (0..len)
            .map(|i| bytes[i / 8] & (1 << (i % 8)) != 0)
            .collect();
        Ok(Self { rows, cols, bits })
    }
}

/// A computed fingerprint before it is flattened for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    pub method: String,
    pub dim: u32,
    pub matrix: BitMatrix,
}

impl Fingerprint {
    pub fn entry(&self) -> FingerprintEntry {
        FingerprintEntry {
            method: self.method.clone(),
            dim: self.dim,
            repr: self.matrix.to_hex(),
        }
    }
}

/// Runs every applicable method/dimension pair of a method table.
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    methods: Arc<MethodTable>,
}

impl Fingerprinter {
    pub fn new(methods: Arc<MethodTable>) -> Self {
        Self { methods }
    }

    pub fn methods(&self) -> &Arc<MethodTable> {
        &self.methods
    }

    /// Decode raw media bytes and compute all fingerprints for `class`.
    ///
    /// Individual method/dimension failures are logged and skipped; the call
    /// fails only when no pair produced a fingerprint.
    pub fn compute(&self, data: &[u8], class: MediaClass) -> Result<Vec<Fingerprint>> {
        let image = image::load_from_memory(data)
            .map_err(|e| MediaSearchError::Hash(format!("failed to decode media: {e}")))?;
        self.compute_gray(&image.to_luma8(), class)
    }

    pub fn compute_gray(&self, gray: &GrayImage, class: MediaClass) -> Result<Vec<Fingerprint>> {
        let mut fingerprints = Vec::new();

        for descriptor in self.methods.for_class(class) {
            for &dim in &descriptor.dimensions {
                match (descriptor.compute)(gray, dim) {
                    Ok(matrix) => {
                        debug!(method = %descriptor.name, dim, "Computed fingerprint");
                        fingerprints.push(Fingerprint {
                            method: descriptor.name.clone(),
                            dim,
                            matrix,
                        });
                    }
                    Err(e) => {
                        warn!(method = %descriptor.name, dim, error = %e, "Skipping fingerprint");
                    }
                }
            }
        }

        if fingerprints.is_empty() {
            return Err(MediaSearchError::Hash(format!(
                "no fingerprint method succeeded for class {class}"
            )));
        }
        Ok(fingerprints)
    }
}

pub(crate) fn check_dimension(dim: u32) -> Result<usize> {
    if dim < MIN_DIMENSION {
        return Err(MediaSearchError::Hash(format!(
            "dimension must be at least {MIN_DIMENSION}, got {dim}"
        )));
    }
    Ok(dim as usize)
}
