//! Fingerprint comparison against per-method thresholds.

use std::sync::Arc;

use crate::error::{MediaSearchError, Result};
use crate::fingerprint::{BitMatrix, MethodDescriptor, MethodTable};
use crate::model::{Evaluation, FingerprintEntry};

#[derive(Debug, Clone)]
pub struct Comparator {
    methods: Arc<MethodTable>,
}

impl Comparator {
    pub fn new(methods: Arc<MethodTable>) -> Self {
        Self { methods }
    }

    fn descriptor(&self, method: &str) -> Result<&MethodDescriptor> {
        self.methods
            .get(method)
            .ok_or_else(|| MediaSearchError::Comparison(format!("unknown method: {method}")))
    }

    /// Bit difference between two matrices under `method`'s comparison.
    pub fn distance(&self, method: &str, a: &BitMatrix, b: &BitMatrix) -> Result<u32> {
        (self.descriptor(method)?.compare)(a, b)
    }

    pub fn normalized_distance(diff: u32, dim: u32) -> f64 {
        f64::from(diff) / (f64::from(dim) * f64::from(dim))
    }

    /// `diff <= threshold(dim)` using the method's floor-lookup table.
    pub fn similar(&self, method: &str, diff: u32, dim: u32) -> Result<bool> {
        Ok(diff <= self.descriptor(method)?.thresholds.threshold_for(dim))
    }

    /// Compares two stored fingerprints of the same method and dimension.
    ///
    /// Returns the evaluation when the pair is similar, `None` otherwise.
    pub fn evaluate(
        &self,
        ours: &FingerprintEntry,
        theirs: &FingerprintEntry,
    ) -> Result<Option<Evaluation>> {
        if ours.method != theirs.method || ours.dim != theirs.dim {
            return Err(MediaSearchError::Comparison(format!(
                "cannot compare {}/{} with {}/{}",
                ours.method, ours.dim, theirs.method, theirs.dim
            )));
        }

        let n = ours.dim as usize;
        let a = BitMatrix::from_hex(&ours.repr, n, n)?;
        let b = BitMatrix::from_hex(&theirs.repr, n, n)?;
        let diff = self.distance(&ours.method, &a, &b)?;

        if !self.similar(&ours.method, diff, ours.dim)? {
            return Ok(None);
        }
        Ok(Some(Evaluation {
            method: ours.method.clone(),
            dim: ours.dim,
            diff,
            dist: Some(Self::normalized_distance(diff, ours.dim)),
        }))
    }
}
