//! Immutable method-descriptor table.
//!
//! The table is built once and shared behind an `Arc`; tests and callers that
//! need different dimensions or thresholds build their own table instead of
//! mutating a shared one.

use std::collections::BTreeMap;
use std::fmt;

use image::GrayImage;

use super::{dhash, phash, BitMatrix};
use crate::error::Result;
use crate::model::MediaClass;

/// Dimensions computed for every method unless overridden.
pub const DEFAULT_DIMENSIONS: [u32; 2] = [8, 16];

pub type ComputeFn = fn(&GrayImage, u32) -> Result<BitMatrix>;
pub type CompareFn = fn(&BitMatrix, &BitMatrix) -> Result<u32>;

/// Hamming distance; the comparison used by every bundled method.
pub fn hamming(a: &BitMatrix, b: &BitMatrix) -> Result<u32> {
    a.hamming_distance(b)
}

/// Maximum accepted bit difference per dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdTable(BTreeMap<u32, u32>);

impl ThresholdTable {
    pub fn new(entries: impl IntoIterator<Item = (u32, u32)>) -> Self {
        Self(entries.into_iter().collect())
    }

    /// Exact key if present, else the greatest key below `dim`, else 0.
    pub fn threshold_for(&self, dim: u32) -> u32 {
        if let Some(threshold) = self.0.get(&dim) {
            return *threshold;
        }
        self.0
            .range(..dim)
            .next_back()
            .map(|(_, threshold)| *threshold)
            .unwrap_or(0)
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self::new([(0, 0), (8, 8), (16, 20), (32, 50)])
    }
}

#[derive(Clone)]
pub struct MethodDescriptor {
    pub name: String,
    pub classes: Vec<MediaClass>,
    pub compute: ComputeFn,
    pub compare: CompareFn,
    pub dimensions: Vec<u32>,
    pub thresholds: ThresholdTable,
}

impl MethodDescriptor {
    pub fn applies_to(&self, class: MediaClass) -> bool {
        self.classes.contains(&class)
    }

    fn image(name: &str, compute: ComputeFn) -> Self {
        Self {
            name: name.to_string(),
            classes: vec![MediaClass::Image],
            compute,
            compare: hamming,
            dimensions: DEFAULT_DIMENSIONS.to_vec(),
            thresholds: ThresholdTable::default(),
        }
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("classes", &self.classes)
            .field("dimensions", &self.dimensions)
            .field("thresholds", &self.thresholds)
            .finish_non_exhaustive()
    }
}

/// Ordered set of fingerprinting methods.
#[derive(Debug, Clone)]
pub struct MethodTable {
    methods: Vec<MethodDescriptor>,
}

impl MethodTable {
    pub fn new(methods: Vec<MethodDescriptor>) -> Self {
        Self { methods }
    }

    pub fn get(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn for_class(&self, class: MediaClass) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.iter().filter(move |m| m.applies_to(class))
    }

    pub fn iter(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.iter()
    }

    /// Same table with `dims` computed for every method.
    pub fn with_dimensions(mut self, dims: &[u32]) -> Self {
        for method in &mut self.methods {
            method.dimensions = dims.to_vec();
        }
        self
    }

    /// Same table with `thresholds` applied to every method.
    pub fn with_thresholds(mut self, thresholds: ThresholdTable) -> Self {
        for method in &mut self.methods {
            method.thresholds = thresholds.clone();
        }
        self
    }
}

impl Default for MethodTable {
    fn default() -> Self {
        Self::new(vec![
            MethodDescriptor::image("dhash", dhash),
            MethodDescriptor::image("phash", phash),
        ])
    }
}
