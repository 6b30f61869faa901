//! Content-addressed cache of parsed frames.
//!
//! Keyed by a fingerprint of the raw input bytes: new bytes produce a new
//! entry, identical bytes hit the existing one. Memoization only, not a
//! correctness requirement; there is no eviction.

use polars::prelude::DataFrame;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Fingerprint of a raw input payload.
pub fn fingerprint(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Default)]
pub struct FrameCache {
    entries: HashMap<u64, DataFrame>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, bytes: &[u8]) -> Option<DataFrame> {
        self.entries.get(&fingerprint(bytes)).cloned()
    }

    pub fn insert(&mut self, bytes: &[u8], frame: DataFrame) {
        self.entries.insert(fingerprint(bytes), frame);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
