use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use tracing::debug;

use crate::value::TypedValue;

/// A fully materialized section: key to typed value.
pub type SectionValues = BTreeMap<String, TypedValue>;

/// Memoized sections, keyed by section name.
///
/// There is no per-entry expiry: the only invalidation is [`SectionCache::clear`].
#[derive(Debug, Default)]
pub struct SectionCache {
    entries: Mutex<HashMap<String, Arc<SectionValues>>>,
}

impl SectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, section: &str) -> Option<Arc<SectionValues>> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(section)
            .cloned()
    }

    /// Store `values` unless another reader cached the section first; returns
    /// the entry that ends up cached.
    pub fn put(&self, section: &str, values: SectionValues) -> Arc<SectionValues> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            entries
                .entry(section.to_string())
                .or_insert_with(|| Arc::new(values)),
        )
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        debug!("section cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
