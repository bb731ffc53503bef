//! Recency tracking for committed items.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

const CAPACITY: usize = 10;

/// Bounded history of recently committed item keys.
///
/// Shared by every session within one host view scope; the lock guards the
/// read-modify-write of the bounded list. Higher index means more recently
/// committed.
#[derive(Clone, Default)]
pub struct RecentItems {
    entries: Arc<Mutex<VecDeque<String>>>,
}

impl RecentItems {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a commit of `key`, promoting an existing entry to most recent.
    pub fn record(&self, key: &str) {
        let mut entries = self.entries.lock();
        if let Some(pos) = entries.iter().position(|e| e == key) {
            entries.remove(pos);
        }
        entries.push_back(key.to_string());
        if entries.len() > CAPACITY {
            entries.pop_front();
        }
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.entries.lock().iter().position(|e| e == key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
