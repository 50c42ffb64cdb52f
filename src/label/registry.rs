/*!
 * Label Registry
 * Concurrent principal-to-label table
 */

use super::traits::LabelResolver;
use super::types::Label;
use crate::core::types::SubjectId;
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::Arc;

/// Label table keyed by subject id
pub struct LabelRegistry {
    labels: DashMap<SubjectId, Arc<Label>, RandomState>,
}

impl LabelRegistry {
    pub fn new() -> Self {
        Self {
            labels: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Attach a label, returning the one it replaced
    pub fn attach(&self, subject: SubjectId, label: Arc<Label>) -> Option<Arc<Label>> {
        self.labels.insert(subject, label)
    }

    pub fn detach(&self, subject: SubjectId) -> Option<Arc<Label>> {
        self.labels.remove(&subject).map(|(_, label)| label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for LabelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelResolver for LabelRegistry {
    fn resolve(&self, subject: SubjectId) -> Option<Arc<Label>> {
        self.labels.get(&subject).map(|entry| Arc::clone(entry.value()))
    }
}
