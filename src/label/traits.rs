/*!
 * Label Traits
 * Seam between callers and whatever owns the principal-to-label mapping
 */

use super::types::Label;
use crate::core::types::SubjectId;
use std::sync::Arc;

/// Resolves a principal to its current label
///
/// `None` means the principal carries no label; mediation treats it as
/// unconfined.
pub trait LabelResolver: Send + Sync {
    fn resolve(&self, subject: SubjectId) -> Option<Arc<Label>>;
}

impl<F> LabelResolver for F
where
    F: Fn(SubjectId) -> Option<Arc<Label>> + Send + Sync,
{
    fn resolve(&self, subject: SubjectId) -> Option<Arc<Label>> {
        self(subject)
    }
}
