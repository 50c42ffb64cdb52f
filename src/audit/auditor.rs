/*!
 * Auditor
 * Turns one decision into at most one emitted audit message
 */

use super::cache::AuditNode;
use super::format::format_record;
use super::record::{AuditData, AuditMode, AuditRecord, AuditType};
use super::sink::{AuditEvent, AuditSink, TracingSink};
use crate::config::MediationConfig;
use crate::core::errors::MediationResult;
use crate::core::types::PermMask;
use crate::label::{Profile, ProfileMode};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// What happened to a decision's audit record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditDecision {
    /// Sent to the sink
    Emitted,
    /// Folded into an equal cached record
    Deduplicated,
    /// Filtered by audit and quiet modes
    Suppressed,
}

/// Audit pipeline shared by every entry point
pub struct Auditor {
    sink: Arc<dyn AuditSink>,
    config: MediationConfig,
    emitted: AtomicU64,
    deduplicated: AtomicU64,
    suppressed: AtomicU64,
}

impl Auditor {
    pub fn new(sink: Arc<dyn AuditSink>, config: MediationConfig) -> Self {
        Self {
            sink,
            config,
            emitted: AtomicU64::new(0),
            deduplicated: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
        }
    }

    /// Auditor writing through `tracing`
    pub fn tracing(config: MediationConfig) -> Self {
        Self::new(Arc::new(TracingSink), config)
    }

    #[inline]
    pub fn config(&self) -> &MediationConfig {
        &self.config
    }

    /// Record a profile decision.
    ///
    /// [`AuditType::Auto`] is resolved from `error` and the profile's modes:
    /// successes are only audited under [`AuditMode::All`], failures become
    /// ALLOWED in complain mode and DENIED otherwise. Kill mode upgrades
    /// DENIED to KILL.
    pub fn audit(
        &self,
        audit_type: AuditType,
        profile: &Profile,
        ad: &AuditData<'_>,
        request: PermMask,
        denied: PermMask,
        error: i32,
    ) -> MediationResult<AuditDecision> {
        let mut audit_type = audit_type;
        if audit_type == AuditType::Auto {
            audit_type = if error == 0 {
                if profile.audit_mode() != AuditMode::All {
                    return Ok(self.note_suppressed());
                }
                AuditType::Audit
            } else if profile.mode() == ProfileMode::Complain {
                AuditType::Allowed
            } else {
                AuditType::Denied
            };
        }

        match profile.audit_mode() {
            AuditMode::Quiet => return Ok(self.note_suppressed()),
            AuditMode::QuietDenied if audit_type == AuditType::Denied => {
                return Ok(self.note_suppressed())
            }
            _ => {}
        }

        if profile.mode() == ProfileMode::Kill && audit_type == AuditType::Denied {
            audit_type = AuditType::Kill;
        }

        let record = AuditRecord::from_data(audit_type, profile, ad, request, denied, error)?;
        if !self.config.dedup_audit {
            self.emit(record);
            return Ok(AuditDecision::Emitted);
        }
        Ok(self.dedup_emit(profile, record))
    }

    fn dedup_emit(&self, profile: &Profile, record: AuditRecord) -> AuditDecision {
        let cache = profile.audit_cache();

        if let Some(existing) = cache.find(&record) {
            return self.fold(profile, &existing, record);
        }

        let node = Arc::new(AuditNode::new(record));
        let cached = match self.config.audit_cache_capacity {
            Some(capacity) => cache.insert_bounded(Arc::clone(&node), capacity),
            None => cache.insert(Arc::clone(&node)),
        };

        if !Arc::ptr_eq(&cached, &node) {
            // raced an equal insert; ours was discarded
            let record = node.record().clone();
            return self.fold(profile, &cached, record);
        }

        self.emit(node.record().clone());
        AuditDecision::Emitted
    }

    /// Fold a repeat into its cached node; denied bits not seen before
    /// are reported again
    fn fold(&self, profile: &Profile, node: &AuditNode, record: AuditRecord) -> AuditDecision {
        let fresh = profile.audit_cache().update(node, &record);
        if fresh != 0 {
            self.emit(record);
            return AuditDecision::Emitted;
        }
        trace!(profile = profile.name(), hits = node.hits(), "audit deduplicated");
        self.deduplicated.fetch_add(1, Ordering::Relaxed);
        AuditDecision::Deduplicated
    }

    fn emit(&self, record: AuditRecord) {
        let message = format_record(&record, self.config.audit_header);
        self.sink.emit(&AuditEvent { record, message });
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a decision that produced no message
    pub fn note_suppressed(&self) -> AuditDecision {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
        AuditDecision::Suppressed
    }

    pub fn stats(&self) -> AuditorStats {
        AuditorStats {
            emitted: self.emitted.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
        }
    }
}

impl Default for Auditor {
    fn default() -> Self {
        Self::tracing(MediationConfig::default())
    }
}

impl std::fmt::Debug for Auditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auditor")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Auditor statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditorStats {
    pub emitted: u64,
    pub deduplicated: u64,
    pub suppressed: u64,
}
