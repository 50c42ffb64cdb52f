/*!
 * Audit Module
 * Decision records, deduplicating cache, formatting and sinks
 */

pub mod auditor;
pub mod cache;
pub mod format;
pub mod record;
pub mod sink;

pub use auditor::{AuditDecision, Auditor, AuditorStats};
pub use cache::{AuditCache, AuditNode, CacheStats};
pub use format::{format_record, mqueue_mask_names, SIG_NAMES};
pub use record::{
    AuditAddr, AuditData, AuditKey, AuditMode, AuditPayload, AuditRecord, AuditType, FileAudit,
    MqueueAudit, NetAudit, Operation, SignalAudit,
};
pub use sink::{AuditEvent, AuditSink, MemorySink, SinkStats, TracingSink};
