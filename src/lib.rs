/*!
 * Labelgate
 * Label-based access-control decisions with cross-checked mediation and
 * deduplicated auditing
 */

pub mod audit;
pub mod config;
pub mod core;
pub mod engine;
pub mod label;
pub mod mediation;
pub mod monitoring;
pub mod net;
pub mod policy;

// Re-exports
pub use crate::core::errors::{MediationError, MediationResult};
pub use audit::{AuditCache, AuditDecision, AuditRecord, AuditSink, Auditor, MemorySink, Operation, TracingSink};
pub use config::MediationConfig;
pub use engine::{Decision, Verdict};
pub use label::{Cred, Label, LabelRegistry, Profile, ProfileMode, Subject};
pub use mediation::{Mediator, PathMediator, PosixQueue, QueueObject};
pub use net::{RawSockAddr, SockAddr, Socket, UnixAddr};
pub use policy::{MediationClass, PermissionSet, Policy, PolicyBuilder};
