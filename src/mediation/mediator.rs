/*!
 * Mediator
 * Shared state behind every mediation entry point
 */

use super::traits::{PathMediator, UnmediatedPaths};
use crate::audit::{AuditSink, Auditor, AuditorStats, Operation};
use crate::config::MediationConfig;
use crate::engine::{Decision, Verdict};
use crate::label::Label;
use crate::monitoring::span_decision;
use crate::policy::MediationClass;
use std::sync::Arc;
use tracing::debug;

/// Entry point for all access decisions
///
/// Holds the audit pipeline and the path collaborator. Cheap to clone.
#[derive(Clone)]
pub struct Mediator {
    pub(crate) auditor: Arc<Auditor>,
    pub(crate) paths: Arc<dyn PathMediator>,
}

impl Mediator {
    pub fn new(auditor: Arc<Auditor>) -> Self {
        debug!(config = ?auditor.config(), "initializing mediator");
        Self {
            auditor,
            paths: Arc::new(UnmediatedPaths),
        }
    }

    /// Mediator emitting to `sink`
    pub fn with_sink(sink: Arc<dyn AuditSink>, config: MediationConfig) -> Self {
        Self::new(Arc::new(Auditor::new(sink, config)))
    }

    /// Attach the collaborator used for filesystem-bound sockets
    pub fn with_path_mediator(mut self, paths: Arc<dyn PathMediator>) -> Self {
        self.paths = paths;
        self
    }

    #[inline]
    pub fn auditor(&self) -> &Auditor {
        &self.auditor
    }

    #[inline]
    pub fn config(&self) -> &MediationConfig {
        self.auditor.config()
    }

    pub fn audit_stats(&self) -> AuditorStats {
        self.auditor.stats()
    }

    /// Run one top-level decision, inside a span when decisions are traced
    pub(crate) fn traced<F>(&self, op: Operation, class: MediationClass, label: &Label, decide: F) -> Verdict
    where
        F: FnOnce() -> Verdict,
    {
        if !self.config().debug_decisions {
            return decide();
        }
        let span = span_decision(op.as_str(), class.name(), label.name());
        let _entered = span.enter();
        let verdict = decide();
        span.record("verdict", verdict_name(&verdict));
        verdict
    }
}

impl Default for Mediator {
    fn default() -> Self {
        Self::new(Arc::new(Auditor::default()))
    }
}

impl std::fmt::Debug for Mediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mediator")
            .field("auditor", &self.auditor)
            .finish_non_exhaustive()
    }
}

fn verdict_name(verdict: &Verdict) -> &'static str {
    match verdict {
        Ok(Decision::Allow) => "allow",
        Ok(Decision::Complain { .. }) => "complain",
        Err(e) if e.is_denial() => "deny",
        Err(_) => "error",
    }
}
