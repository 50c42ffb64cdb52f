/*!
 * Audit Sinks
 * Where emitted decisions go: tracing output or an in-memory trail
 */

use super::record::{AuditRecord, AuditType};
use crate::core::limits::{MAX_SINK_EVENTS, MAX_SINK_EVENTS_PER_LABEL};
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{info, warn};

/// One emitted audit message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub record: AuditRecord,
    /// Rendered audit line
    pub message: String,
}

/// Receives every emitted (non-deduplicated) decision
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: &AuditEvent);
}

impl<S: AuditSink + ?Sized> AuditSink for Arc<S> {
    fn emit(&self, event: &AuditEvent) {
        (**self).emit(event)
    }
}

/// Forwards audit lines to `tracing`; denials at warn, the rest at info
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn emit(&self, event: &AuditEvent) {
        let record = &event.record;
        match record.audit_type {
            AuditType::Denied | AuditType::Kill | AuditType::Error => warn!(
                target: "labelgate::audit",
                profile = %record.profile,
                op = record.op.as_str(),
                class = record.class.name(),
                "{}",
                event.message
            ),
            _ => info!(
                target: "labelgate::audit",
                profile = %record.profile,
                op = record.op.as_str(),
                class = record.class.name(),
                "{}",
                event.message
            ),
        }
    }
}

/// Bounded in-memory audit trail
pub struct MemorySink {
    /// Global ring buffer
    events: RwLock<VecDeque<AuditEvent>>,
    /// Per-profile trails
    profile_events: DashMap<String, VecDeque<AuditEvent>, RandomState>,
    denial_counts: DashMap<String, u64, RandomState>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(VecDeque::with_capacity(MAX_SINK_EVENTS)),
            profile_events: DashMap::with_hasher(RandomState::new()),
            denial_counts: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Most recent events first
    pub fn recent(&self, limit: usize) -> Vec<AuditEvent> {
        let events = self.events.read();
        events.iter().rev().take(limit).cloned().collect()
    }

    /// Every retained event, oldest first
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn for_profile(&self, profile: &str, limit: usize) -> Vec<AuditEvent> {
        self.profile_events
            .get(profile)
            .map(|entry| entry.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    pub fn denial_count(&self, profile: &str) -> u64 {
        self.denial_counts.get(profile).map(|e| *e).unwrap_or(0)
    }

    pub fn clear(&self) {
        self.events.write().clear();
        self.profile_events.clear();
        self.denial_counts.clear();
    }

    pub fn stats(&self) -> SinkStats {
        SinkStats {
            total_events: self.events.read().len(),
            total_denials: self.denial_counts.iter().map(|e| *e.value()).sum(),
            profiles_tracked: self.profile_events.len(),
        }
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for MemorySink {
    fn emit(&self, event: &AuditEvent) {
        let profile = event.record.profile.to_string();

        {
            let mut events = self.events.write();
            if events.len() >= MAX_SINK_EVENTS {
                events.pop_front();
            }
            events.push_back(event.clone());
        }

        {
            let mut trail = self
                .profile_events
                .entry(profile.clone())
                .or_insert_with(|| VecDeque::with_capacity(MAX_SINK_EVENTS_PER_LABEL));
            if trail.len() >= MAX_SINK_EVENTS_PER_LABEL {
                trail.pop_front();
            }
            trail.push_back(event.clone());
        }

        if event.record.is_denial() {
            *self.denial_counts.entry(profile).or_insert(0) += 1;
        }
    }
}

/// Sink statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkStats {
    pub total_events: usize,
    pub total_denials: u64,
    pub profiles_tracked: usize,
}
