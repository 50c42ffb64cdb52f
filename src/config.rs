/*!
 * Mediation Configuration
 *
 * Runtime knobs for audit emission and name handling
 */

use crate::core::limits::DEFAULT_PATH_MAX;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Mediation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediationConfig {
    /// Prefix emitted messages with `apparmor="TYPE"`
    pub audit_header: bool,
    /// Bound on each profile's audit cache; `None` keeps it unbounded
    pub audit_cache_capacity: Option<usize>,
    /// Collapse structurally identical audit records
    pub dedup_audit: bool,
    /// Longest canonical object name accepted
    pub path_max: usize,
    /// Trace every automaton field walked
    pub debug_decisions: bool,
}

impl Default for MediationConfig {
    fn default() -> Self {
        Self {
            audit_header: true,
            audit_cache_capacity: None,
            dedup_audit: true,
            path_max: DEFAULT_PATH_MAX,
            debug_decisions: false,
        }
    }
}

impl MediationConfig {
    /// Every decision reaches the sink, no header
    pub const fn verbose() -> Self {
        Self {
            audit_header: false,
            audit_cache_capacity: None,
            dedup_audit: false,
            path_max: DEFAULT_PATH_MAX,
            debug_decisions: true,
        }
    }

    /// Deduplicating with a bounded per-profile cache
    pub const fn bounded(capacity: usize) -> Self {
        Self {
            audit_header: true,
            audit_cache_capacity: Some(capacity),
            dedup_audit: true,
            path_max: DEFAULT_PATH_MAX,
            debug_decisions: false,
        }
    }

    /// Defaults overlaid with `LABELGATE_*` environment variables
    pub fn from_env() -> Self {
        Self::default().overlay_env()
    }

    /// Overlay `LABELGATE_*` environment variables; unparsable values are ignored
    pub fn overlay_env(mut self) -> Self {
        if let Some(v) = env_bool("LABELGATE_AUDIT_HEADER") {
            self.audit_header = v;
        }
        if let Some(v) = env_bool("LABELGATE_DEDUP_AUDIT") {
            self.dedup_audit = v;
        }
        if let Ok(raw) = std::env::var("LABELGATE_AUDIT_CACHE_CAPACITY") {
            match raw.trim() {
                "" | "none" | "unbounded" => self.audit_cache_capacity = None,
                value => match value.parse::<usize>() {
                    Ok(cap) if cap > 0 => self.audit_cache_capacity = Some(cap),
                    _ => warn!(value = %raw, "ignoring invalid LABELGATE_AUDIT_CACHE_CAPACITY"),
                },
            }
        }
        if let Ok(raw) = std::env::var("LABELGATE_PATH_MAX") {
            match raw.trim().parse::<usize>() {
                Ok(max) if max > 0 => self.path_max = max,
                _ => warn!(value = %raw, "ignoring invalid LABELGATE_PATH_MAX"),
            }
        }
        self
    }
}

fn env_bool(key: &str) -> Option<bool> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(key, value = %raw, "ignoring invalid boolean");
            None
        }
    }
}
