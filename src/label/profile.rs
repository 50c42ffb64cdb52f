/*!
 * Profiles
 * One confinement unit: a published policy, enforcement mode and audit cache
 */

use crate::audit::cache::AuditCache;
use crate::audit::record::AuditMode;
use crate::core::id::ProfileId;
use crate::core::limits::{ROOT_NAMESPACE, UNCONFINED_NAME};
use crate::policy::{MediationClass, Policy};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use smartstring::alias::String as InlineString;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Enforcement mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileMode {
    /// Denials are enforced
    Enforce,
    /// Denials are logged and allowed
    Complain,
    /// Denials terminate the caller
    Kill,
    /// No policy applies
    Unconfined,
}

impl ProfileMode {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Enforce => "enforce",
            Self::Complain => "complain",
            Self::Kill => "kill",
            Self::Unconfined => "unconfined",
        }
    }
}

/// Path handling flags
pub mod path_flags {
    /// Check deleted filesystem objects by their last known name
    pub const MEDIATE_DELETED: u32 = 0x1;
    /// Request carries socket uid/mode conditionals
    pub const SOCK_COND: u32 = 0x2;
}

/// A named confinement profile
///
/// The policy is published through an [`ArcSwap`] so decisions in flight keep
/// reading the snapshot they started with while a reload swaps in a new one.
pub struct Profile {
    id: ProfileId,
    name: InlineString,
    namespace: InlineString,
    mode: ProfileMode,
    audit_mode: AuditMode,
    path_flags: u32,
    policy: ArcSwap<Policy>,
    audit_cache: AuditCache,
}

impl Profile {
    /// Enforcing profile in the root namespace
    pub fn new(name: impl Into<InlineString>, policy: Policy) -> Self {
        Self {
            id: ProfileId::next(),
            name: name.into(),
            namespace: ROOT_NAMESPACE.into(),
            mode: ProfileMode::Enforce,
            audit_mode: AuditMode::Normal,
            path_flags: 0,
            policy: ArcSwap::from_pointee(policy),
            audit_cache: AuditCache::new(),
        }
    }

    pub fn unconfined() -> Self {
        Self::new(UNCONFINED_NAME, Policy::empty()).with_mode(ProfileMode::Unconfined)
    }

    pub fn with_mode(mut self, mode: ProfileMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_audit_mode(mut self, audit_mode: AuditMode) -> Self {
        self.audit_mode = audit_mode;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<InlineString>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_path_flags(mut self, flags: u32) -> Self {
        self.path_flags = flags;
        self
    }

    #[inline]
    pub fn id(&self) -> ProfileId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[inline]
    pub fn mode(&self) -> ProfileMode {
        self.mode
    }

    #[inline]
    pub fn audit_mode(&self) -> AuditMode {
        self.audit_mode
    }

    #[inline]
    pub fn path_flags(&self) -> u32 {
        self.path_flags
    }

    #[inline]
    pub fn is_unconfined(&self) -> bool {
        self.mode == ProfileMode::Unconfined
    }

    /// Snapshot of the published policy
    #[inline]
    pub fn policy(&self) -> Arc<Policy> {
        self.policy.load_full()
    }

    /// Whether this profile has rules for `class`
    pub fn mediates(&self, class: MediationClass) -> bool {
        !self.is_unconfined() && self.policy.load().mediates(class)
    }

    /// Publish a replacement policy.
    ///
    /// Cached audit records describe decisions against the old policy and are
    /// dropped.
    pub fn replace_policy(&self, policy: Policy) {
        self.policy.store(Arc::new(policy));
        self.audit_cache.clear();
        debug!(profile = %self.name, "policy replaced");
    }

    #[inline]
    pub fn audit_cache(&self) -> &AuditCache {
        &self.audit_cache
    }

    /// Release the audit cache; later audits from this profile are not cached
    pub fn teardown(&self) {
        self.audit_cache.destroy();
        debug!(profile = %self.name, "profile torn down");
    }
}

impl Drop for Profile {
    fn drop(&mut self) {
        self.audit_cache.destroy();
    }
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("mode", &self.mode)
            .field("audit_mode", &self.audit_mode)
            .field("cached_audits", &self.audit_cache.size())
            .finish()
    }
}
