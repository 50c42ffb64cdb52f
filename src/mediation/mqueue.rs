/*!
 * POSIX Message Queue Mediation
 *
 * Queues are matched by canonical name. When the name rule alone does not
 * grant the request, the queue's owner label is matched after the name and
 * its permissions widen the name rule's.
 */

use super::mediator::Mediator;
use crate::audit::{AuditData, AuditPayload, MqueueAudit, Operation};
use crate::core::errors::MediationError;
use crate::core::types::{PermMask, Uid};
use crate::engine::{check_perms, for_each_confined, label_match, resolve, resolve_set, Decision, Verdict};
use crate::label::{Label, Profile, Subject};
use crate::policy::{MediationClass, PermissionSet, Walk};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::trace;

/// A message queue as presented by the queue filesystem
pub trait QueueObject: Send + Sync {
    /// Name relative to the queue mount, with a leading `/`
    fn canonical_name(&self) -> Cow<'_, str>;

    /// Owner of the backing inode, if the queue has one
    fn owner_uid(&self) -> Option<Uid>;

    /// Label of the task that created the queue, if known
    fn owner_label(&self) -> Option<Arc<Label>>;
}

/// Plain queue description
#[derive(Debug, Clone)]
pub struct PosixQueue {
    name: String,
    owner_uid: Option<Uid>,
    owner_label: Option<Arc<Label>>,
}

impl PosixQueue {
    /// Queue named `name`; a missing leading `/` is added
    pub fn new(name: impl Into<String>) -> Self {
        let mut name = name.into();
        if !name.starts_with('/') {
            name.insert(0, '/');
        }
        Self {
            name,
            owner_uid: None,
            owner_label: None,
        }
    }

    pub fn with_owner(mut self, uid: Uid, label: Arc<Label>) -> Self {
        self.owner_uid = Some(uid);
        self.owner_label = Some(label);
        self
    }

    pub fn with_owner_uid(mut self, uid: Uid) -> Self {
        self.owner_uid = Some(uid);
        self
    }
}

impl QueueObject for PosixQueue {
    fn canonical_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn owner_uid(&self) -> Option<Uid> {
        self.owner_uid
    }

    fn owner_label(&self) -> Option<Arc<Label>> {
        self.owner_label.clone()
    }
}

impl Mediator {
    fn profile_mqueue_perm(
        &self,
        profile: &Profile,
        name: &str,
        owner: Option<&Label>,
        request: PermMask,
        ad: &AuditData<'_>,
    ) -> Verdict {
        if !profile.mediates(MediationClass::PosixMqueue) {
            return Ok(Decision::Allow);
        }
        let policy = profile.policy();
        let dfa = policy.dfa();
        let walk = Walk::new(dfa, policy.class_start(MediationClass::PosixMqueue))
            .str(name, "failed name match");
        let state = walk.state();
        let ad = ad.with_info(walk.info());
        let res = resolve(profile, &policy, state, request);
        if res.is_allowed() {
            return check_perms(&self.auditor, profile, &res, request, &ad);
        }

        let owner_state = dfa.null_transition(state);
        let owner_perms = match owner {
            Some(owner) => label_match(&policy, profile, owner, owner_state, request),
            None => PermissionSet::NONE,
        };
        trace!(profile = profile.name(), name, owner_allow = owner_perms.allow, "mqueue owner match");
        let perms = policy.lookup(state).union(&owner_perms);
        let res = resolve_set(profile, perms, state, request);
        check_perms(&self.auditor, profile, &res, request, &ad)
    }

    /// Access to `queue` by `subject`: open, create, unlink or attribute
    /// changes, as given by `op` and `request`
    pub fn mqueue_perm(
        &self,
        subject: &Subject,
        op: Operation,
        request: PermMask,
        queue: &dyn QueueObject,
    ) -> Verdict {
        let label = subject.label();
        if label.is_unconfined() {
            return Ok(Decision::Allow);
        }
        let name = queue.canonical_name();
        if name.len() > self.config().path_max {
            return Err(MediationError::NameTooLong(name.len()));
        }

        let owner = queue.owner_label();
        let payload = AuditPayload::Mqueue(MqueueAudit {
            fsuid: subject.cred.fsuid,
            ouid: queue.owner_uid().unwrap_or(subject.cred.fsuid),
        });
        let mut ad = AuditData::new(MediationClass::PosixMqueue, op)
            .with_payload(&payload)
            .with_name(&name);
        if let Some(owner) = owner.as_deref() {
            ad = ad.with_peer(owner);
        }

        self.traced(op, MediationClass::PosixMqueue, label, || {
            for_each_confined(label, |profile| {
                self.profile_mqueue_perm(profile, &name, owner.as_deref(), request, &ad)
            })
        })
    }
}
