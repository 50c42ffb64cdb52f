/*!
 * Permission Resolver
 * Turns an automaton state into a mode-adjusted permission set and a verdict
 */

use super::decision::{Decision, Verdict};
use crate::audit::{AuditData, AuditType, Auditor};
use crate::audit::record::AuditMode;
use crate::core::errors::MediationError;
use crate::core::limits::DFA_NOMATCH;
use crate::core::types::{PermMask, StateId};
use crate::label::{Label, Profile, ProfileMode, LABEL_SEPARATOR};
use crate::policy::{mask, PermissionSet, Policy};
use std::borrow::Cow;
use tracing::trace;

/// Permissions for one state after profile modes were applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub state: StateId,
    pub perms: PermissionSet,
    pub denied: PermMask,
}

impl Resolution {
    /// Nothing requested is denied. Complain mode is not applied here, so a
    /// complaining profile's denials still count.
    #[inline]
    pub fn is_allowed(&self) -> bool {
        self.denied == 0
    }

    /// Denied, but every denied bit is covered by the complain mask and
    /// none by the kill mask
    #[inline]
    pub fn complains(&self) -> bool {
        self.denied != 0 && self.denied & self.perms.kill == 0 && self.denied & !self.perms.complain == 0
    }

    /// Whether [`check_perms`] will let the request through
    #[inline]
    pub fn proceeds(&self) -> bool {
        self.is_allowed() || self.complains()
    }

    #[inline]
    pub fn matched(&self) -> bool {
        self.state != DFA_NOMATCH
    }
}

/// Apply a profile's audit and enforcement modes to a raw set
pub fn apply_modes(profile: &Profile, perms: &mut PermissionSet) {
    match profile.audit_mode() {
        AuditMode::All => {
            perms.audit = mask::ALL;
            perms.quiet = 0;
        }
        AuditMode::NoQuiet => perms.quiet = 0,
        AuditMode::Quiet => {
            perms.audit = 0;
            perms.quiet = mask::ALL;
        }
        AuditMode::QuietDenied => perms.quiet = mask::ALL,
        AuditMode::Normal => {}
    }

    match profile.mode() {
        ProfileMode::Kill => perms.kill = mask::ALL,
        ProfileMode::Complain => perms.complain = mask::ALL,
        ProfileMode::Enforce | ProfileMode::Unconfined => {}
    }
}

/// Table lookup followed by mode overrides
pub fn resolve_perms(profile: &Profile, policy: &Policy, state: StateId) -> PermissionSet {
    let mut perms = policy.lookup(state);
    apply_modes(profile, &mut perms);
    perms
}

/// Resolve `state` against `request`.
///
/// The result is not a verdict: [`check_perms`] applies the kill and
/// complain masks and gives the final decision.
pub fn resolve(profile: &Profile, policy: &Policy, state: StateId, request: PermMask) -> Resolution {
    let perms = resolve_perms(profile, policy, state);
    Resolution {
        state,
        perms,
        denied: perms.denied(request),
    }
}

/// Resolve a set produced by label matching
pub fn resolve_set(
    profile: &Profile,
    mut perms: PermissionSet,
    state: StateId,
    request: PermMask,
) -> Resolution {
    apply_modes(profile, &mut perms);
    Resolution {
        state,
        perms,
        denied: perms.denied(request),
    }
}

/// Whether matching may stop at `state`.
///
/// It may unless the request is not yet satisfied and the state says
/// later fields can grant more.
pub fn early_match(policy: &Policy, state: StateId, request: PermMask) -> bool {
    let perms = policy.lookup(state);
    perms.allow & request == request || perms.allow & mask::CONT_MATCH == 0
}

/// Name of `peer` as seen from `subject`'s namespace
fn component_name<'a>(subject: &Profile, peer: &'a Profile) -> Cow<'a, str> {
    if subject.namespace() == peer.namespace() {
        Cow::Borrowed(peer.name())
    } else {
        Cow::Owned(format!(":{}:{}", peer.namespace(), peer.name()))
    }
}

/// Match one peer profile name from `state`
pub fn match_component(policy: &Policy, state: StateId, subject: &Profile, peer: &Profile) -> StateId {
    policy
        .dfa()
        .advance_str(state, &component_name(subject, peer))
}

fn compound_match(policy: &Policy, state: StateId, subject: &Profile, peer: &Label) -> StateId {
    let dfa = policy.dfa();
    peer.profiles()
        .iter()
        .enumerate()
        .fold(state, |state, (i, component)| {
            let state = if i > 0 {
                dfa.advance_str(state, LABEL_SEPARATOR)
            } else {
                state
            };
            dfa.advance_str(state, &component_name(subject, component))
        })
}

/// Raw permissions granted towards a whole peer label, with the state
/// they were read from.
///
/// The rendered label is tried first; when that does not satisfy the
/// request every component is matched from `state` and the results are
/// accumulated. A component that leaves the automaton grants nothing and
/// the returned state is [`DFA_NOMATCH`].
pub fn match_label(
    policy: &Policy,
    subject: &Profile,
    peer: &Label,
    state: StateId,
    request: PermMask,
) -> (PermissionSet, StateId) {
    if state == DFA_NOMATCH {
        return (PermissionSet::NONE, DFA_NOMATCH);
    }

    let compound = compound_match(policy, state, subject, peer);
    if compound != DFA_NOMATCH {
        let perms = policy.lookup(compound);
        if perms.allow & request == request {
            return (perms, compound);
        }
    }

    let mut perms = PermissionSet::ALL;
    let mut last = state;
    for component in peer.profiles() {
        last = match_component(policy, state, subject, component);
        if last == DFA_NOMATCH {
            return (PermissionSet::NONE, DFA_NOMATCH);
        }
        perms.accumulate(&policy.lookup(last));
    }
    (perms, last)
}

/// Permissions of [`match_label`] without the state
pub fn label_match(
    policy: &Policy,
    subject: &Profile,
    peer: &Label,
    state: StateId,
    request: PermMask,
) -> PermissionSet {
    match_label(policy, subject, peer, state, request).0
}

/// Check a resolution and record exactly one audit decision for it.
///
/// Denials whose bits intersect the kill mask are fatal in every mode.
/// Denials fully covered by the complain mask succeed as
/// [`Decision::Complain`]. Quiet bits hide a denial from the audit trail
/// without changing the verdict.
pub fn check_perms(
    auditor: &Auditor,
    profile: &Profile,
    res: &Resolution,
    request: PermMask,
    ad: &AuditData<'_>,
) -> Verdict {
    let denied = res.denied;
    if auditor.config().debug_decisions {
        trace!(
            profile = profile.name(),
            op = ad.op.as_str(),
            state = res.state,
            request,
            denied,
            info = ad.info.unwrap_or(""),
            "resolved"
        );
    }

    if denied == 0 {
        let audited = request & res.perms.audit;
        if audited == 0 {
            auditor.note_suppressed();
            return Ok(Decision::Allow);
        }
        auditor.audit(AuditType::Audit, profile, ad, audited, 0, 0)?;
        return Ok(Decision::Allow);
    }

    let (audit_type, error) = if denied & res.perms.kill != 0 {
        (AuditType::Kill, MediationError::Killed { denied })
    } else {
        let audit_type = if res.complains() {
            AuditType::Allowed
        } else {
            AuditType::Denied
        };
        let error = match ad.info {
            Some(info) if !res.matched() => MediationError::PolicyMismatch { info, denied },
            info => MediationError::PermissionDenied { denied, info },
        };
        (audit_type, error)
    };

    let reported = denied & !res.perms.quiet;
    if reported == 0 {
        auditor.note_suppressed();
    } else {
        auditor.audit(audit_type, profile, ad, request, reported, error.errno())?;
    }

    if audit_type == AuditType::Allowed {
        return Ok(Decision::Complain { denied });
    }
    Err(error)
}

/// Resolve `state` and check it
pub fn do_perms(
    auditor: &Auditor,
    profile: &Profile,
    policy: &Policy,
    state: StateId,
    request: PermMask,
    ad: &AuditData<'_>,
) -> Verdict {
    let res = resolve(profile, policy, state, request);
    check_perms(auditor, profile, &res, request, ad)
}
