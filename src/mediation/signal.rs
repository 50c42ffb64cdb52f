/*!
 * Signal Mediation
 * Sender and target labels cross-checked over the mapped signal number
 */

use super::mediator::Mediator;
use crate::audit::{AuditData, AuditPayload, Operation, SignalAudit};
use crate::core::limits::{DFA_NOMATCH, SIGRTMAX, SIGRTMIN, SIGRT_BASE, SIGUNKNOWN, SIG_MAP};
use crate::core::types::PermMask;
use crate::engine::{check_perms, match_label, resolve_set, xcheck_labels, Decision, Verdict};
use crate::label::{Label, Profile, Subject};
use crate::policy::{mask, MediationClass, Walk};
use tracing::trace;

/// Map a signal number onto the policy's signal encoding.
///
/// Classic signals go through [`SIG_MAP`], real-time signals move to a
/// compact range starting at 128. Anything else is unknown.
pub fn map_signal_num(sig: i32) -> u32 {
    if sig > SIGRTMAX {
        SIGUNKNOWN
    } else if sig >= SIGRTMIN {
        (sig - SIGRTMIN) as u32 + SIGRT_BASE
    } else if sig >= 0 {
        SIG_MAP.get(sig as usize).copied().unwrap_or(SIGUNKNOWN)
    } else {
        SIGUNKNOWN
    }
}

impl Mediator {
    fn profile_signal_perm(
        &self,
        profile: &Profile,
        peer: &Label,
        request: PermMask,
        ad: &AuditData<'_>,
        mapped: u32,
    ) -> Verdict {
        if !profile.mediates(MediationClass::Signal) {
            return Ok(Decision::Allow);
        }
        let policy = profile.policy();
        // mapped numbers top out at 160
        let walk = Walk::new(policy.dfa(), policy.class_start(MediationClass::Signal))
            .byte(mapped as u8, "failed signal match");
        let (perms, state) = match_label(&policy, profile, peer, walk.state(), request);
        let info = match walk.info() {
            None if state == DFA_NOMATCH => Some("failed peer label match"),
            info => info,
        };
        let res = resolve_set(profile, perms, state, request);
        let ad = ad.with_peer(peer).with_info(info);
        check_perms(&self.auditor, profile, &res, request, &ad)
    }

    /// Whether `sender` may deliver `sig` to `target`.
    ///
    /// The sender needs send towards the target and the target needs
    /// receive from the sender; the sender's side is checked first.
    pub fn may_signal(&self, sender: &Subject, target: &Subject, sig: i32) -> Verdict {
        let mapped = map_signal_num(sig);
        trace!(sig, mapped, "mapped signal");
        let payload = AuditPayload::Signal(SignalAudit {
            signal: mapped,
            unmapped: sig,
        });
        let ad = AuditData::new(MediationClass::Signal, Operation::Signal).with_payload(&payload);

        self.traced(Operation::Signal, MediationClass::Signal, sender.label(), || {
            xcheck_labels(
                sender.label(),
                target.label(),
                |profile, peer| self.profile_signal_perm(profile, peer, mask::WRITE, &ad, mapped),
                |profile, peer| self.profile_signal_perm(profile, peer, mask::READ, &ad, mapped),
            )
        })
    }
}
