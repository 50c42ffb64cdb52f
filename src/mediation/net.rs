/*!
 * Generic Network Mediation
 * Family and type rules for sockets without fine-grained family rules,
 * plus the per-family dispatch used by create and file checks
 */

use super::mediator::Mediator;
use crate::audit::{AuditAddr, AuditData, AuditPayload, NetAudit, Operation};
use crate::core::limits::DFA_NOMATCH;
use crate::core::types::{Family, PermMask};
use crate::engine::{check_perms, for_each_confined, resolve, resolve_set, Decision, Verdict};
use crate::label::{Profile, Subject};
use crate::net::{family, SockAddr, SockSnapshot, Socket};
use crate::policy::{mask, MediationClass, Walk};
use std::sync::Arc;
use tracing::trace;

pub(crate) fn audit_addr(addr: &SockAddr) -> AuditAddr {
    match addr {
        SockAddr::Unix(unix) => AuditAddr::Unix(unix.clone()),
        SockAddr::Inet(inet) => AuditAddr::Inet(*inet),
    }
}

/// Audit payload describing a socket, its local address and an optional peer address
pub(crate) fn sock_payload(sock: &SockSnapshot, peer_addr: Option<AuditAddr>) -> AuditPayload {
    AuditPayload::Net(NetAudit {
        family: sock.family,
        sock_type: sock.sock_type,
        protocol: sock.protocol,
        addr: sock.local.as_ref().map(audit_addr),
        peer_addr,
    })
}

pub(crate) fn create_payload(family: Family, sock_type: u16, protocol: u16) -> AuditPayload {
    AuditPayload::Net(NetAudit {
        family,
        sock_type,
        protocol,
        addr: None,
        peer_addr: None,
    })
}

impl Mediator {
    /// Family/type rule check for one profile.
    ///
    /// Matches `be16(family) be16(type)` from the NET class start. Policies
    /// without NET rules fall back to their compatibility table; with neither
    /// the profile does not mediate networking.
    pub(crate) fn profile_af_perm(
        &self,
        profile: &Profile,
        ad: &AuditData<'_>,
        request: PermMask,
        family: Family,
        sock_type: u16,
    ) -> Verdict {
        let policy = profile.policy();
        let start = policy.class_start(MediationClass::Net);
        let (res, info) = if start != DFA_NOMATCH {
            let walk = Walk::new(policy.dfa(), start)
                .be16(family, "failed family match")
                .be16(sock_type, "failed type match");
            (resolve(profile, &policy, walk.state(), request), walk.info())
        } else if let Some(compat) = policy.net_compat() {
            (resolve_set(profile, compat.perms(family, sock_type), start, request), None)
        } else {
            return Ok(Decision::Allow);
        };
        let ad = ad.with_info(info.or(ad.info));
        check_perms(&self.auditor, profile, &res, request, &ad)
    }

    /// Generic family check for a socket that may not exist yet
    pub fn af_perm(
        &self,
        subject: &Subject,
        op: Operation,
        request: PermMask,
        family: Family,
        sock_type: u16,
        protocol: u16,
    ) -> Verdict {
        let payload = create_payload(family, sock_type, protocol);
        let ad = AuditData::new(MediationClass::Net, op).with_payload(&payload);
        for_each_confined(subject.label(), |profile| {
            self.profile_af_perm(profile, &ad, request, family, sock_type)
        })
    }

    /// Generic family check against an existing socket.
    ///
    /// Kernel sockets and labels without NET rules are not mediated.
    pub(crate) fn label_sk_perm(
        &self,
        subject: &Subject,
        op: Operation,
        request: PermMask,
        sock: &SockSnapshot,
    ) -> Verdict {
        let label = subject.label();
        if sock.kernel || !label.mediates(MediationClass::Net) {
            trace!(op = op.as_str(), kernel = sock.kernel, "socket not mediated");
            return Ok(Decision::Allow);
        }
        let payload = sock_payload(sock, None);
        let ad = AuditData::new(MediationClass::Net, op).with_payload(&payload);
        for_each_confined(label, |profile| {
            self.profile_af_perm(profile, &ad, request, sock.family, sock.sock_type)
        })
    }

    /// Generic check of `request` on `sock`
    pub fn sk_perm(&self, subject: &Subject, op: Operation, request: PermMask, sock: &Socket) -> Verdict {
        let snap = sock.snapshot();
        self.traced(op, MediationClass::Net, subject.label(), || {
            self.label_sk_perm(subject, op, request, &snap)
        })
    }

    /// Socket creation, dispatched on family.
    ///
    /// Kernel-internal creations and unconfined subjects are not mediated.
    pub fn socket_create(
        &self,
        subject: &Subject,
        family: Family,
        sock_type: u16,
        protocol: u16,
        kern: bool,
    ) -> Verdict {
        if kern || subject.label().is_unconfined() {
            return Ok(Decision::Allow);
        }
        match family {
            family::AF_UNIX => self.unix_create(subject, sock_type, protocol),
            family::AF_INET | family::AF_INET6 => {
                self.inet_create(subject, family, sock_type, protocol)
            }
            _ => self.traced(Operation::Create, MediationClass::Net, subject.label(), || {
                self.af_perm(subject, Operation::Create, mask::CREATE, family, sock_type, protocol)
            }),
        }
    }

    /// Access through a file descriptor that refers to a socket
    pub fn sock_file_perm(
        &self,
        subject: &Subject,
        op: Operation,
        request: PermMask,
        sock: &Arc<Socket>,
    ) -> Verdict {
        match sock.family() {
            family::AF_UNIX => self.unix_file_perm(subject, op, request, sock),
            family::AF_INET | family::AF_INET6 => self.inet_file_perm(subject, op, request, sock),
            _ => self.sk_perm(subject, op, request, sock),
        }
    }
}
