/*!
 * Inet Mediation
 *
 * Fine-grained AF_INET and AF_INET6 rules. Descriptors are built from the
 * socket type and protocol, then encoded addresses, with command selectors
 * for listen, options and address pairing. Policies may stop a walk early
 * at any state that already satisfies the request.
 */

use super::mediator::Mediator;
use super::net::sock_payload;
use crate::audit::{AuditAddr, AuditData, AuditPayload, NetAudit, Operation};
use crate::core::limits::{CMD_ADDR, CMD_LISTEN, CMD_OPT, DFA_NOMATCH};
use crate::core::types::{Family, PermMask, StateId};
use crate::engine::{do_perms, early_match, for_each_confined, last_error, Decision, Verdict};
use crate::label::{Profile, Subject};
use crate::net::{family, is_privileged_port, RawSockAddr, SockSnapshot, Socket};
use crate::policy::{mask, MediationClass, Policy, Walk};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tracing::trace;

/// Address type selectors
pub mod addr_type {
    pub const LOCAL: u8 = 0;
    /// Local address with a port below 1024
    pub const LOCAL_PRIV: u8 = 1;
    pub const REMOTE: u8 = 2;
}

/// Length class of an encoded address
mod addr_len {
    pub const NONE: u8 = 0;
    pub const V4: u8 = 1;
    pub const V6: u8 = 2;
}

/// An address as encoded into a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MatchAddr {
    addr_type: u8,
    port: u16,
    ip: Option<IpAddr>,
}

impl MatchAddr {
    /// The socket's local address, or the unspecified address of its family
    /// with port 0 while unbound
    fn local(sock: &SockSnapshot) -> Self {
        let (port, ip) = match sock.inet_local() {
            Some(addr) => (addr.port(), addr.ip()),
            None if sock.family == family::AF_INET6 => (0, IpAddr::V6(Ipv6Addr::UNSPECIFIED)),
            None => (0, IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        };
        Self {
            addr_type: addr_type::LOCAL,
            port,
            ip: Some(ip),
        }
    }

    fn bind(addr: SocketAddr) -> Self {
        let addr_type = if is_privileged_port(addr.port()) {
            addr_type::LOCAL_PRIV
        } else {
            addr_type::LOCAL
        };
        Self {
            addr_type,
            port: addr.port(),
            ip: Some(addr.ip()),
        }
    }

    /// An absent remote encodes with no address bytes
    fn remote(addr: Option<SocketAddr>) -> Self {
        Self {
            addr_type: addr_type::REMOTE,
            port: addr.map_or(0, |a| a.port()),
            ip: addr.map(|a| a.ip()),
        }
    }

    fn is_remote(&self) -> bool {
        self.addr_type == addr_type::REMOTE
    }
}

/// Descriptor walk with early termination
struct InetMatch<'a> {
    policy: &'a Policy,
    walk: Walk<'a>,
    request: PermMask,
    early: bool,
}

impl<'a> InetMatch<'a> {
    fn new(policy: &'a Policy, start: StateId, request: PermMask) -> Self {
        Self {
            policy,
            walk: Walk::new(policy.dfa(), start),
            request,
            early: false,
        }
    }

    #[inline]
    fn proceeding(&self) -> bool {
        !self.early && self.walk.matched()
    }

    fn check_early(&mut self) {
        if self.walk.matched() && early_match(self.policy, self.walk.state(), self.request) {
            trace!(state = self.walk.state(), "inet early match");
            self.early = true;
        }
    }

    fn step(&mut self, f: impl FnOnce(Walk<'a>) -> Walk<'a>) {
        let walk = std::mem::replace(&mut self.walk, Walk::new(self.policy.dfa(), DFA_NOMATCH));
        self.walk = f(walk);
    }

    fn prot(&mut self, sock_type: u16, protocol: u16) {
        self.step(|w| w.be16(sock_type, "failed type match"));
        self.check_early();
        if self.proceeding() {
            self.step(|w| w.be16(protocol, "failed protocol match"));
        }
    }

    fn addr(&mut self, addr: &MatchAddr) {
        let (on_addr, on_label) = if addr.is_remote() {
            ("failed remote addr match", "failed remote label match")
        } else {
            ("failed local addr match", "failed local label match")
        };
        let (len_class, octets): (u8, Vec<u8>) = match addr.ip {
            None => (addr_len::NONE, Vec::new()),
            Some(IpAddr::V4(ip)) => (addr_len::V4, ip.octets().to_vec()),
            Some(IpAddr::V6(ip)) => (addr_len::V6, ip.octets().to_vec()),
        };
        self.step(|w| {
            w.byte(addr.addr_type, on_addr)
                .be16(addr.port, on_addr)
                .byte(len_class, on_addr)
                .bytes(&octets, on_addr)
                .null(on_addr)
        });
        self.check_early();
        if self.proceeding() {
            self.step(|w| w.null(on_label));
        }
    }

    fn sk(&mut self, sock_type: u16, protocol: u16, addr: &MatchAddr) {
        self.prot(sock_type, protocol);
        if self.proceeding() {
            self.addr(addr);
        }
    }

    fn cmd(&mut self, sock_type: u16, protocol: u16, addr: &MatchAddr, cmd: u8) {
        self.sk(sock_type, protocol, addr);
        if self.proceeding() {
            self.step(|w| w.byte(cmd, "failed cmd selection match"));
        }
    }

    /// Remote address, pairing selector, then the local address
    fn remote(&mut self, sock_type: u16, protocol: u16, raddr: &MatchAddr, laddr: &MatchAddr) {
        self.cmd(sock_type, protocol, raddr, CMD_ADDR);
        if self.proceeding() {
            self.addr(laddr);
        }
    }

    fn be16(&mut self, value: u16, on_fail: &'static str) {
        if self.proceeding() {
            self.step(|w| w.be16(value, on_fail));
        }
    }
}

fn inet_payload(sock: &SockSnapshot, local: Option<SocketAddr>, remote: Option<SocketAddr>) -> AuditPayload {
    AuditPayload::Net(NetAudit {
        family: sock.family,
        sock_type: sock.sock_type,
        protocol: sock.protocol,
        addr: local.map(AuditAddr::Inet),
        peer_addr: remote.map(AuditAddr::Inet),
    })
}

impl Mediator {
    fn inet_profile_perm<F>(
        &self,
        profile: &Profile,
        ad: &AuditData<'_>,
        request: PermMask,
        family: Family,
        sock_type: u16,
        describe: F,
    ) -> Verdict
    where
        F: FnOnce(&mut InetMatch<'_>),
    {
        let policy = profile.policy();
        let start = policy.af_start(family);
        if start == DFA_NOMATCH {
            return self.profile_af_perm(profile, ad, request, family, sock_type);
        }
        let mut m = InetMatch::new(&policy, start, request);
        describe(&mut m);
        let ad = ad.with_info(m.walk.info());
        do_perms(&self.auditor, profile, &policy, m.walk.state(), request, &ad)
    }

    /// Check every confined profile of the subject against an existing
    /// socket. Kernel sockets and labels without NET rules are skipped.
    fn inet_label_sk_perm<F>(
        &self,
        subject: &Subject,
        op: Operation,
        request: PermMask,
        sock: &SockSnapshot,
        payload: &AuditPayload,
        describe: F,
    ) -> Verdict
    where
        F: Fn(&mut InetMatch<'_>),
    {
        let label = subject.label();
        if sock.kernel || !label.mediates(MediationClass::Net) {
            return Ok(Decision::Allow);
        }
        let ad = AuditData::new(MediationClass::Net, op).with_payload(payload);
        for_each_confined(label, |profile| {
            self.inet_profile_perm(profile, &ad, request, sock.family, sock.sock_type, &describe)
        })
    }

    /// Inet socket creation: type, then protocol unless the type already
    /// decides
    pub fn inet_create(&self, subject: &Subject, family: Family, sock_type: u16, protocol: u16) -> Verdict {
        let label = subject.label();
        if label.is_unconfined() {
            return Ok(Decision::Allow);
        }
        self.traced(Operation::Create, MediationClass::Net, label, || {
            let payload = super::net::create_payload(family, sock_type, protocol);
            let ad = AuditData::new(MediationClass::Net, Operation::Create).with_payload(&payload);
            for_each_confined(label, |profile| {
                self.inet_profile_perm(profile, &ad, mask::CREATE, family, sock_type, |m| {
                    m.prot(sock_type, protocol)
                })
            })
        })
    }

    /// Binding to the raw address `addr`
    pub fn inet_bind(&self, subject: &Subject, sock: &Socket, addr: &RawSockAddr) -> Verdict {
        let snap = sock.snapshot();
        let bind = addr.to_bind_inet(snap.family)?;
        let maddr = MatchAddr::bind(bind);
        self.traced(Operation::Bind, MediationClass::Net, subject.label(), || {
            let payload = inet_payload(&snap, Some(bind), None);
            self.inet_label_sk_perm(subject, Operation::Bind, mask::BIND, &snap, &payload, |m| {
                m.sk(snap.sock_type, snap.protocol, &maddr)
            })
        })
    }

    /// Connecting to the raw address `addr`. AF_UNSPEC is a disconnect.
    pub fn inet_connect(&self, subject: &Subject, sock: &Socket, addr: &RawSockAddr) -> Verdict {
        if addr.family() == Some(family::AF_UNSPEC) {
            return Ok(Decision::Allow);
        }
        let remote = addr.to_inet()?;
        let snap = sock.snapshot();
        self.traced(Operation::Connect, MediationClass::Net, subject.label(), || {
            self.inet_remote_perm(subject, Operation::Connect, mask::CONNECT, &snap, Some(remote))
        })
    }

    /// Send or receive, towards `addr` when given, else the connected peer
    pub fn inet_msg(
        &self,
        subject: &Subject,
        op: Operation,
        request: PermMask,
        sock: &Socket,
        addr: Option<&RawSockAddr>,
    ) -> Verdict {
        let snap = sock.snapshot();
        let remote = match addr {
            Some(addr) => Some(addr.to_inet()?),
            None => snap.inet_remote(),
        };
        self.traced(op, MediationClass::Net, subject.label(), || {
            self.inet_remote_perm(subject, op, request, &snap, remote)
        })
    }

    fn inet_remote_perm(
        &self,
        subject: &Subject,
        op: Operation,
        request: PermMask,
        sock: &SockSnapshot,
        remote: Option<SocketAddr>,
    ) -> Verdict {
        let laddr = MatchAddr::local(sock);
        let raddr = MatchAddr::remote(remote);
        let payload = inet_payload(sock, sock.inet_local(), remote);
        self.inet_label_sk_perm(subject, op, request, sock, &payload, |m| {
            m.remote(sock.sock_type, sock.protocol, &raddr, &laddr)
        })
    }

    pub fn inet_listen(&self, subject: &Subject, sock: &Socket, backlog: u16) -> Verdict {
        let snap = sock.snapshot();
        let laddr = MatchAddr::local(&snap);
        self.traced(Operation::Listen, MediationClass::Net, subject.label(), || {
            let payload = sock_payload(&snap, None);
            self.inet_label_sk_perm(subject, Operation::Listen, mask::LISTEN, &snap, &payload, |m| {
                m.cmd(snap.sock_type, snap.protocol, &laddr, CMD_LISTEN);
                m.be16(backlog, "failed listen backlog match");
            })
        })
    }

    pub fn inet_accept(&self, subject: &Subject, sock: &Socket) -> Verdict {
        self.inet_sock_perm(subject, Operation::Accept, mask::ACCEPT, sock)
    }

    /// Socket option get or set; level and option name are both matched
    pub fn inet_opt(
        &self,
        subject: &Subject,
        op: Operation,
        request: PermMask,
        sock: &Socket,
        level: u16,
        optname: u16,
    ) -> Verdict {
        let snap = sock.snapshot();
        let laddr = MatchAddr::local(&snap);
        self.traced(op, MediationClass::Net, subject.label(), || {
            let payload = sock_payload(&snap, None);
            self.inet_label_sk_perm(subject, op, request, &snap, &payload, |m| {
                m.cmd(snap.sock_type, snap.protocol, &laddr, CMD_OPT);
                m.be16(level, "failed sockopt match");
                m.be16(optname, "failed sockopt match");
            })
        })
    }

    /// Local descriptor check: revalidation, accept, attributes, shutdown
    pub fn inet_sock_perm(&self, subject: &Subject, op: Operation, request: PermMask, sock: &Socket) -> Verdict {
        let snap = sock.snapshot();
        self.traced(op, MediationClass::Net, subject.label(), || {
            self.inet_local_perm(subject, op, request, &snap)
        })
    }

    fn inet_local_perm(&self, subject: &Subject, op: Operation, request: PermMask, sock: &SockSnapshot) -> Verdict {
        let laddr = MatchAddr::local(sock);
        let payload = sock_payload(sock, None);
        self.inet_label_sk_perm(subject, op, request, sock, &payload, |m| {
            m.sk(sock.sock_type, sock.protocol, &laddr)
        })
    }

    /// Access through a file descriptor: the local part of the request
    /// first, then the whole request towards the remote address if any
    pub fn inet_file_perm(&self, subject: &Subject, op: Operation, request: PermMask, sock: &Arc<Socket>) -> Verdict {
        let snap = sock.snapshot();
        self.traced(op, MediationClass::Net, subject.label(), || {
            let sk_req = request & !mask::NET_PEER_MASK;
            let local = if sk_req != 0 {
                self.inet_local_perm(subject, op, sk_req, &snap)?
            } else {
                Decision::Allow
            };
            match snap.inet_remote() {
                Some(remote) => last_error(
                    Ok(local),
                    self.inet_remote_perm(subject, op, request, &snap, Some(remote)),
                ),
                None => Ok(local),
            }
        })
    }
}
