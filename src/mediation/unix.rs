/*!
 * Unix Socket Mediation
 *
 * Fine-grained AF_UNIX rules. Every check walks a descriptor built from the
 * socket's type, protocol and local address; commands, peer addresses and
 * peer labels extend it. Filesystem-bound sockets are handed to the path
 * mediator instead.
 */

use super::mediator::Mediator;
use super::net::{audit_addr, create_payload, sock_payload};
use super::traits::{PathCond, PathRequest};
use crate::audit::{AuditAddr, AuditData, AuditPayload, FileAudit, NetAudit, Operation};
use crate::core::limits::{ANONYMOUS_ADDR_TOKEN, CMD_ADDR, CMD_LISTEN, CMD_OPT, DFA_NOMATCH};
use crate::core::types::PermMask;
use crate::engine::{
    check_perms, do_perms, for_each_confined, for_each_pair, last_error, match_component,
    resolve_set, xcheck, Decision, Verdict,
};
use crate::label::{path_flags, Label, Profile, Subject};
use crate::net::{family, lock_pair, SockSnapshot, Socket, UnixAddr};
use crate::policy::{mask, MediationClass, PermissionSet, Walk};
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;
use tracing::trace;

const ANONYMOUS: &[u8] = &[ANONYMOUS_ADDR_TOKEN];

/// Address bytes fed to the automaton; unnamed sockets use a reserved token
fn addr_bytes(addr: Option<&UnixAddr>) -> Cow<'_, [u8]> {
    match addr {
        Some(addr) => addr.match_bytes(),
        None => Cow::Borrowed(ANONYMOUS),
    }
}

fn match_to_prot(walk: Walk<'_>, sock_type: u16, protocol: u16) -> Walk<'_> {
    walk.be16(sock_type, "failed type and protocol match")
        .be16(protocol, "failed type and protocol match")
}

fn match_to_local<'a>(
    walk: Walk<'a>,
    sock_type: u16,
    protocol: u16,
    addr: Option<&UnixAddr>,
) -> Walk<'a> {
    match_to_prot(walk, sock_type, protocol)
        .bytes(&addr_bytes(addr), "failed local address match")
        .null("failed local address match")
        .null("failed local label match")
}

fn match_to_sk<'a>(walk: Walk<'a>, sock: &SockSnapshot) -> Walk<'a> {
    match_to_local(walk, sock.sock_type, sock.protocol, sock.unix_addr())
}

fn match_to_cmd<'a>(walk: Walk<'a>, sock: &SockSnapshot, cmd: u8) -> Walk<'a> {
    match_to_sk(walk, sock).byte(cmd, "failed cmd selection match")
}

fn match_to_peer<'a>(walk: Walk<'a>, sock: &SockSnapshot, peer_addr: Option<&UnixAddr>) -> Walk<'a> {
    match_to_cmd(walk, sock, CMD_ADDR)
        .bytes(&addr_bytes(peer_addr), "failed peer address match")
        .null("failed peer address match")
}

impl Mediator {
    /// One profile's fine-grained unix check; profiles without unix rules
    /// fall back to the generic family rule
    fn unix_profile_perm<F>(
        &self,
        profile: &Profile,
        ad: &AuditData<'_>,
        request: PermMask,
        sock: &SockSnapshot,
        describe: F,
    ) -> Verdict
    where
        F: FnOnce(Walk<'_>) -> Walk<'_>,
    {
        let policy = profile.policy();
        let start = policy.af_start(family::AF_UNIX);
        if start == DFA_NOMATCH {
            return self.profile_af_perm(profile, ad, request, sock.family, sock.sock_type);
        }
        let walk = describe(Walk::new(policy.dfa(), start));
        let ad = ad.with_info(walk.info());
        do_perms(&self.auditor, profile, &policy, walk.state(), request, &ad)
    }

    /// Peer check for one profile against one profile of the peer label:
    /// the peer address, then the peer profile's name
    fn unix_profile_peer_perm(
        &self,
        profile: &Profile,
        ad: &AuditData<'_>,
        request: PermMask,
        sock: &SockSnapshot,
        peer: &SockSnapshot,
        peer_profile: &Arc<Profile>,
    ) -> Verdict {
        let policy = profile.policy();
        let start = policy.af_start(family::AF_UNIX);
        if start == DFA_NOMATCH {
            return self.profile_af_perm(profile, ad, request, sock.family, sock.sock_type);
        }
        let walk = match_to_peer(Walk::new(policy.dfa(), start), sock, peer.unix_addr());
        let peer_only = Label::single(Arc::clone(peer_profile));
        let mut ad = ad.with_info(walk.info()).with_peer(&peer_only);
        let mut state = walk.state();
        if state != DFA_NOMATCH {
            state = match_component(&policy, state, profile, peer_profile);
            if state == DFA_NOMATCH {
                ad.info = Some("failed peer label match");
            }
        }
        do_perms(&self.auditor, profile, &policy, state, request, &ad)
    }

    /// Filesystem-bound sockets are checked by path.
    ///
    /// A socket whose live path was cleared during shutdown is checked by
    /// the path recorded at bind time. Without that, each profile either
    /// mediates the stale name (when deleted entries are mediated) or
    /// refuses the lookup.
    pub(crate) fn unix_fs_perm(
        &self,
        subject: &Subject,
        op: Operation,
        request: PermMask,
        sock: &SockSnapshot,
        flags: u32,
    ) -> Verdict {
        let label = subject.label();
        if label.is_unconfined() || !label.mediates(MediationClass::File) {
            return Ok(Decision::Allow);
        }
        let request = request & mask::NET_FS_PERMS;
        let Some(fs) = sock.fs.as_ref() else {
            return Ok(Decision::Allow);
        };
        let cond = PathCond {
            uid: fs.uid,
            mode: fs.mode,
        };

        if let Some(path) = fs.path.as_ref().or(sock.bound_path.as_ref()) {
            let req = PathRequest {
                op,
                request,
                path: path.clone(),
                cond,
                flags,
            };
            return self.paths.path_perm(subject, &req);
        }

        let Some(UnixAddr::Path(sun_path)) = sock.unix_addr() else {
            return Ok(Decision::Allow);
        };
        for_each_confined(label, |profile| {
            if (flags | profile.path_flags()) & path_flags::MEDIATE_DELETED != 0 {
                let single = Subject {
                    label: Arc::new(Label::single(Arc::clone(profile))),
                    cred: subject.cred,
                };
                let req = PathRequest {
                    op,
                    request,
                    path: sun_path.clone(),
                    cond,
                    flags,
                };
                self.paths.path_perm(&single, &req)
            } else {
                self.deleted_entry(subject, profile, op, request, sun_path, cond.uid)
            }
        })
    }

    fn deleted_entry(
        &self,
        subject: &Subject,
        profile: &Profile,
        op: Operation,
        request: PermMask,
        name: &Path,
        ouid: u32,
    ) -> Verdict {
        let payload = AuditPayload::File(FileAudit {
            fsuid: subject.cred.fsuid,
            ouid,
        });
        let name = name.to_string_lossy();
        let ad = AuditData::new(MediationClass::File, op)
            .with_name(&name)
            .with_payload(&payload)
            .with_info(Some("Failed name lookup - deleted entry"));
        let res = resolve_set(profile, PermissionSet::NONE, DFA_NOMATCH, request);
        check_perms(&self.auditor, profile, &res, request, &ad)
    }

    /// Local check of an abstract or unnamed socket
    fn unix_label_sk_perm(
        &self,
        subject: &Subject,
        op: Operation,
        request: PermMask,
        sock: &SockSnapshot,
    ) -> Verdict {
        let label = subject.label();
        if label.is_unconfined() {
            return Ok(Decision::Allow);
        }
        let payload = sock_payload(sock, None);
        let ad = AuditData::new(MediationClass::Net, op).with_payload(&payload);
        for_each_confined(label, |profile| {
            self.unix_profile_perm(profile, &ad, request, sock, |w| match_to_sk(w, sock))
        })
    }

    fn unix_label_sock_perm(
        &self,
        subject: &Subject,
        op: Operation,
        request: PermMask,
        sock: &SockSnapshot,
    ) -> Verdict {
        if subject.label().is_unconfined() {
            return Ok(Decision::Allow);
        }
        if sock.is_unix_fs() {
            return self.unix_fs_perm(subject, op, request, sock, 0);
        }
        self.unix_label_sk_perm(subject, op, request, sock)
    }

    /// Unix socket creation
    pub fn unix_create(&self, subject: &Subject, sock_type: u16, protocol: u16) -> Verdict {
        let label = subject.label();
        if label.is_unconfined() {
            return Ok(Decision::Allow);
        }
        self.traced(Operation::Create, MediationClass::Net, label, || {
            let payload = create_payload(family::AF_UNIX, sock_type, protocol);
            let ad = AuditData::new(MediationClass::Net, Operation::Create).with_payload(&payload);
            for_each_confined(label, |profile| {
                let policy = profile.policy();
                let start = policy.af_start(family::AF_UNIX);
                if start == DFA_NOMATCH {
                    return self.profile_af_perm(
                        profile,
                        &ad,
                        mask::CREATE,
                        family::AF_UNIX,
                        sock_type,
                    );
                }
                let walk = match_to_prot(Walk::new(policy.dfa(), start), sock_type, protocol);
                let ad = ad.with_info(walk.info());
                do_perms(&self.auditor, profile, &policy, walk.state(), mask::CREATE, &ad)
            })
        })
    }

    /// Revalidation, get/set attributes, getsockname, getpeername and shutdown
    pub fn unix_sock_perm(&self, subject: &Subject, op: Operation, request: PermMask, sock: &Socket) -> Verdict {
        let snap = sock.snapshot();
        self.traced(op, MediationClass::Net, subject.label(), || {
            self.unix_label_sock_perm(subject, op, request, &snap)
        })
    }

    /// Binding to `addr`.
    ///
    /// Filesystem paths are creations and go to the path mediator; abstract
    /// names are matched as the socket's local address.
    pub fn unix_bind(&self, subject: &Subject, sock: &Socket, addr: &UnixAddr) -> Verdict {
        let label = subject.label();
        if label.is_unconfined() {
            return Ok(Decision::Allow);
        }
        if let UnixAddr::Path(path) = addr {
            let req = PathRequest {
                op: Operation::Bind,
                request: mask::CREATE,
                path: path.clone(),
                cond: PathCond {
                    uid: subject.cred.fsuid,
                    mode: 0,
                },
                flags: 0,
            };
            return self.paths.path_perm(subject, &req);
        }

        let snap = sock.snapshot();
        self.traced(Operation::Bind, MediationClass::Net, label, || {
            let payload = AuditPayload::Net(NetAudit {
                family: snap.family,
                sock_type: snap.sock_type,
                protocol: snap.protocol,
                addr: Some(AuditAddr::Unix(addr.clone())),
                peer_addr: None,
            });
            let ad = AuditData::new(MediationClass::Net, Operation::Bind).with_payload(&payload);
            for_each_confined(label, |profile| {
                self.unix_profile_perm(profile, &ad, mask::BIND, &snap, |w| {
                    match_to_local(w, snap.sock_type, snap.protocol, Some(addr))
                })
            })
        })
    }

    /// Listening with `backlog`
    pub fn unix_listen(&self, subject: &Subject, sock: &Socket, backlog: u16) -> Verdict {
        let snap = sock.snapshot();
        let label = subject.label();
        if label.is_unconfined() || snap.is_unix_fs() {
            return Ok(Decision::Allow);
        }
        self.traced(Operation::Listen, MediationClass::Net, label, || {
            let payload = sock_payload(&snap, None);
            let ad = AuditData::new(MediationClass::Net, Operation::Listen).with_payload(&payload);
            for_each_confined(label, |profile| {
                self.unix_profile_perm(profile, &ad, mask::LISTEN, &snap, |w| {
                    match_to_cmd(w, &snap, CMD_LISTEN).be16(backlog, "failed listen backlog match")
                })
            })
        })
    }

    /// The listening socket's right to accept; the connecting peer is
    /// checked at connect time
    pub fn unix_accept(&self, subject: &Subject, sock: &Socket) -> Verdict {
        let snap = sock.snapshot();
        let label = subject.label();
        if label.is_unconfined() || snap.is_unix_fs() {
            return Ok(Decision::Allow);
        }
        self.traced(Operation::Accept, MediationClass::Net, label, || {
            let payload = sock_payload(&snap, None);
            let ad = AuditData::new(MediationClass::Net, Operation::Accept).with_payload(&payload);
            for_each_confined(label, |profile| {
                self.unix_profile_perm(profile, &ad, mask::ACCEPT, &snap, |w| match_to_sk(w, &snap))
            })
        })
    }

    /// Socket option get or set. Only the option name is matched.
    pub fn unix_opt(
        &self,
        subject: &Subject,
        op: Operation,
        request: PermMask,
        sock: &Socket,
        _level: u16,
        optname: u16,
    ) -> Verdict {
        let snap = sock.snapshot();
        let label = subject.label();
        if label.is_unconfined() || snap.is_unix_fs() {
            return Ok(Decision::Allow);
        }
        self.traced(op, MediationClass::Net, label, || {
            let payload = sock_payload(&snap, None);
            let ad = AuditData::new(MediationClass::Net, op).with_payload(&payload);
            for_each_confined(label, |profile| {
                self.unix_profile_perm(profile, &ad, request, &snap, |w| {
                    match_to_cmd(w, &snap, CMD_OPT).be16(optname, "failed sockopt match")
                })
            })
        })
    }

    /// One side of a peer interaction.
    ///
    /// `peer_label` defaults to the label recorded on the peer socket.
    pub(crate) fn unix_peer_perm(
        &self,
        subject: &Subject,
        op: Operation,
        request: PermMask,
        sock: &SockSnapshot,
        peer: &SockSnapshot,
        peer_label: Option<&Label>,
    ) -> Verdict {
        if peer.is_unix_fs() {
            return self.unix_fs_perm(subject, op, request, peer, 0);
        }
        if sock.is_unix_fs() {
            return self.unix_fs_perm(subject, op, request, sock, 0);
        }
        let label = subject.label();
        if label.is_unconfined() {
            return Ok(Decision::Allow);
        }
        let peer_label = peer_label.unwrap_or(&peer.label);
        let payload = sock_payload(sock, peer.local.as_ref().map(audit_addr));
        let ad = AuditData::new(MediationClass::Net, op).with_payload(&payload);
        for_each_pair(label, peer_label, |profile, peer_profile| {
            self.unix_profile_peer_perm(profile, &ad, request, sock, peer, peer_profile)
        })
    }

    /// Stream connect from `sock` to `listener`.
    ///
    /// The connecting side needs connect, send and receive towards the
    /// listener; the listener needs accept, send and receive towards the
    /// connecting label. On success `server_sock`, the socket that will
    /// serve this connection, takes the listener's label.
    pub fn unix_stream_connect(
        &self,
        subject: &Subject,
        sock: &Arc<Socket>,
        listener: &Arc<Socket>,
        server_sock: Option<&Socket>,
    ) -> Verdict {
        let (snap, peer_snap) = {
            let guard = lock_pair(sock, listener);
            (sock.snapshot_with(guard.local()), listener.snapshot_with(guard.peer()))
        };
        let peer_subject = Subject {
            label: Arc::clone(&peer_snap.label),
            cred: peer_snap.owner,
        };

        let verdict = self.traced(Operation::Connect, MediationClass::Net, subject.label(), || {
            xcheck(
                || {
                    self.unix_peer_perm(
                        subject,
                        Operation::Connect,
                        mask::CONNECT | mask::SEND | mask::RECEIVE,
                        &snap,
                        &peer_snap,
                        None,
                    )
                },
                || {
                    if peer_snap.is_unix_fs() {
                        return Ok(Decision::Allow);
                    }
                    self.unix_peer_perm(
                        &peer_subject,
                        Operation::Connect,
                        mask::ACCEPT | mask::SEND | mask::RECEIVE,
                        &peer_snap,
                        &snap,
                        Some(subject.label()),
                    )
                },
            )
        });

        if verdict.is_ok() {
            if let Some(server_sock) = server_sock {
                server_sock.set_label(Arc::clone(&peer_snap.label));
            }
        }
        verdict
    }

    /// Datagram send from `sock` to `peer`: send on this side, receive on
    /// the peer's. Both sockets are read under one ordered double lock.
    pub fn unix_may_send(&self, subject: &Subject, sock: &Socket, peer: &Socket) -> Verdict {
        let (snap, peer_snap) = {
            let guard = lock_pair(sock, peer);
            (sock.snapshot_with(guard.local()), peer.snapshot_with(guard.peer()))
        };
        let peer_subject = Subject {
            label: Arc::clone(&peer_snap.label),
            cred: peer_snap.owner,
        };
        self.traced(Operation::Sendmsg, MediationClass::Net, subject.label(), || {
            xcheck(
                || {
                    self.unix_peer_perm(
                        subject,
                        Operation::Sendmsg,
                        mask::SEND,
                        &snap,
                        &peer_snap,
                        None,
                    )
                },
                || {
                    self.unix_peer_perm(
                        &peer_subject,
                        Operation::Sendmsg,
                        mask::RECEIVE,
                        &peer_snap,
                        &snap,
                        Some(subject.label()),
                    )
                },
            )
        })
    }

    /// Access through a file descriptor referring to a unix socket.
    ///
    /// The non-peer part of the request is checked locally while the socket
    /// is unconnected. With a peer, both sockets are locked in id order and
    /// read/write is cross-checked between the two labels.
    pub fn unix_file_perm(
        &self,
        subject: &Subject,
        op: Operation,
        request: PermMask,
        sock: &Arc<Socket>,
    ) -> Verdict {
        let label = subject.label();
        let sk_req = request & !mask::NET_PEER_MASK;

        let (local, peer) = {
            let state = sock.lock();
            let snap = sock.snapshot_with(&state);
            let local = if !snap.connected && sk_req != 0 {
                self.unix_label_sock_perm(subject, op, sk_req, &snap)
            } else {
                Ok(Decision::Allow)
            };
            (local, state.peer())
        };
        let Some(peer) = peer else {
            return local;
        };

        let guard = lock_pair(sock, &peer);
        let snap = sock.snapshot_with(guard.local());
        let peer_snap = peer.snapshot_with(guard.peer());
        trace!(
            sock = snap.id.0,
            peer = peer_snap.id.0,
            self_pair = guard.is_self_pair(),
            "unix file perm with peer"
        );

        if snap.is_unix_fs() {
            return last_error(
                local,
                self.unix_fs_perm(subject, op, request, &snap, path_flags::SOCK_COND),
            );
        }
        if peer_snap.is_unix_fs() {
            return last_error(
                local,
                self.unix_fs_perm(subject, op, request, &peer_snap, path_flags::SOCK_COND),
            );
        }

        let sk_verdict = if sk_req != 0 {
            self.unix_label_sk_perm(subject, op, sk_req, &snap)
        } else {
            Ok(Decision::Allow)
        };
        let peer_subject = Subject {
            label: Arc::clone(&peer_snap.label),
            cred: peer_snap.owner,
        };
        let cross = xcheck(
            || {
                self.unix_peer_perm(
                    subject,
                    op,
                    mask::READ | mask::WRITE,
                    &snap,
                    &peer_snap,
                    None,
                )
            },
            || {
                self.unix_peer_perm(
                    &peer_subject,
                    op,
                    mask::READ | mask::WRITE,
                    &peer_snap,
                    &snap,
                    Some(label),
                )
            },
        );
        last_error(last_error(local, sk_verdict), cross)
    }
}
