/*!
 * Unix Socket Mediation Tests
 * Descriptor walks, peer cross-checks and filesystem delegation
 */

use super::common::{mediator, profile, subject_of, unix_local, unix_peer, ANONYMOUS};
use labelgate::audit::Operation;
use labelgate::core::limits::CMD_LISTEN;
use labelgate::mediation::PathRequest;
use labelgate::net::{family, sock_type};
use labelgate::policy::mask;
use labelgate::{Decision, Label, PermissionSet, PolicyBuilder, SockAddr, Socket, Subject, UnixAddr, Verdict};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::Arc;

#[test]
fn test_empty_abstract_name_is_not_anonymous() {
    let (_, mediator) = mediator();
    let mut b = PolicyBuilder::new();
    let empty = unix_local(&mut b, sock_type::SOCK_STREAM, b"\0");
    b.grant(empty, PermissionSet::allowing(mask::ACCEPT));
    let p = profile("p", b.build().unwrap());
    let subject = subject_of(&p);

    let named = Socket::unix(sock_type::SOCK_STREAM, subject.label.clone());
    named.bind(SockAddr::Unix(UnixAddr::abstract_name("")), None);
    assert!(mediator.unix_accept(&subject, &named).is_ok());

    let anonymous = Socket::unix(sock_type::SOCK_STREAM, subject.label.clone());
    assert!(mediator.unix_accept(&subject, &anonymous).is_err());
}

#[test]
fn test_anonymous_token_rule() {
    let (_, mediator) = mediator();
    let mut b = PolicyBuilder::new();
    let anon = unix_local(&mut b, sock_type::SOCK_SEQPACKET, ANONYMOUS);
    let listen = b.step(anon, CMD_LISTEN);
    let backlog = b.be16(listen, 16);
    b.grant(backlog, PermissionSet::allowing(mask::LISTEN));
    let subject = subject_of(&profile("p", b.build().unwrap()));

    let sock = Socket::unix(sock_type::SOCK_SEQPACKET, subject.label.clone());
    assert!(mediator.unix_listen(&subject, &sock, 16).is_ok());

    sock.bind(SockAddr::Unix(UnixAddr::abstract_name("named")), None);
    let err = mediator.unix_listen(&subject, &sock, 16).unwrap_err();
    assert_eq!(err.info(), Some("failed local address match"));
}

#[test]
fn test_datagram_send_receiver_denies() {
    let (sink, mediator) = mediator();

    let mut sb = PolicyBuilder::new();
    let s = unix_peer(&mut sb, sock_type::SOCK_DGRAM, ANONYMOUS, b"\0log");
    let peer = sb.literal(s, b"logger");
    sb.grant(peer, PermissionSet::allowing(mask::SEND));
    let sender = profile("app", sb.build().unwrap());

    let mut rb = PolicyBuilder::new();
    let s = unix_peer(&mut rb, sock_type::SOCK_DGRAM, b"\0log", ANONYMOUS);
    let peer = rb.literal(s, b"trusted");
    rb.grant(peer, PermissionSet::allowing(mask::RECEIVE));
    let receiver = profile("logger", rb.build().unwrap());

    let subject = subject_of(&sender);
    let sock = Socket::unix(sock_type::SOCK_DGRAM, subject.label.clone());
    let log = Socket::unix(sock_type::SOCK_DGRAM, Arc::new(Label::single(receiver)));
    log.bind(SockAddr::Unix(UnixAddr::abstract_name("log")), None);

    let err = mediator.unix_may_send(&subject, &sock, &log).unwrap_err();
    assert_eq!(err.info(), Some("failed peer label match"));
    assert_eq!(err.denied(), mask::RECEIVE);

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].record.profile.as_str(), "logger");
    assert_eq!(events[0].record.peer.as_deref(), Some("app"));
    assert!(events[0].message.contains("peer_addr=none"));
}

#[test]
fn test_fs_peer_delegates_to_paths() {
    let seen: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    let paths = move |_: &Subject, req: &PathRequest| -> Verdict {
        record.lock().push(req.path.clone());
        Ok(Decision::Allow)
    };
    let (_, mediator) = mediator();
    let mediator = mediator.with_path_mediator(Arc::new(paths));

    let mut b = PolicyBuilder::new();
    b.class(labelgate::MediationClass::File);
    let subject = subject_of(&profile("client", b.build().unwrap()));

    let sock = Arc::new(Socket::unix(sock_type::SOCK_STREAM, subject.label.clone()));
    let listener = Arc::new(Socket::unix(sock_type::SOCK_STREAM, Label::unconfined()));
    listener.bind(SockAddr::Unix(UnixAddr::path("/run/daemon.sock")), Some((0, 0o666)));

    assert!(mediator
        .unix_stream_connect(&subject, &sock, &listener, None)
        .is_ok());
    assert_eq!(*seen.lock(), vec![PathBuf::from("/run/daemon.sock")]);
}

#[test]
fn test_unconnected_file_perm_checks_local_part() {
    let (_, mediator) = mediator();
    let mut b = PolicyBuilder::new();
    let s = unix_local(&mut b, sock_type::SOCK_STREAM, ANONYMOUS);
    b.grant(s, PermissionSet::allowing(mask::GETATTR));
    let subject = subject_of(&profile("p", b.build().unwrap()));
    let sock = Arc::new(Socket::unix(sock_type::SOCK_STREAM, subject.label.clone()));

    assert!(mediator
        .sock_file_perm(&subject, Operation::FileReceive, mask::GETATTR | mask::READ, &sock)
        .is_ok());
    assert!(mediator
        .sock_file_perm(&subject, Operation::FileReceive, mask::SETATTR, &sock)
        .is_err());
}

#[test]
fn test_create_dispatches_to_unix_rules() {
    let (_, mediator) = mediator();
    let mut b = PolicyBuilder::new();
    let af = b.family(family::AF_UNIX);
    let t = b.be16(af, sock_type::SOCK_STREAM);
    let p = b.be16(t, 0);
    b.grant(p, PermissionSet::allowing(mask::CREATE));
    let subject = subject_of(&profile("p", b.build().unwrap()));

    assert!(mediator
        .socket_create(&subject, family::AF_UNIX, sock_type::SOCK_STREAM, 0, false)
        .is_ok());
    let err = mediator
        .socket_create(&subject, family::AF_UNIX, sock_type::SOCK_STREAM, 1, false)
        .unwrap_err();
    assert_eq!(err.info(), Some("failed type and protocol match"));
}

#[test]
fn test_unconfined_never_mediated() {
    let (sink, mediator) = mediator();
    let subject = Subject::unconfined();
    let a = Arc::new(Socket::unix(sock_type::SOCK_STREAM, Label::unconfined()));
    let b = Arc::new(Socket::unix(sock_type::SOCK_STREAM, Label::unconfined()));
    Socket::connect_pair(&a, &b);

    assert_eq!(
        mediator.unix_create(&subject, sock_type::SOCK_STREAM, 0),
        Ok(Decision::Allow)
    );
    assert!(mediator.unix_listen(&subject, &a, 1).is_ok());
    assert!(mediator.unix_may_send(&subject, &a, &b).is_ok());
    assert!(mediator
        .unix_file_perm(&subject, Operation::FilePerm, mask::READ, &a)
        .is_ok());
    assert!(sink.is_empty());
}

#[test]
fn test_generic_fallback_for_policies_without_unix_rules() {
    let (_, mediator) = mediator();
    let mut b = PolicyBuilder::new();
    let net = b.class(labelgate::MediationClass::Net);
    let fam = b.be16(net, family::AF_UNIX);
    let ty = b.be16(fam, sock_type::SOCK_DGRAM);
    b.grant(ty, PermissionSet::allowing(mask::CREATE | mask::BIND));
    let subject = subject_of(&profile("p", b.build().unwrap()));

    assert!(mediator.unix_create(&subject, sock_type::SOCK_DGRAM, 0).is_ok());
    let sock = Socket::unix(sock_type::SOCK_DGRAM, subject.label.clone());
    assert!(mediator
        .unix_bind(&subject, &sock, &UnixAddr::abstract_name("x"))
        .is_ok());
    assert!(mediator.unix_create(&subject, sock_type::SOCK_STREAM, 0).is_err());
}
