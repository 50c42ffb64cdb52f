/*!
 * Collaborator Tests
 * Path mediator and audit sink seams exercised through mocks
 */

use super::common::{profile, unix_local, ANONYMOUS};
use labelgate::net::family;
use labelgate::audit::{AuditEvent, AuditType, Operation};
use labelgate::core::errors::MediationError;
use labelgate::mediation::PathRequest;
use labelgate::net::sock_type;
use labelgate::policy::mask;
use labelgate::{
    AuditSink, Cred, Decision, Label, MediationConfig, Mediator, MemorySink, PathMediator,
    PermissionSet, PolicyBuilder, Socket, Subject, UnixAddr, Verdict,
};
use mockall::mock;
use std::path::PathBuf;
use std::sync::Arc;

mock! {
    pub Paths {}
    impl PathMediator for Paths {
        fn path_perm(&self, subject: &Subject, req: &PathRequest) -> Verdict;
    }
}

mock! {
    pub Sink {}
    impl AuditSink for Sink {
        fn emit(&self, event: &AuditEvent);
    }
}

fn confined(name: &str, fsuid: u32) -> Subject {
    let mut b = PolicyBuilder::new();
    let af = b.family(family::AF_UNIX);
    let ty = b.be16(af, sock_type::SOCK_STREAM);
    let proto = b.be16(ty, 0);
    b.grant(proto, PermissionSet::allowing(mask::CREATE));
    let local = unix_local(&mut b, sock_type::SOCK_STREAM, ANONYMOUS);
    b.grant(local, PermissionSet::allowing(mask::GETATTR));
    Subject::new(Arc::new(Label::single(profile(name, b.build().unwrap())))).with_cred(Cred::new(fsuid))
}

fn with_paths(paths: MockPaths) -> Mediator {
    Mediator::with_sink(Arc::new(MemorySink::new()), MediationConfig::default())
        .with_path_mediator(Arc::new(paths))
}

#[test]
fn test_fs_bind_delegated_as_create() {
    let mut paths = MockPaths::new();
    paths
        .expect_path_perm()
        .withf(|_, req| {
            req.op == Operation::Bind
                && req.request == mask::CREATE
                && req.path == PathBuf::from("/run/app.sock")
                && req.cond.uid == 1000
        })
        .times(1)
        .returning(|_, _| Ok(Decision::Allow));
    let mediator = with_paths(paths);

    let subject = confined("app", 1000);
    let sock = Socket::unix(sock_type::SOCK_STREAM, subject.label.clone());
    assert!(mediator
        .unix_bind(&subject, &sock, &UnixAddr::path("/run/app.sock"))
        .is_ok());
}

#[test]
fn test_path_denial_propagates() {
    let mut paths = MockPaths::new();
    paths.expect_path_perm().times(1).returning(|_, _| {
        Err(MediationError::PermissionDenied {
            denied: mask::CREATE,
            info: None,
        })
    });
    let mediator = with_paths(paths);

    let subject = confined("app", 1000);
    let sock = Socket::unix(sock_type::SOCK_STREAM, subject.label.clone());
    let err = mediator
        .unix_bind(&subject, &sock, &UnixAddr::path("/srv/denied.sock"))
        .unwrap_err();
    assert_eq!(err.denied(), mask::CREATE);
}

#[test]
fn test_abstract_bind_never_consults_paths() {
    let mut paths = MockPaths::new();
    paths.expect_path_perm().never();
    let mediator = with_paths(paths);

    let subject = confined("app", 1000);
    let sock = Socket::unix(sock_type::SOCK_STREAM, subject.label.clone());
    // no bind rule for the abstract name
    assert!(mediator
        .unix_bind(&subject, &sock, &UnixAddr::abstract_name("svc"))
        .is_err());
}

#[test]
fn test_unconfined_bind_never_consults_paths() {
    let mut paths = MockPaths::new();
    paths.expect_path_perm().never();
    let mediator = with_paths(paths);

    let subject = Subject::unconfined();
    let sock = Socket::unix(sock_type::SOCK_STREAM, Label::unconfined());
    assert!(mediator
        .unix_bind(&subject, &sock, &UnixAddr::path("/run/app.sock"))
        .is_ok());
}

#[test]
fn test_repeated_denials_reach_sink_once() {
    let mut sink = MockSink::new();
    sink.expect_emit()
        .withf(|event| {
            event.record.audit_type == AuditType::Denied
                && event.record.op == Operation::Getsockopt
                && event.record.denied == mask::GETOPT
        })
        .times(1)
        .return_const(());
    let mediator = Mediator::with_sink(Arc::new(sink), MediationConfig::default());

    let subject = confined("app", 1000);
    let sock = Socket::unix(sock_type::SOCK_STREAM, subject.label.clone());
    for _ in 0..100 {
        assert!(mediator
            .unix_opt(&subject, Operation::Getsockopt, mask::GETOPT, &sock, 1, 7)
            .is_err());
    }
    assert_eq!(mediator.audit_stats().emitted, 1);
    assert_eq!(mediator.audit_stats().deduplicated, 99);
}

#[test]
fn test_allowed_decisions_skip_sink() {
    let mut sink = MockSink::new();
    sink.expect_emit().never();
    let mediator = Mediator::with_sink(Arc::new(sink), MediationConfig::default());

    let subject = confined("app", 1000);
    assert!(mediator
        .unix_create(&subject, sock_type::SOCK_STREAM, 0)
        .is_ok());
}
