/*!
 * End-to-End Scenarios
 * Whole decisions observed through verdicts, the audit trail and caches
 */

use super::common::{mediator, profile, profile_in_mode, subject_of, unix_local, unix_peer, ANONYMOUS};
use labelgate::audit::{AuditType, Operation};
use labelgate::core::errors::MediationError;
use labelgate::net::{family, sock_type};
use labelgate::policy::mask;
use labelgate::{
    Decision, Label, PermissionSet, Policy, PolicyBuilder, ProfileMode, SockAddr, Socket, Subject,
    UnixAddr,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn dgram_create_policy() -> Policy {
    let mut b = PolicyBuilder::new();
    let af = b.family(family::AF_UNIX);
    let ty = b.be16(af, sock_type::SOCK_DGRAM);
    let proto = b.be16(ty, 0);
    b.grant(proto, PermissionSet::allowing(mask::CREATE));
    b.build().unwrap()
}

#[test]
fn test_create_type_mismatch_emits_once() {
    let (sink, mediator) = mediator();
    let subject = subject_of(&profile("p1", dgram_create_policy()));

    let err = mediator
        .unix_create(&subject, sock_type::SOCK_STREAM, 0)
        .unwrap_err();
    assert_eq!(
        err,
        MediationError::PolicyMismatch {
            info: "failed type and protocol match",
            denied: mask::CREATE,
        }
    );

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].record.audit_type, AuditType::Denied);
    assert_eq!(events[0].record.info.as_deref(), Some("failed type and protocol match"));
    assert!(events[0].message.contains("requested=\"create\""));
    assert!(events[0].message.contains("profile=\"p1\""));
}

#[test]
fn test_compound_sender_one_profile_refuses_peer() {
    let (sink, mediator) = mediator();

    // p1 sends to any peer label, p2 only to `trusted`
    let mut b1 = PolicyBuilder::new();
    let s = unix_peer(&mut b1, sock_type::SOCK_DGRAM, ANONYMOUS, b"\0svc");
    let any = b1.any_string(s);
    b1.grant(any, PermissionSet::allowing(mask::SEND));
    let p1 = profile("p1", b1.build().unwrap());

    let mut b2 = PolicyBuilder::new();
    let s = unix_peer(&mut b2, sock_type::SOCK_DGRAM, ANONYMOUS, b"\0svc");
    let trusted = b2.literal(s, b"trusted");
    b2.grant(trusted, PermissionSet::allowing(mask::SEND));
    let p2 = profile("p2", b2.build().unwrap());

    let l1 = Arc::new(Label::new(vec![Arc::clone(&p1), Arc::clone(&p2)]));
    assert_eq!(l1.name(), "p1//&p2");
    let subject = Subject::new(Arc::clone(&l1));

    let l2 = Arc::new(Label::single(profile("other", Policy::empty())));
    let sock = Socket::unix(sock_type::SOCK_DGRAM, Arc::clone(&l1));
    let svc = Socket::unix(sock_type::SOCK_DGRAM, l2);
    svc.bind(SockAddr::Unix(UnixAddr::abstract_name("svc")), None);

    let err = mediator.unix_may_send(&subject, &sock, &svc).unwrap_err();
    assert_eq!(err.info(), Some("failed peer label match"));
    assert_eq!(err.denied(), mask::SEND);

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].record.profile.as_str(), "p2");
    assert_eq!(events[0].record.peer.as_deref(), Some("other"));
    assert!(events[0].message.contains("peer_addr=\"@svc\""));

    // p1 alone lets the datagram through
    let alone = subject_of(&p1);
    assert!(mediator.unix_may_send(&alone, &sock, &svc).is_ok());
}

#[test]
fn test_repeated_getopt_denials_cached_once() {
    let (sink, mediator) = mediator();
    let mut b = PolicyBuilder::new();
    let local = unix_local(&mut b, sock_type::SOCK_STREAM, ANONYMOUS);
    b.grant(local, PermissionSet::allowing(mask::GETATTR));
    let p = profile("p", b.build().unwrap());
    let subject = subject_of(&p);
    let sock = Socket::unix(sock_type::SOCK_STREAM, subject.label.clone());

    for _ in 0..100 {
        let err = mediator
            .unix_opt(&subject, Operation::Getsockopt, mask::GETOPT, &sock, 1, 7)
            .unwrap_err();
        assert_eq!(err.denied(), mask::GETOPT);
    }
    assert_eq!(sink.len(), 1);
    assert_eq!(p.audit_cache().size(), 1);

    let stats = mediator.audit_stats();
    assert_eq!(stats.emitted, 1);
    assert_eq!(stats.deduplicated, 99);
}

#[test]
fn test_policy_replacement_reports_again() {
    let (sink, mediator) = mediator();
    let p = profile("p", dgram_create_policy());
    let subject = subject_of(&p);

    assert!(mediator.unix_create(&subject, sock_type::SOCK_STREAM, 0).is_err());
    assert!(mediator.unix_create(&subject, sock_type::SOCK_STREAM, 0).is_err());
    assert_eq!(sink.len(), 1);

    p.replace_policy(dgram_create_policy());
    assert_eq!(p.audit_cache().size(), 0);
    assert!(mediator.unix_create(&subject, sock_type::SOCK_STREAM, 0).is_err());
    assert_eq!(sink.len(), 2);
}

#[test]
fn test_complain_profile_allows_and_reports() {
    let (sink, mediator) = mediator();
    let p = profile_in_mode("learner", dgram_create_policy(), ProfileMode::Complain);
    let subject = subject_of(&p);

    assert_eq!(
        mediator.unix_create(&subject, sock_type::SOCK_STREAM, 0),
        Ok(Decision::Complain { denied: mask::CREATE })
    );
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].record.audit_type, AuditType::Allowed);
    assert!(events[0].message.starts_with("apparmor=\"ALLOWED\""));
}

#[test]
fn test_kill_profile_is_fatal() {
    let (sink, mediator) = mediator();
    let p = profile_in_mode("strict", dgram_create_policy(), ProfileMode::Kill);
    let subject = subject_of(&p);

    assert_eq!(
        mediator.unix_create(&subject, sock_type::SOCK_STREAM, 0),
        Err(MediationError::Killed { denied: mask::CREATE })
    );
    assert_eq!(sink.events()[0].record.audit_type, AuditType::Kill);
    assert!(mediator.unix_create(&subject, sock_type::SOCK_DGRAM, 0).is_ok());
}

#[test]
fn test_kill_beats_complain_in_compound_label() {
    let (sink, mediator) = mediator();
    let complain = profile_in_mode("learner", dgram_create_policy(), ProfileMode::Complain);
    let kill = profile_in_mode("strict", dgram_create_policy(), ProfileMode::Kill);
    let subject = Subject::new(Arc::new(Label::new(vec![complain, kill])));

    let verdict = mediator.unix_create(&subject, sock_type::SOCK_STREAM, 0);
    assert_eq!(verdict, Err(MediationError::Killed { denied: mask::CREATE }));
    assert_eq!(sink.len(), 2);
}
