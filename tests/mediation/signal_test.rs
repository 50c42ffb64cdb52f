/*!
 * Signal Mediation Tests
 * Multi-profile labels and namespaced peers
 */

use super::common::{mediator, profile};
use labelgate::mediation::map_signal_num;
use labelgate::policy::mask;
use labelgate::{Label, MediationClass, PermissionSet, Policy, PolicyBuilder, Profile, Subject};
use std::sync::Arc;

const SIGHUP: i32 = 1;
const SIGUSR1: i32 = 10;

fn grants(rules: &[(i32, &str, u32)]) -> Policy {
    let mut b = PolicyBuilder::new();
    let start = b.class(MediationClass::Signal);
    for (sig, peer, perms) in rules {
        let s = b.step(start, map_signal_num(*sig) as u8);
        let p = b.literal(s, peer.as_bytes());
        b.grant(p, PermissionSet::allowing(*perms));
    }
    b.build().unwrap()
}

#[test]
fn test_every_sender_profile_must_allow() {
    let (sink, mediator) = mediator();
    let permissive = profile("a", grants(&[(SIGHUP, "daemon", mask::WRITE)]));
    let strict = profile("b", grants(&[]));
    let sender = Subject::new(Arc::new(Label::new(vec![permissive, strict])));
    let target = Subject::new(Arc::new(Label::single(profile(
        "daemon",
        grants(&[(SIGHUP, "a//&b", mask::READ)]),
    ))));

    let err = mediator.may_signal(&sender, &target, SIGHUP).unwrap_err();
    assert_eq!(err.denied(), mask::WRITE);
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].record.profile.as_str(), "b");
}

#[test]
fn test_compound_target_label() {
    let (_, mediator) = mediator();
    let sender = Subject::new(Arc::new(Label::single(profile(
        "ctl",
        grants(&[(SIGUSR1, "web", mask::WRITE), (SIGUSR1, "worker", mask::WRITE)]),
    ))));
    let target = Subject::new(Arc::new(Label::new(vec![
        profile("web", grants(&[(SIGUSR1, "ctl", mask::READ)])),
        profile("worker", grants(&[(SIGUSR1, "ctl", mask::READ)])),
    ])));

    assert!(mediator.may_signal(&sender, &target, SIGUSR1).is_ok());
    assert!(mediator.may_signal(&sender, &target, SIGHUP).is_err());
}

#[test]
fn test_namespaced_peer_name() {
    let (_, mediator) = mediator();
    let sender = Subject::new(Arc::new(Label::single(profile(
        "init",
        grants(&[(SIGHUP, ":guest:app", mask::WRITE)]),
    ))));
    let guest = Profile::new("app", Policy::empty()).with_namespace("guest");
    let target = Subject::new(Arc::new(Label::single(Arc::new(guest))));

    assert!(mediator.may_signal(&sender, &target, SIGHUP).is_ok());
}

#[test]
fn test_unknown_signal_audit() {
    let (sink, mediator) = mediator();
    let sender = Subject::new(Arc::new(Label::single(profile("p", grants(&[])))));
    assert!(mediator.may_signal(&sender, &Subject::unconfined(), 99).is_err());
    assert!(sink.recent(1)[0].message.contains("signal=unknown(99)"));
}
