/*!
 * Property Tests
 * Automaton walks, mode resolution, signal mapping and address encoding
 */

use super::common::ANONYMOUS;
use labelgate::audit::{AuditData, Operation};
use labelgate::core::errors::MediationError;
use labelgate::core::limits::{SIGRT_BASE, SIGUNKNOWN};
use labelgate::engine::{check_perms, resolve_set};
use labelgate::mediation::map_signal_num;
use labelgate::{
    Auditor, Decision, MediationClass, MediationConfig, MemorySink, PermissionSet, Policy,
    PolicyBuilder, Profile, ProfileMode, UnixAddr,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::sync::Arc;

fn rule_policy(rules: &[Vec<u8>]) -> Policy {
    let mut b = PolicyBuilder::new();
    let start = b.class(MediationClass::File);
    for (i, rule) in rules.iter().enumerate() {
        let end = b.literal(start, rule);
        b.grant(end, PermissionSet::allowing(1 << (i % 16)));
    }
    b.build().unwrap()
}

fn auditor() -> Auditor {
    Auditor::new(Arc::new(MemorySink::new()), MediationConfig::default())
}

proptest! {
    #[test]
    fn prop_walks_are_deterministic(
        rules in vec(vec(any::<u8>(), 1..8), 1..6),
        input in vec(any::<u8>(), 0..16),
    ) {
        let policy = rule_policy(&rules);
        let dfa = policy.dfa();
        let start = policy.class_start(MediationClass::File);
        prop_assert_eq!(dfa.advance(start, &input), dfa.advance(start, &input));
    }

    #[test]
    fn prop_walks_compose(
        rules in vec(vec(any::<u8>(), 1..8), 1..6),
        head in vec(any::<u8>(), 0..8),
        tail in vec(any::<u8>(), 0..8),
    ) {
        let policy = rule_policy(&rules);
        let dfa = policy.dfa();
        let start = policy.class_start(MediationClass::File);
        let whole: Vec<u8> = head.iter().chain(tail.iter()).copied().collect();
        prop_assert_eq!(dfa.advance(dfa.advance(start, &head), &tail), dfa.advance(start, &whole));
    }

    #[test]
    fn prop_literal_rules_match(rules in vec(vec(any::<u8>(), 1..8), 1..6)) {
        let policy = rule_policy(&rules);
        let dfa = policy.dfa();
        let start = policy.class_start(MediationClass::File);
        for rule in &rules {
            prop_assert_ne!(dfa.advance(start, rule), labelgate::core::limits::DFA_NOMATCH);
        }
    }

    #[test]
    fn prop_complain_never_refuses_without_kill(
        allow in any::<u32>(),
        request in any::<u32>(),
        kill in any::<u32>(),
    ) {
        let auditor = auditor();
        let profile = Profile::new("p", Policy::empty()).with_mode(ProfileMode::Complain);
        let ad = AuditData::new(MediationClass::Signal, Operation::Signal);
        let perms = PermissionSet::allowing(allow).with_kill(kill);
        let res = resolve_set(&profile, perms, 1, request);
        let denied = request & !allow;

        let verdict = check_perms(&auditor, &profile, &res, request, &ad);
        if denied == 0 {
            prop_assert_eq!(verdict, Ok(Decision::Allow));
        } else if denied & kill != 0 {
            prop_assert_eq!(verdict, Err(MediationError::Killed { denied }));
        } else {
            prop_assert_eq!(verdict, Ok(Decision::Complain { denied }));
        }
    }

    #[test]
    fn prop_enforce_refuses_every_denial(allow in any::<u32>(), request in any::<u32>()) {
        let auditor = auditor();
        let profile = Profile::new("p", Policy::empty());
        let ad = AuditData::new(MediationClass::Signal, Operation::Signal);
        let res = resolve_set(&profile, PermissionSet::allowing(allow), 1, request);

        let verdict = check_perms(&auditor, &profile, &res, request, &ad);
        prop_assert_eq!(verdict.is_ok(), request & !allow == 0);
    }

    #[test]
    fn prop_signal_mapping_in_range(sig in any::<i32>()) {
        let mapped = map_signal_num(sig);
        prop_assert!(
            mapped == SIGUNKNOWN
                || (1..=35).contains(&mapped)
                || (SIGRT_BASE..=SIGRT_BASE + 32).contains(&mapped)
        );
        prop_assert_eq!(mapped == SIGUNKNOWN, !(0..=64).contains(&sig));
    }

    #[test]
    fn prop_signal_mapping_injective(a in 0i32..=64, b in 0i32..=64) {
        prop_assume!(a != b);
        prop_assert_ne!(map_signal_num(a), map_signal_num(b));
    }

    #[test]
    fn prop_abstract_names_never_anonymous(name in vec(any::<u8>(), 0..32)) {
        let addr = UnixAddr::abstract_name(name.clone());
        let bytes = addr.match_bytes();
        prop_assert_eq!(bytes[0], 0);
        prop_assert_eq!(&bytes[1..], &name[..]);
        prop_assert_ne!(&bytes[..], ANONYMOUS);
    }

    #[test]
    fn prop_sun_path_nul_prefix_is_abstract(name in vec(any::<u8>(), 0..64)) {
        let mut raw = vec![0u8];
        raw.extend_from_slice(&name);
        let parsed = UnixAddr::from_sun_path(&raw).unwrap();
        prop_assert_eq!(parsed, Some(UnixAddr::Abstract(name)));
    }
}
