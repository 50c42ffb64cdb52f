/*!
 * Audit Cache Tests
 * Deduplication, reference counting, teardown and bounded operation
 */

use labelgate::audit::{AuditCache, AuditData, AuditNode, AuditRecord, AuditType, Operation};
use labelgate::policy::mask;
use labelgate::{AuditDecision, Auditor, MediationClass, MediationConfig, MemorySink, Policy, Profile};
use std::sync::Arc;
use std::thread;

fn record(profile: &Profile, op: Operation, name: &str, denied: u32) -> AuditRecord {
    let ad = AuditData::new(MediationClass::File, op).with_name(name);
    AuditRecord::from_data(AuditType::Denied, profile, &ad, denied, denied, -13).unwrap()
}

#[test]
fn test_equal_records_share_one_node() {
    let profile = Profile::new("p", Policy::empty());
    let cache = AuditCache::new();

    let first = cache.insert(Arc::new(AuditNode::new(record(&profile, Operation::Open, "/a", mask::READ))));
    let second = cache.insert(Arc::new(AuditNode::new(record(&profile, Operation::Open, "/a", mask::READ))));

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.size(), 1);
    drop(first);
    assert_eq!(second.refcount(), 2);
}

#[test]
fn test_distinct_records_kept_apart() {
    let profile = Profile::new("p", Policy::empty());
    let cache = AuditCache::new();
    cache.insert(Arc::new(AuditNode::new(record(&profile, Operation::Open, "/a", mask::READ))));
    cache.insert(Arc::new(AuditNode::new(record(&profile, Operation::Unlink, "/a", mask::READ))));
    cache.insert(Arc::new(AuditNode::new(record(&profile, Operation::Open, "/b", mask::READ))));
    assert_eq!(cache.size(), 3);
}

#[test]
fn test_masks_do_not_split_records() {
    let profile = Profile::new("p", Policy::empty());
    let cache = AuditCache::new();
    let node = cache.insert(Arc::new(AuditNode::new(record(&profile, Operation::Open, "/a", mask::READ))));

    let wider = record(&profile, Operation::Open, "/a", mask::READ | mask::WRITE);
    let found = cache.find(&wider).unwrap();
    assert!(Arc::ptr_eq(&node, &found));
    assert_eq!(cache.update(&found, &wider), mask::WRITE);
    assert_eq!(cache.update(&found, &wider), 0);
    assert_eq!(found.denied(), mask::READ | mask::WRITE);
    assert_eq!(found.hits(), 3);
}

#[test]
fn test_destroy_releases_everything() {
    let profile = Profile::new("p", Policy::empty());
    let cache = AuditCache::new();
    let rec = record(&profile, Operation::Open, "/a", mask::READ);
    let node = cache.insert(Arc::new(AuditNode::new(rec.clone())));
    assert_eq!(node.refcount(), 2);

    cache.destroy();
    assert_eq!(cache.size(), 0);
    assert!(cache.find(&rec).is_none());
    assert_eq!(node.refcount(), 1);

    let late = Arc::new(AuditNode::new(rec.clone()));
    let returned = cache.insert(Arc::clone(&late));
    assert!(Arc::ptr_eq(&late, &returned));
    assert_eq!(cache.size(), 0);
    assert!(cache.find(&rec).is_none());
}

#[test]
fn test_bounded_cache_evicts_oldest() {
    let profile = Profile::new("p", Policy::empty());
    let cache = AuditCache::new();
    let names = ["/a", "/b", "/c"];
    for name in names {
        cache.insert_bounded(
            Arc::new(AuditNode::new(record(&profile, Operation::Open, name, mask::READ))),
            2,
        );
    }
    assert_eq!(cache.size(), 2);
    assert!(cache.find(&record(&profile, Operation::Open, "/a", mask::READ)).is_none());
    assert!(cache.find(&record(&profile, Operation::Open, "/c", mask::READ)).is_some());
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn test_concurrent_inserts_collapse() {
    let profile = Arc::new(Profile::new("p", Policy::empty()));
    let cache = Arc::new(AuditCache::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let profile = Arc::clone(&profile);
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for _ in 0..100 {
                    let node = Arc::new(AuditNode::new(record(&profile, Operation::Open, "/hot", mask::READ)));
                    cache.insert(node);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(cache.size(), 1);
}

#[test]
fn test_auditor_reemits_new_denied_bits() {
    let sink = Arc::new(MemorySink::new());
    let auditor = Auditor::new(sink.clone(), MediationConfig::default());
    let profile = Profile::new("p", Policy::empty());
    let ad = AuditData::new(MediationClass::File, Operation::Open).with_name("/a");

    let audit = |denied| auditor.audit(AuditType::Denied, &profile, &ad, denied, denied, -13).unwrap();
    assert_eq!(audit(mask::READ), AuditDecision::Emitted);
    assert_eq!(audit(mask::READ), AuditDecision::Deduplicated);
    assert_eq!(audit(mask::WRITE), AuditDecision::Emitted);
    assert_eq!(audit(mask::READ | mask::WRITE), AuditDecision::Deduplicated);
    assert_eq!(sink.len(), 2);
    assert_eq!(profile.audit_cache().size(), 1);
}

#[test]
fn test_teardown_stops_caching() {
    let sink = Arc::new(MemorySink::new());
    let auditor = Auditor::new(sink.clone(), MediationConfig::default());
    let profile = Profile::new("p", Policy::empty());
    let ad = AuditData::new(MediationClass::File, Operation::Open).with_name("/a");

    auditor.audit(AuditType::Denied, &profile, &ad, mask::READ, mask::READ, -13).unwrap();
    profile.teardown();
    assert_eq!(
        auditor.audit(AuditType::Denied, &profile, &ad, mask::READ, mask::READ, -13).unwrap(),
        AuditDecision::Emitted
    );
    assert_eq!(sink.len(), 2);
    assert_eq!(profile.audit_cache().size(), 0);
}

#[test]
fn test_dedup_disabled_emits_every_time() {
    let sink = Arc::new(MemorySink::new());
    let config = MediationConfig {
        dedup_audit: false,
        ..MediationConfig::default()
    };
    let auditor = Auditor::new(sink.clone(), config);
    let profile = Profile::new("p", Policy::empty());
    let ad = AuditData::new(MediationClass::File, Operation::Open).with_name("/a");

    for _ in 0..3 {
        auditor.audit(AuditType::Denied, &profile, &ad, mask::READ, mask::READ, -13).unwrap();
    }
    assert_eq!(sink.len(), 3);
}
