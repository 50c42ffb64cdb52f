/*!
 * Audit Cache
 * Deduplicating store of emitted decision records, one per profile
 */

use super::record::{AuditKey, AuditRecord};
use crate::core::types::PermMask;
use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// One cached decision
///
/// The record content is fixed once built; only the aggregated masks and
/// the hit bookkeeping change while the node is cached. Shared ownership
/// is the reference count: the cache holds one handle, every in-flight
/// caller holds another.
#[derive(Debug)]
pub struct AuditNode {
    record: AuditRecord,
    key: AuditKey,
    request: AtomicU32,
    denied: AtomicU32,
    hits: AtomicU64,
    last_seen: AtomicU64,
}

impl AuditNode {
    pub fn new(record: AuditRecord) -> Self {
        let key = record.key();
        Self {
            request: AtomicU32::new(record.request),
            denied: AtomicU32::new(record.denied),
            hits: AtomicU64::new(1),
            last_seen: AtomicU64::new(0),
            key,
            record,
        }
    }

    #[inline]
    pub fn record(&self) -> &AuditRecord {
        &self.record
    }

    #[inline]
    pub fn key(&self) -> &AuditKey {
        &self.key
    }

    /// Requested bits aggregated across every update
    pub fn request(&self) -> PermMask {
        self.request.load(Ordering::Acquire)
    }

    /// Denied bits aggregated across every update
    pub fn denied(&self) -> PermMask {
        self.denied.load(Ordering::Acquire)
    }

    /// Decisions folded into this node, including the first
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Live handles to this node
    pub fn refcount(self: &Arc<Self>) -> usize {
        Arc::strong_count(self)
    }
}

/// Per-profile audit cache
///
/// Sharded map keyed by the record comparator, so unrelated decisions do
/// not contend on a single lock. `size` is kept explicitly: it grows while
/// the shard lock of the new entry is held and shrinks only after an entry
/// was unlinked, so it never drops below the number of linked nodes.
#[repr(C, align(64))]
pub struct AuditCache {
    nodes: DashMap<AuditKey, Arc<AuditNode>, RandomState>,
    size: AtomicUsize,
    clock: AtomicU64,
    destroyed: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl AuditCache {
    pub fn new() -> Self {
        Self {
            nodes: DashMap::with_hasher(RandomState::new()),
            size: AtomicUsize::new(0),
            clock: AtomicU64::new(0),
            destroyed: AtomicBool::new(false),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    #[inline]
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Cached node comparing equal to `record`
    pub fn find(&self, record: &AuditRecord) -> Option<Arc<AuditNode>> {
        self.find_key(&record.key())
    }

    pub fn find_key(&self, key: &AuditKey) -> Option<Arc<AuditNode>> {
        if self.is_destroyed() {
            return None;
        }
        match self.nodes.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(entry.value()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Link `node`, or return the equal node already cached.
    ///
    /// A racing insert of an equal record loses: its node is dropped and
    /// the caller gets a new handle to the winner. After [`destroy`] the
    /// node comes back uncached.
    ///
    /// [`destroy`]: AuditCache::destroy
    pub fn insert(&self, node: Arc<AuditNode>) -> Arc<AuditNode> {
        self.link(node).0
    }

    /// Insert, then evict least-recently-seen nodes until at most
    /// `capacity` remain. The node just linked is never the one evicted.
    pub fn insert_bounded(&self, node: Arc<AuditNode>, capacity: usize) -> Arc<AuditNode> {
        if capacity == 0 {
            return node;
        }
        let (node, linked) = self.link(node);
        if linked {
            while self.size() > capacity {
                if !self.evict_oldest(node.key()) {
                    break;
                }
            }
        }
        node
    }

    fn link(&self, node: Arc<AuditNode>) -> (Arc<AuditNode>, bool) {
        if self.is_destroyed() {
            return (node, false);
        }
        node.last_seen.store(self.tick(), Ordering::Relaxed);

        let linked = match self.nodes.entry(node.key().clone()) {
            Entry::Occupied(existing) => return (Arc::clone(existing.get()), false),
            Entry::Vacant(slot) => {
                let entry = slot.insert(Arc::clone(&node));
                self.size.fetch_add(1, Ordering::AcqRel);
                drop(entry);
                node
            }
        };

        // lost a race with destroy; do not leave the node behind
        if self.is_destroyed() && self.nodes.remove(linked.key()).is_some() {
            self.size.fetch_sub(1, Ordering::AcqRel);
            return (linked, false);
        }
        (linked, true)
    }

    fn evict_oldest(&self, keep: &AuditKey) -> bool {
        let oldest = self
            .nodes
            .iter()
            .filter(|entry| entry.key() != keep)
            .min_by_key(|entry| entry.value().last_seen.load(Ordering::Relaxed))
            .map(|entry| entry.key().clone());

        match oldest.and_then(|key| self.nodes.remove(&key)) {
            Some(_) => {
                self.size.fetch_sub(1, Ordering::AcqRel);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Fold a repeated decision into a cached node.
    ///
    /// Returns the denied bits this decision adds to the node.
    pub fn update(&self, node: &AuditNode, record: &AuditRecord) -> PermMask {
        node.request.fetch_or(record.request, Ordering::AcqRel);
        let before = node.denied.fetch_or(record.denied, Ordering::AcqRel);
        node.hits.fetch_add(1, Ordering::Relaxed);
        node.last_seen.store(self.tick(), Ordering::Relaxed);
        record.denied & !before
    }

    /// Unlink every node; the cache stays usable
    pub fn clear(&self) -> usize {
        let mut removed = 0usize;
        self.nodes.retain(|_, _| {
            removed += 1;
            false
        });
        self.size.fetch_sub(removed, Ordering::AcqRel);
        removed
    }

    /// Unlink and release every node. Nothing is cached afterwards.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        let removed = self.clear();
        if removed > 0 {
            debug!(removed, "audit cache destroyed");
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            size: self.size(),
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate,
        }
    }
}

impl Default for AuditCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub hit_rate: f64,
}
