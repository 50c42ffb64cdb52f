/*!
 * ID Generation
 * Monotonic identities for profiles and lockable objects
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// Type-Safe ID Wrappers
// ============================================================================

/// Identity of a lockable resource object.
///
/// Two-object locking orders by this value, never by address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

/// Identity of a loaded profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj:{}", self.0)
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "profile:{}", self.0)
    }
}

// ============================================================================
// Atomic Counter Generator
// ============================================================================

/// Lock-free monotonic counter
///
/// # Performance
/// - Cache-line aligned to prevent false sharing with neighbouring statics
#[repr(C, align(64))]
pub struct AtomicGenerator {
    counter: AtomicU64,
}

impl AtomicGenerator {
    #[inline]
    pub const fn new(start: u64) -> Self {
        Self {
            counter: AtomicU64::new(start),
        }
    }

    #[inline]
    pub fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

static OBJECT_IDS: AtomicGenerator = AtomicGenerator::new(1);
static PROFILE_IDS: AtomicGenerator = AtomicGenerator::new(1);

impl ObjectId {
    /// Allocate a fresh object identity
    #[inline]
    pub fn next() -> Self {
        Self(OBJECT_IDS.next())
    }
}

impl ProfileId {
    /// Allocate a fresh profile identity
    #[inline]
    pub fn next() -> Self {
        Self(PROFILE_IDS.next())
    }
}
