//! Optimistic local-freshness tracking.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter the host bumps on every local mutation.
#[derive(Debug, Default)]
pub struct LocalVersion(AtomicU64);

impl LocalVersion {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Record a local mutation and return the new version.
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            captured_at: self.current(),
        }
    }
}

/// The local version a cycle read its data at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub captured_at: u64,
}

impl Snapshot {
    /// Whether no local mutation happened since the snapshot was taken.
    pub fn is_current(self, version: &LocalVersion) -> bool {
        version.current() == self.captured_at
    }
}
