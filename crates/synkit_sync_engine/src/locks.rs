//! Striped per-key locks.

use parking_lot::{Mutex, MutexGuard};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// A fixed table of mutexes selected by hashing the remote key.
///
/// Requests for the same remote key always take the same stripe and run one
/// at a time. Different keys usually land on different stripes; when they
/// collide they are serialized too, which is safe but slower.
pub struct KeyLocks {
    stripes: Vec<Mutex<()>>,
}

impl KeyLocks {
    /// Creates a table with `stripes` mutexes (at least one).
    pub fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Number of stripes.
    pub fn len(&self) -> usize {
        self.stripes.len()
    }

    /// Always false; a table has at least one stripe.
    pub fn is_empty(&self) -> bool {
        self.stripes.is_empty()
    }

    /// Index of the stripe guarding `remote_key`.
    pub fn stripe_of(&self, remote_key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        remote_key.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }

    /// Blocks until the stripe for `remote_key` is free and takes it.
    pub fn lock(&self, remote_key: &str) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_of(remote_key)].lock()
    }
}
