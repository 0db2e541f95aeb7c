//! Pairs awaiting a result in the active primary session.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::keys::DatePairKey;

/// Generation-guarded set of pending date pairs.
///
/// The set belongs to one primary session at a time, identified by its
/// generation. [`reset`](Self::reset) hands ownership to a new generation;
/// every other mutation is ignored unless it comes from the current owner,
/// so a cancelled session that is still unwinding cannot touch the pending
/// state of its successor.
#[derive(Debug, Clone)]
pub struct PendingSet {
    inner: Arc<Mutex<PendingState>>,
    count: watch::Sender<usize>,
}

#[derive(Debug, Default)]
struct PendingState {
    generation: u64,
    keys: HashSet<DatePairKey>,
}

impl Default for PendingSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingSet {
    /// Create an empty set owned by no session.
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(PendingState::default())),
            count,
        }
    }

    /// Replace the contents and make `generation` the owner.
    ///
    /// Generations only move forward: a reset from a generation older than
    /// the current owner is ignored and returns false.
    pub fn reset(&self, generation: u64, keys: impl IntoIterator<Item = DatePairKey>) -> bool {
        let mut state = self.inner.lock();
        if generation < state.generation {
            return false;
        }
        state.generation = generation;
        state.keys = keys.into_iter().collect();
        self.count.send_replace(state.keys.len());
        true
    }

    /// Mark one pair as answered.
    ///
    /// Returns the number of pairs still pending, or `None` if `generation`
    /// no longer owns the set.
    pub fn resolve(&self, generation: u64, key: &DatePairKey) -> Option<usize> {
        let mut state = self.inner.lock();
        if state.generation != generation {
            return None;
        }
        if state.keys.remove(key) {
            self.count.send_replace(state.keys.len());
        }
        Some(state.keys.len())
    }

    /// Drop every pending pair. Returns how many were still pending.
    pub fn clear(&self, generation: u64) -> Option<usize> {
        let mut state = self.inner.lock();
        if state.generation != generation {
            return None;
        }
        let cleared = state.keys.len();
        state.keys.clear();
        self.count.send_replace(0);
        Some(cleared)
    }

    /// Release a cancelled session's pairs if it still owns the set.
    pub fn abandon(&self, generation: u64) {
        self.clear(generation);
    }

    /// Whether the pair is pending.
    pub fn contains(&self, key: &DatePairKey) -> bool {
        self.inner.lock().keys.contains(key)
    }

    /// Number of pending pairs.
    pub fn len(&self) -> usize {
        self.inner.lock().keys.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().keys.is_empty()
    }

    /// Snapshot of the pending pairs.
    pub fn keys(&self) -> HashSet<DatePairKey> {
        self.inner.lock().keys.clone()
    }

    /// Generation currently owning the set.
    pub fn owner(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Watch the pending count, e.g. to drive a loading indicator.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.count.subscribe()
    }
}
