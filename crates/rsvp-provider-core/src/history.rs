//! Active-run tracking and bounded history
//!
//! Each manager owns one [`RunStore`]: a map of in-flight runs keyed by run
//! id plus a newest-first history capped at a fixed size. Stores are plain
//! values owned by their manager, so independent managers never share state.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::progress::Shared;

/// Default cap for every history list
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Newest-first list that evicts its oldest entry past `limit`
#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    entries: VecDeque<T>,
    limit: usize,
}

impl<T> BoundedHistory<T> {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit.min(DEFAULT_HISTORY_LIMIT)),
            limit: limit.max(1),
        }
    }

    pub fn push(&mut self, entry: T) {
        self.entries.push_front(entry);
        while self.entries.len() > self.limit {
            self.entries.pop_back();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}

impl<T: Clone> BoundedHistory<T> {
    /// Up to `n` most recent entries, newest first
    pub fn recent(&self, n: usize) -> Vec<T> {
        self.entries.iter().take(n).cloned().collect()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

impl<T> Default for BoundedHistory<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

/// In-flight runs plus the history of finished ones
///
/// Active runs are shared handles mutated by their run task. History holds
/// snapshots taken at finalization, so a finished entry never changes.
pub struct RunStore<T> {
    active: DashMap<String, Shared<T>>,
    history: Mutex<BoundedHistory<T>>,
}

impl<T: Clone> RunStore<T> {
    pub fn new(history_limit: usize) -> Self {
        Self {
            active: DashMap::new(),
            history: Mutex::new(BoundedHistory::new(history_limit)),
        }
    }

    pub fn insert_active(&self, run_id: impl Into<String>, run: Shared<T>) {
        self.active.insert(run_id.into(), run);
    }

    pub fn get_active(&self, run_id: &str) -> Option<Shared<T>> {
        self.active.get(run_id).map(|entry| entry.value().clone())
    }

    pub fn is_active(&self, run_id: &str) -> bool {
        self.active.contains_key(run_id)
    }

    /// Snapshot of an active run
    pub fn snapshot_active(&self, run_id: &str) -> Option<T> {
        self.get_active(run_id).map(|run| run.read().clone())
    }

    pub fn active_snapshots(&self) -> Vec<T> {
        self.active
            .iter()
            .map(|entry| entry.value().read().clone())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Move a run from the active map into history as a snapshot
    ///
    /// Only the run's own task calls this, after its last mutation. Returns
    /// `false` when the run was not active, so a run is recorded once.
    pub fn finalize(&self, run_id: &str) -> bool {
        match self.active.remove(run_id) {
            Some((_, run)) => {
                let snapshot = run.read().clone();
                self.history.lock().push(snapshot);
                true
            }
            None => false,
        }
    }

    /// Record a run that never became active
    pub fn push_history(&self, run: T) {
        self.history.lock().push(run);
    }

    /// Finished runs, newest first
    pub fn history(&self) -> Vec<T> {
        self.history.lock().to_vec()
    }

    pub fn recent_history(&self, n: usize) -> Vec<T> {
        self.history.lock().recent(n)
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }
}

impl<T: Clone> Default for RunStore<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::shared;
    use proptest::prelude::*;

    #[test]
    fn test_bounded_history_is_newest_first() {
        let mut history = BoundedHistory::new(3);
        for i in 0..5 {
            history.push(i);
        }
        assert_eq!(history.to_vec(), vec![4, 3, 2]);
        assert_eq!(history.recent(2), vec![4, 3]);
    }

    #[test]
    fn test_finalize_happens_once() {
        let store: RunStore<u32> = RunStore::new(10);
        store.insert_active("run-1", shared(7));

        assert!(store.finalize("run-1"));
        assert!(!store.finalize("run-1"));
        assert_eq!(store.history(), vec![7]);
        assert!(store.get_active("run-1").is_none());
    }

    #[test]
    fn test_history_keeps_finalized_snapshot() {
        let store: RunStore<u32> = RunStore::new(10);
        let run = shared(1);
        store.insert_active("run-1", run.clone());
        store.finalize("run-1");

        *run.write() = 2;
        assert_eq!(store.history(), vec![1]);
        assert_eq!(store.recent_history(5), vec![1]);
    }

    proptest! {
        #[test]
        fn prop_history_never_exceeds_limit(limit in 1usize..50, pushes in 0usize..200) {
            let mut history = BoundedHistory::new(limit);
            for i in 0..pushes {
                history.push(i);
            }
            prop_assert_eq!(history.len(), pushes.min(limit));
            if pushes > 0 {
                prop_assert_eq!(history.iter().next().copied(), Some(pushes - 1));
            }
        }
    }
}
