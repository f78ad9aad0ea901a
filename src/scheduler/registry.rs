/*!
 * Execution Registry
 * At most one run per process id; later runs wait for the slot to clear
 */

use crate::core::id::{ProcessIdentity, ProcessKey};
use crate::process::ProcessTask;
use ahash::AHashMap;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
pub(crate) struct ExecutionRegistry {
    runs: Mutex<AHashMap<ProcessKey, Arc<ProcessTask>>>,
    released: Condvar,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the run, waiting while another run of the same id is registered
    pub fn acquire(&self, task: &Arc<ProcessTask>) {
        let key = task.process_key();
        let mut runs = self.runs.lock();
        while runs.contains_key(&key) {
            self.released.wait(&mut runs);
        }
        runs.insert(key, task.clone());
    }

    /// Clear the slot if it still belongs to `task`
    pub fn release(&self, task: &Arc<ProcessTask>) {
        let key = task.process_key();
        let mut runs = self.runs.lock();
        if runs.get(&key).is_some_and(|held| Arc::ptr_eq(held, task)) {
            runs.remove(&key);
        }
        drop(runs);
        self.released.notify_all();
    }

    pub fn contains(&self, key: &ProcessKey) -> bool {
        self.runs.lock().contains_key(key)
    }

    pub fn running(&self, key: &ProcessKey) -> Option<Arc<ProcessTask>> {
        self.runs.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.runs.lock().len()
    }

    pub fn clear(&self) {
        self.runs.lock().clear();
        self.released.notify_all();
    }

    /// Wait up to `timeout` for the id's slot to clear. True when it is free.
    pub fn wait_released(&self, key: &ProcessKey, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut runs = self.runs.lock();
        while runs.contains_key(key) {
            if self.released.wait_until(&mut runs, deadline).timed_out() {
                return !runs.contains_key(key);
            }
        }
        true
    }
}
