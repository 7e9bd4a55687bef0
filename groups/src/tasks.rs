//! Named registry of deferred tasks.
//!
//! A name is either absent (idle) or bound to one spawned task (scheduled).
//! Binding a name is an atomic check-and-set, so concurrent schedulers can
//! never start two tasks under the same name.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a live task is registered under `name`.
    pub fn is_pending(&self, name: &str) -> bool {
        self.tasks()
            .get(name)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Spawn and register a task under `name` unless a live one already
    /// exists. Returns `true` if `spawn` was called.
    ///
    /// `spawn` runs while the registry lock is held; the spawned task must not
    /// need the registry before its first await point.
    pub fn register_if_absent<F>(&self, name: &str, spawn: F) -> bool
    where
        F: FnOnce() -> JoinHandle<()>,
    {
        let mut tasks = self.tasks();
        if tasks.get(name).is_some_and(|handle| !handle.is_finished()) {
            return false;
        }
        tasks.insert(name.to_string(), spawn());
        true
    }

    /// Forget the task under `name` without aborting it. Called by the task
    /// itself once it fires.
    pub fn remove(&self, name: &str) {
        self.tasks().remove(name);
    }

    /// Abort and forget the task under `name`. Returns `true` if one was
    /// pending.
    pub fn cancel(&self, name: &str) -> bool {
        match self.tasks().remove(name) {
            Some(handle) => {
                let live = !handle.is_finished();
                handle.abort();
                live
            }
            None => false,
        }
    }

    /// Names of all live tasks.
    pub fn names(&self) -> Vec<String> {
        self.tasks()
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(name, _)| name.clone())
            .collect()
    }
}
