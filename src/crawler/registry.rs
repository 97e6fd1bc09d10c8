//! Task registry
//!
//! Maps a resource id to the cancellation token of its in-flight crawl task.
//! Every registration carries a generation number, so a finished task can
//! tell whether it still owns the slot it was started in.

use crate::ResourceId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
struct TaskEntry {
    generation: u64,
    token: CancellationToken,
}

/// Handle given to an accepted task
#[derive(Debug, Clone)]
pub struct TaskTicket {
    pub resource_id: ResourceId,
    pub generation: u64,
    pub token: CancellationToken,
}

/// Concurrency-safe directory of running crawl tasks
#[derive(Debug, Default)]
pub struct TaskRegistry {
    entries: DashMap<ResourceId, TaskEntry>,
    next_generation: AtomicU64,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Registers a new task for `id` unless one is already registered
    ///
    /// The check and the insert happen under one shard lock, so two
    /// concurrent callers can never both succeed for the same id.
    ///
    /// # Returns
    ///
    /// * `Some(TaskTicket)` - The caller owns the new registration
    /// * `None` - A task is already registered for `id`
    pub fn try_register(&self, id: ResourceId) -> Option<TaskTicket> {
        match self.entries.entry(id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                let entry = TaskEntry {
                    generation: self.fresh_generation(),
                    token: CancellationToken::new(),
                };
                let ticket = TaskTicket {
                    resource_id: id,
                    generation: entry.generation,
                    token: entry.token.clone(),
                };
                vacant.insert(entry);
                Some(ticket)
            }
        }
    }

    /// Registers `token` for `id`, replacing any previous registration
    ///
    /// The replaced task loses ownership; its token is left untouched.
    pub fn register(&self, id: ResourceId, token: CancellationToken) -> TaskTicket {
        let generation = self.fresh_generation();
        self.entries.insert(
            id,
            TaskEntry {
                generation,
                token: token.clone(),
            },
        );
        TaskTicket {
            resource_id: id,
            generation,
            token,
        }
    }

    /// Removes the registration for `id` without cancelling it
    pub fn unregister(&self, id: ResourceId) {
        self.entries.remove(&id);
    }

    pub fn lookup(&self, id: ResourceId) -> Option<CancellationToken> {
        self.entries.get(&id).map(|entry| entry.token.clone())
    }

    /// Removes the registration for `id` and cancels its token
    ///
    /// Returns false when nothing was registered, including when another
    /// caller cancelled the same task first.
    pub fn cancel(&self, id: ResourceId) -> bool {
        match self.entries.remove(&id) {
            Some((_, entry)) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Removes the registration for `id` if it still belongs to `generation`
    ///
    /// A task calls this before writing its terminal status. False means the
    /// task was cancelled or superseded and must not write.
    pub fn release(&self, id: ResourceId, generation: u64) -> bool {
        self.entries
            .remove_if(&id, |_, entry| entry.generation == generation)
            .is_some()
    }

    pub fn is_owner(&self, id: ResourceId, generation: u64) -> bool {
        self.entries
            .get(&id)
            .map(|entry| entry.generation == generation)
            .unwrap_or(false)
    }

    /// Ids with a registered task, in ascending order
    pub fn active_ids(&self) -> Vec<ResourceId> {
        let mut ids: Vec<ResourceId> = self.entries.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
