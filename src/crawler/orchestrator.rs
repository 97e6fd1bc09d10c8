//! Orchestrator for batch start/stop requests
//!
//! Accepting a resource is a single atomic registry insert, so at most one
//! task per resource is ever running. Accepted tasks are spawned at once but
//! wait for one of `max-concurrent-tasks` permits before doing any work.

use crate::config::Config;
use crate::crawler::build_http_client;
use crate::crawler::registry::{TaskRegistry, TaskTicket};
use crate::crawler::worker::CrawlWorker;
use crate::state::{ResourceStatus, TaskStage};
use crate::storage::{SharedStorage, Storage, StorageError};
use crate::{ProbeError, ResourceId};
use reqwest::Client;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;

/// Message stored on resources found in `Processing` with no running task
pub const INTERRUPTED_MESSAGE: &str = "interrupted before completion";

/// Why a batch item was not acted on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotFound,
    AlreadyProcessing,
    AlreadyBeingProcessed,
    NotInProcessingState,
    TaskNotFound,
    StatusUpdateFailed,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::AlreadyProcessing => "already processing",
            Self::AlreadyBeingProcessed => "already being processed",
            Self::NotInProcessingState => "not in processing state",
            Self::TaskNotFound => "task not found or already stopped",
            Self::StatusUpdateFailed => "failed to update status",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a start request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOutcome {
    pub started: Vec<ResourceId>,
    pub skipped: BTreeMap<ResourceId, SkipReason>,
}

/// Result of a stop request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopOutcome {
    pub stopped: Vec<ResourceId>,
    pub skipped: BTreeMap<ResourceId, SkipReason>,
}

/// Accepts batch requests and runs crawl tasks
pub struct Orchestrator<S> {
    storage: SharedStorage<S>,
    registry: Arc<TaskRegistry>,
    worker: CrawlWorker<S>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
}

impl<S: Storage + 'static> Orchestrator<S> {
    /// Creates an orchestrator with an HTTP client built from `config`
    pub fn new(storage: SharedStorage<S>, config: &Config) -> Result<Self, ProbeError> {
        let client = build_http_client(&config.http)?;
        Ok(Self::with_client(
            storage,
            client,
            config.engine.max_concurrent_tasks as usize,
        ))
    }

    /// Creates an orchestrator around an existing client
    ///
    /// `max_concurrent_tasks` is raised to 1 if zero.
    pub fn with_client(storage: SharedStorage<S>, client: Client, max_concurrent_tasks: usize) -> Self {
        let registry = Arc::new(TaskRegistry::new());
        let worker = CrawlWorker::new(storage.clone(), client, Arc::clone(&registry));
        Self {
            storage,
            registry,
            worker,
            permits: Arc::new(Semaphore::new(max_concurrent_tasks.max(1))),
            tracker: TaskTracker::new(),
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn storage(&self) -> &SharedStorage<S> {
        &self.storage
    }

    /// Ids with a running or queued task
    pub fn active_tasks(&self) -> Vec<ResourceId> {
        self.registry.active_ids()
    }

    /// Starts a crawl task for each id that is not already running
    ///
    /// Must be called from within a Tokio runtime. Each id is handled on its
    /// own; a skipped id never affects the others.
    pub fn start_batch(&self, ids: &[ResourceId]) -> StartOutcome {
        let mut outcome = StartOutcome::default();

        for &id in ids {
            match self.start_one(id) {
                Ok(()) => outcome.started.push(id),
                Err(reason) => {
                    tracing::debug!(resource_id = id, "Start skipped: {}", reason);
                    outcome.skipped.insert(id, reason);
                }
            }
        }

        tracing::info!(
            "Start batch: {} started, {} skipped",
            outcome.started.len(),
            outcome.skipped.len()
        );
        outcome
    }

    fn start_one(&self, id: ResourceId) -> Result<(), SkipReason> {
        let status = self.current_status(id)?;
        if !status.is_startable() {
            return Err(SkipReason::AlreadyProcessing);
        }

        let ticket = self
            .registry
            .try_register(id)
            .ok_or(SkipReason::AlreadyBeingProcessed)?;

        if let Err(e) = self
            .storage
            .with(|s| s.update_status(id, ResourceStatus::Processing))
        {
            tracing::warn!(resource_id = id, "Failed to mark as processing: {}", e);
            self.registry.release(id, ticket.generation);
            return Err(SkipReason::StatusUpdateFailed);
        }

        self.spawn(ticket);
        Ok(())
    }

    fn spawn(&self, ticket: TaskTicket) {
        let worker = self.worker.clone();
        let permits = Arc::clone(&self.permits);

        self.tracker.spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = ticket.token.cancelled() => None,
                permit = permits.acquire_owned() => permit.ok(),
            };

            let Some(_permit) = permit else {
                tracing::debug!(resource_id = ticket.resource_id, "Task cancelled while queued");
                let cancelled = ProbeError::Cancelled {
                    resource_id: ticket.resource_id,
                };
                if let (_, Err(e)) = worker.finish(&ticket, TaskStage::Started, Err(cancelled)) {
                    tracing::trace!(resource_id = ticket.resource_id, "{}", e);
                }
                return;
            };

            if let Err(e) = worker.run(&ticket).await {
                tracing::trace!(resource_id = ticket.resource_id, "Task ended: {}", e);
            }
        });
    }

    /// Cancels the running task of each id and marks it `Stopped`
    pub fn stop_batch(&self, ids: &[ResourceId]) -> StopOutcome {
        let mut outcome = StopOutcome::default();

        for &id in ids {
            match self.stop_one(id) {
                Ok(()) => outcome.stopped.push(id),
                Err(reason) => {
                    tracing::debug!(resource_id = id, "Stop skipped: {}", reason);
                    outcome.skipped.insert(id, reason);
                }
            }
        }

        tracing::info!(
            "Stop batch: {} stopped, {} skipped",
            outcome.stopped.len(),
            outcome.skipped.len()
        );
        outcome
    }

    fn stop_one(&self, id: ResourceId) -> Result<(), SkipReason> {
        if self.current_status(id)? != ResourceStatus::Processing {
            return Err(SkipReason::NotInProcessingState);
        }

        if !self.registry.cancel(id) {
            return Err(SkipReason::TaskNotFound);
        }

        // The task has lost its registration and will not write; this is the
        // only terminal write for it.
        if let Err(e) = self
            .storage
            .with(|s| s.update_status(id, ResourceStatus::Stopped))
        {
            tracing::error!(resource_id = id, "Failed to mark as stopped: {}", e);
        }
        Ok(())
    }

    /// Stops every task currently registered
    pub fn stop_all(&self) -> StopOutcome {
        self.stop_batch(&self.registry.active_ids())
    }

    /// Waits until every spawned task has written its terminal status
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Marks resources left in `Processing` by a previous process as `Error`
    ///
    /// Resources with a task registered in this orchestrator are left alone.
    ///
    /// # Returns
    ///
    /// The ids that were marked
    pub fn recover_interrupted(&self) -> Result<Vec<ResourceId>, ProbeError> {
        let stale = self
            .storage
            .with(|s| s.list_resources_by_status(ResourceStatus::Processing))?;

        let mut recovered = Vec::new();
        for record in stale {
            if self.registry.lookup(record.id).is_some() {
                continue;
            }
            self.storage.with(|s| {
                s.update_status_with_error(record.id, ResourceStatus::Error, INTERRUPTED_MESSAGE)
            })?;
            recovered.push(record.id);
        }

        if !recovered.is_empty() {
            tracing::info!("Marked {} interrupted resources as failed", recovered.len());
        }
        Ok(recovered)
    }

    fn current_status(&self, id: ResourceId) -> Result<ResourceStatus, SkipReason> {
        match self.storage.with(|s| s.get_resource(id)) {
            Ok(record) => Ok(record.status),
            Err(StorageError::ResourceNotFound(_)) => Err(SkipReason::NotFound),
            Err(e) => {
                tracing::warn!(resource_id = id, "Failed to load resource: {}", e);
                Err(SkipReason::NotFound)
            }
        }
    }
}
