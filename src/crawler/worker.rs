//! Crawl worker
//!
//! Runs the pipeline for one resource: load the record, fetch the page,
//! detect the markup version, parse, replace stored headings and links, check
//! every link, then write the terminal status.
//!
//! The terminal write is guarded by the registry: a task first releases its
//! own registration and writes only if that succeeds. A task that was stopped
//! (or superseded by a newer registration) leaves the status to whoever
//! removed it.

use crate::crawler::fetcher::fetch_page;
use crate::crawler::link_checker::check_link;
use crate::crawler::parser::parse_html;
use crate::crawler::registry::{TaskRegistry, TaskTicket};
use crate::crawler::version::detect_markup_version;
use crate::state::{ResourceStatus, TaskStage};
use crate::storage::{now_timestamp, NewHeading, NewLink, ResourceRecord, SharedStorage, Storage};
use crate::url::resolve_href;
use crate::{ProbeError, ResourceId};
use reqwest::Client;
use std::sync::Arc;
use url::Url;

/// Summary of a completed crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub resource_id: ResourceId,
    pub title: String,
    pub html_version: String,
    pub headings_saved: usize,
    pub links_saved: usize,
    /// Saved links flagged as broken
    pub broken_links: usize,
    /// One message per heading or link row that could not be inserted
    pub insert_failures: Vec<String>,
}

/// Executes crawl tasks against a shared storage backend
pub struct CrawlWorker<S> {
    storage: SharedStorage<S>,
    client: Client,
    registry: Arc<TaskRegistry>,
}

impl<S> Clone for CrawlWorker<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            client: self.client.clone(),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<S: Storage> CrawlWorker<S> {
    pub fn new(storage: SharedStorage<S>, client: Client, registry: Arc<TaskRegistry>) -> Self {
        Self {
            storage,
            client,
            registry,
        }
    }

    /// Runs the full pipeline for the ticket's resource and writes its
    /// terminal status
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The crawl succeeded and `Done` was written
    /// * `Err(ProbeError)` - The crawl failed or was cancelled
    pub async fn run(&self, ticket: &TaskTicket) -> Result<CrawlReport, ProbeError> {
        let (stage, outcome) = self.crawl(ticket).await;
        self.finish(ticket, stage, outcome).1
    }

    /// Runs the pipeline without writing a terminal status
    ///
    /// Returns the last stage reached alongside the outcome.
    async fn crawl(&self, ticket: &TaskTicket) -> (TaskStage, Result<(ResourceRecord, CrawlReport), ProbeError>) {
        let mut stage = TaskStage::Started;
        let result = self.crawl_stages(ticket, &mut stage).await;
        if let Err(e) = &result {
            tracing::debug!(
                resource_id = ticket.resource_id,
                stage = %stage,
                "Crawl aborted: {}",
                e
            );
        }
        (stage, result)
    }

    async fn crawl_stages(
        &self,
        ticket: &TaskTicket,
        stage: &mut TaskStage,
    ) -> Result<(ResourceRecord, CrawlReport), ProbeError> {
        let id = ticket.resource_id;
        let cancel = &ticket.token;

        let record = self.storage.with(|s| s.get_resource(id))?;
        tracing::info!(resource_id = id, generation = ticket.generation, url = %record.url, "Crawl started");

        advance(stage, TaskStage::Fetching, id);
        let page = fetch_page(&self.client, &record.url, id, cancel).await?;
        tracing::debug!(
            resource_id = id,
            "Fetched {} with status {}",
            page.final_url,
            page.status_code
        );

        advance(stage, TaskStage::Parsing, id);
        let version = detect_markup_version(&page.body);
        let page_url = Url::parse(&record.url)?;
        let parsed = parse_html(&page.body, &record.url)?;

        let mut report = CrawlReport {
            resource_id: id,
            title: parsed.title.clone(),
            html_version: version.label().to_string(),
            ..CrawlReport::default()
        };

        advance(stage, TaskStage::Extracting, id);
        let (old_headings, old_links) = self.storage.with(|s| {
            let headings = s.delete_headings(id)?;
            let links = s.delete_links(id)?;
            Ok((headings, links))
        })?;
        tracing::debug!(
            resource_id = id,
            "Removed {} headings and {} links from the previous run",
            old_headings,
            old_links
        );

        for heading in &parsed.headings {
            let row = NewHeading {
                resource_id: id,
                tag: heading.tag.clone(),
                text: heading.text.clone(),
            };
            match self.storage.with(|s| s.insert_heading(&row)) {
                Ok(_) => report.headings_saved += 1,
                Err(e) => {
                    tracing::warn!(resource_id = id, "Failed to save heading {}: {}", row.tag, e);
                    report
                        .insert_failures
                        .push(format!("heading {} {:?}: {}", row.tag, row.text, e));
                }
            }
        }

        for href in &parsed.hrefs {
            let link = resolve_href(&page_url, href);
            let check = check_link(&self.client, &link, id, cancel).await?;
            if cancel.is_cancelled() {
                return Err(ProbeError::Cancelled { resource_id: id });
            }
            tracing::debug!(
                resource_id = id,
                "Link {} internal={} status={} broken={}",
                link.address,
                link.is_internal,
                check.status_code,
                check.is_broken
            );

            let row = NewLink {
                resource_id: id,
                href: link.address,
                is_internal: link.is_internal,
                status_code: check.status_code,
                is_broken: check.is_broken,
            };
            match self.storage.with(|s| s.insert_link(&row)) {
                Ok(_) => {
                    report.links_saved += 1;
                    if row.is_broken {
                        report.broken_links += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(resource_id = id, "Failed to save link {}: {}", row.href, e);
                    report
                        .insert_failures
                        .push(format!("link {}: {}", row.href, e));
                }
            }
        }

        advance(stage, TaskStage::Persisting, id);
        let finished = ResourceRecord {
            title: report.title.clone(),
            html_version: report.html_version.clone(),
            status: ResourceStatus::Done,
            error_message: None,
            updated_at: now_timestamp(),
            ..record
        };
        Ok((finished, report))
    }

    /// Writes the terminal status for a task that has stopped running
    ///
    /// `stage` is the last stage the pipeline reached. The returned stage is
    /// `Done` or `Error` once a terminal status was written. A cancelled or
    /// superseded task keeps the stage it was interrupted in; its resource
    /// ends `Stopped` instead.
    pub(crate) fn finish(
        &self,
        ticket: &TaskTicket,
        mut stage: TaskStage,
        outcome: Result<(ResourceRecord, CrawlReport), ProbeError>,
    ) -> (TaskStage, Result<CrawlReport, ProbeError>) {
        let id = ticket.resource_id;

        if !self.registry.release(id, ticket.generation) {
            tracing::debug!(
                resource_id = id,
                generation = ticket.generation,
                "Task no longer owns its slot, leaving status untouched"
            );
            let result = match outcome {
                Ok(_) => Err(ProbeError::Cancelled { resource_id: id }),
                Err(e) => Err(e),
            };
            return (stage, result);
        }

        let result = match outcome {
            Ok((record, report)) => match self.storage.with(|s| s.update_resource_full(&record)) {
                Ok(()) => {
                    advance(&mut stage, TaskStage::Done, id);
                    tracing::info!(
                        resource_id = id,
                        "Crawl done: {} headings, {} links ({} broken), {} insert failures",
                        report.headings_saved,
                        report.links_saved,
                        report.broken_links,
                        report.insert_failures.len()
                    );
                    Ok(report)
                }
                Err(e) => {
                    let e = ProbeError::from(e);
                    advance(&mut stage, TaskStage::Error, id);
                    self.write_error(id, &e);
                    Err(e)
                }
            },
            Err(e) if e.is_cancelled() => {
                tracing::info!(resource_id = id, "Crawl cancelled");
                if let Err(write_err) = self
                    .storage
                    .with(|s| s.update_status(id, ResourceStatus::Stopped))
                {
                    tracing::error!(resource_id = id, "Failed to mark as stopped: {}", write_err);
                }
                Err(e)
            }
            Err(e) => {
                advance(&mut stage, TaskStage::Error, id);
                self.write_error(id, &e);
                Err(e)
            }
        };
        (stage, result)
    }

    fn write_error(&self, id: ResourceId, e: &ProbeError) {
        tracing::error!(resource_id = id, "Crawl failed: {}", e);
        let message = e.to_string();
        if let Err(write_err) = self
            .storage
            .with(|s| s.update_status_with_error(id, ResourceStatus::Error, &message))
        {
            tracing::error!(resource_id = id, "Failed to record error status: {}", write_err);
        }
    }
}

fn advance(stage: &mut TaskStage, to: TaskStage, resource_id: ResourceId) {
    debug_assert!(stage.can_transition_to(to), "{} -> {}", stage, to);
    tracing::trace!(resource_id, "Stage {} -> {}", stage, to);
    *stage = to;
}
