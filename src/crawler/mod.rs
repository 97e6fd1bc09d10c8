//! Crawler module: the per-resource crawl task engine
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching and link reachability checks
//! - Markup version detection and HTML parsing
//! - The crawl worker pipeline for a single resource
//! - The task registry and the orchestrator for batch start/stop

mod fetcher;
mod link_checker;
mod orchestrator;
mod parser;
mod registry;
mod version;
mod worker;

pub use fetcher::{build_http_client, fetch_page, FetchedPage};
pub use link_checker::{check_link, LinkCheck};
pub use orchestrator::{
    Orchestrator, SkipReason, StartOutcome, StopOutcome, INTERRUPTED_MESSAGE,
};
pub use parser::{parse_html, ExtractedHeading, ParsedPage};
pub use registry::{TaskRegistry, TaskTicket};
pub use version::{detect_markup_version, MarkupVersion, VERSION_SNIFF_CHARS};
pub use worker::{CrawlReport, CrawlWorker};

use crate::{ProbeError, ResourceId};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Runs `fut` to completion unless `cancel` fires first
///
/// Cancellation wins when both are ready.
pub(crate) async fn cancellable<T, F>(
    cancel: &CancellationToken,
    resource_id: ResourceId,
    fut: F,
) -> Result<T, ProbeError>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProbeError::Cancelled { resource_id }),
        out = fut => Ok(out),
    }
}
