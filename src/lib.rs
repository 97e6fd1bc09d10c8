//! Siteprobe: a per-resource crawl task engine
//!
//! This crate fetches tracked web pages, detects their markup version, extracts
//! headings and links, checks every link for reachability and persists the
//! results. Each page is crawled by its own cancellable task; an orchestrator
//! accepts batch start/stop requests and keeps at most one task per page.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Identifier of a tracked resource (one crawled page)
pub type ResourceId = i64;

/// Main error type for Siteprobe operations
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("failed to fetch {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("task for resource {resource_id} was cancelled")]
    Cancelled { resource_id: ResourceId },

    #[error("resource {0} not found")]
    ResourceNotFound(ResourceId),

    #[error("failed to parse HTML for {url}: {message}")]
    HtmlParse { url: String, message: String },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),
}

impl ProbeError {
    /// Returns true if this error was caused by task cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL: {0}")]
    MissingHost(String),
}

/// Result type alias for Siteprobe operations
pub type Result<T> = std::result::Result<T, ProbeError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlReport, Orchestrator, StartOutcome, StopOutcome, TaskRegistry};
pub use state::{ResourceStatus, TaskStage};
pub use storage::{SharedStorage, SqliteStorage, Storage};
