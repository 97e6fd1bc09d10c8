//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the engine, including:
//! - SQLite database initialization and schema management
//! - Resource records and their status
//! - Headings and links extracted by crawl tasks (replace-all per run)
//! - Read-side queries used for reporting

mod schema;
mod shared;
mod sqlite;
mod traits;

pub use shared::SharedStorage;
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::ResourceStatus;
use crate::{ProbeError, ResourceId};
use chrono::{SecondsFormat, Utc};
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(ProbeError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, ProbeError> {
    SqliteStorage::new(path)
}

/// Current time as a fixed-width RFC 3339 string, so stored timestamps sort lexically
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Represents a tracked resource (one crawled page) in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub id: ResourceId,
    pub user_id: i64,
    pub url: String,
    pub title: String,
    pub html_version: String,
    pub status: ResourceStatus,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A heading extracted from a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingRecord {
    pub id: i64,
    pub resource_id: ResourceId,
    /// Tag name, `h1` through `h6`
    pub tag: String,
    /// Trimmed, non-empty heading text
    pub text: String,
}

/// A heading to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHeading {
    pub resource_id: ResourceId,
    pub tag: String,
    pub text: String,
}

/// A link extracted from a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub id: i64,
    pub resource_id: ResourceId,
    /// Absolute resolved address (or the raw href when resolution failed)
    pub href: String,
    pub is_internal: bool,
    /// HTTP status code of the reachability check; 0 when no response was received
    pub status_code: u16,
    pub is_broken: bool,
}

/// A link to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLink {
    pub resource_id: ResourceId,
    pub href: String,
    pub is_internal: bool,
    pub status_code: u16,
    pub is_broken: bool,
}

/// Counts of internal and external links for a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkCounts {
    pub internal: u64,
    pub external: u64,
}

/// A broken link with the status code its check produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenLink {
    pub href: String,
    pub status_code: u16,
}
