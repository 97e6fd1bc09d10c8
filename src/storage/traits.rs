//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::ResourceStatus;
use crate::storage::{
    BrokenLink, HeadingRecord, LinkCounts, LinkRecord, NewHeading, NewLink, ResourceRecord,
};
use crate::ResourceId;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(ResourceId),

    #[error("Invalid status value in database: {0}")]
    InvalidStatus(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines every persistence call the engine and the reporting
/// layer make. Implementations are shared between tasks through
/// [`SharedStorage`](crate::storage::SharedStorage), which serialises access.
pub trait Storage: Send {
    // ===== Resource Management =====

    /// Inserts a new resource in `Queued` status and returns its ID
    fn insert_resource(&mut self, user_id: i64, url: &str) -> StorageResult<ResourceId>;

    /// Gets a resource by ID
    ///
    /// Returns `StorageError::ResourceNotFound` if no such resource exists.
    fn get_resource(&self, id: ResourceId) -> StorageResult<ResourceRecord>;

    /// Lists all resources, most recently updated first
    fn list_all_resources(&self) -> StorageResult<Vec<ResourceRecord>>;

    /// Lists all resources currently in the given status
    fn list_resources_by_status(&self, status: ResourceStatus)
        -> StorageResult<Vec<ResourceRecord>>;

    /// Writes every mutable field of the record in one statement
    ///
    /// The `updated_at` column is set from the record.
    fn update_resource_full(&mut self, record: &ResourceRecord) -> StorageResult<()>;

    /// Updates the status and the update timestamp of a resource
    ///
    /// Any stored error message is cleared.
    fn update_status(&mut self, id: ResourceId, status: ResourceStatus) -> StorageResult<()>;

    /// Updates the status and error message of a resource
    fn update_status_with_error(
        &mut self,
        id: ResourceId,
        status: ResourceStatus,
        message: &str,
    ) -> StorageResult<()>;

    /// Deletes a resource together with its headings and links
    fn delete_resource(&mut self, id: ResourceId) -> StorageResult<()>;

    // ===== Heading Management =====

    /// Deletes all headings of a resource, returning how many were removed
    fn delete_headings(&mut self, resource_id: ResourceId) -> StorageResult<u64>;

    /// Inserts a heading and returns its row ID
    fn insert_heading(&mut self, heading: &NewHeading) -> StorageResult<i64>;

    /// Lists headings of a resource in insertion (document) order
    fn list_headings(&self, resource_id: ResourceId) -> StorageResult<Vec<HeadingRecord>>;

    // ===== Link Management =====

    /// Deletes all links of a resource, returning how many were removed
    fn delete_links(&mut self, resource_id: ResourceId) -> StorageResult<u64>;

    /// Inserts a link and returns its row ID
    fn insert_link(&mut self, link: &NewLink) -> StorageResult<i64>;

    /// Lists links of a resource in insertion (document) order
    fn list_links(&self, resource_id: ResourceId) -> StorageResult<Vec<LinkRecord>>;

    // ===== Statistics =====

    /// Counts internal and external links of a resource
    fn link_counts(&self, resource_id: ResourceId) -> StorageResult<LinkCounts>;

    /// Lists the broken links of a resource
    fn broken_links(&self, resource_id: ResourceId) -> StorageResult<Vec<BrokenLink>>;

    /// Counts resources in the given status
    fn count_resources_by_status(&self, status: ResourceStatus) -> StorageResult<u64>;
}
