//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::ResourceStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    now_timestamp, BrokenLink, HeadingRecord, LinkCounts, LinkRecord, NewHeading, NewLink,
    ResourceRecord,
};
use crate::{ProbeError, ResourceId};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RESOURCE_COLUMNS: &str =
    "id, user_id, url, title, html_version, status, error_message, created_at, updated_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path` and initializes its schema
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(ProbeError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, ProbeError> {
        let conn = Connection::open(path).map_err(StorageError::from)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )
        .map_err(StorageError::from)?;

        initialize_schema(&conn).map_err(StorageError::from)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> Result<Self, ProbeError> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(StorageError::from)?;
        initialize_schema(&conn).map_err(StorageError::from)?;
        Ok(Self { conn })
    }

    fn query_resources(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> StorageResult<Vec<ResourceRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let resources = stmt
            .query_map(params, resource_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(resources)
    }
}

fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<ResourceRecord> {
    let status_str: String = row.get(5)?;
    let status = ResourceStatus::from_db_string(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            Type::Text,
            Box::new(StorageError::InvalidStatus(status_str.clone())),
        )
    })?;

    Ok(ResourceRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        url: row.get(2)?,
        title: row.get(3)?,
        html_version: row.get(4)?,
        status,
        error_message: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn ensure_updated(changed: usize, id: ResourceId) -> StorageResult<()> {
    if changed == 0 {
        return Err(StorageError::ResourceNotFound(id));
    }
    Ok(())
}

impl Storage for SqliteStorage {
    // ===== Resource Management =====

    fn insert_resource(&mut self, user_id: i64, url: &str) -> StorageResult<ResourceId> {
        let now = now_timestamp();
        self.conn.execute(
            "INSERT INTO resources (user_id, url, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![user_id, url, ResourceStatus::Queued.to_db_string(), now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_resource(&self, id: ResourceId) -> StorageResult<ResourceRecord> {
        let sql = format!("SELECT {} FROM resources WHERE id = ?1", RESOURCE_COLUMNS);
        self.conn
            .query_row(&sql, params![id], resource_from_row)
            .optional()?
            .ok_or(StorageError::ResourceNotFound(id))
    }

    fn list_all_resources(&self) -> StorageResult<Vec<ResourceRecord>> {
        let sql = format!(
            "SELECT {} FROM resources ORDER BY updated_at DESC, id DESC",
            RESOURCE_COLUMNS
        );
        self.query_resources(&sql, [])
    }

    fn list_resources_by_status(
        &self,
        status: ResourceStatus,
    ) -> StorageResult<Vec<ResourceRecord>> {
        let sql = format!(
            "SELECT {} FROM resources WHERE status = ?1 ORDER BY id",
            RESOURCE_COLUMNS
        );
        self.query_resources(&sql, params![status.to_db_string()])
    }

    fn update_resource_full(&mut self, record: &ResourceRecord) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE resources SET user_id = ?1, url = ?2, title = ?3, html_version = ?4,
             status = ?5, error_message = ?6, updated_at = ?7 WHERE id = ?8",
            params![
                record.user_id,
                record.url,
                record.title,
                record.html_version,
                record.status.to_db_string(),
                record.error_message,
                record.updated_at,
                record.id
            ],
        )?;
        ensure_updated(changed, record.id)
    }

    fn update_status(&mut self, id: ResourceId, status: ResourceStatus) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE resources SET status = ?1, error_message = NULL, updated_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now_timestamp(), id],
        )?;
        ensure_updated(changed, id)
    }

    fn update_status_with_error(
        &mut self,
        id: ResourceId,
        status: ResourceStatus,
        message: &str,
    ) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE resources SET status = ?1, error_message = ?2, updated_at = ?3 WHERE id = ?4",
            params![status.to_db_string(), message, now_timestamp(), id],
        )?;
        ensure_updated(changed, id)
    }

    fn delete_resource(&mut self, id: ResourceId) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM headings WHERE resource_id = ?1", params![id])?;
        tx.execute("DELETE FROM links WHERE resource_id = ?1", params![id])?;
        let changed = tx.execute("DELETE FROM resources WHERE id = ?1", params![id])?;
        ensure_updated(changed, id)?;
        tx.commit()?;
        Ok(())
    }

    // ===== Heading Management =====

    fn delete_headings(&mut self, resource_id: ResourceId) -> StorageResult<u64> {
        let removed = self.conn.execute(
            "DELETE FROM headings WHERE resource_id = ?1",
            params![resource_id],
        )?;
        Ok(removed as u64)
    }

    fn insert_heading(&mut self, heading: &NewHeading) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO headings (resource_id, tag, text) VALUES (?1, ?2, ?3)",
            params![heading.resource_id, heading.tag, heading.text],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_headings(&self, resource_id: ResourceId) -> StorageResult<Vec<HeadingRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, resource_id, tag, text FROM headings WHERE resource_id = ?1 ORDER BY id",
        )?;

        let headings = stmt
            .query_map(params![resource_id], |row| {
                Ok(HeadingRecord {
                    id: row.get(0)?,
                    resource_id: row.get(1)?,
                    tag: row.get(2)?,
                    text: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(headings)
    }

    // ===== Link Management =====

    fn delete_links(&mut self, resource_id: ResourceId) -> StorageResult<u64> {
        let removed = self.conn.execute(
            "DELETE FROM links WHERE resource_id = ?1",
            params![resource_id],
        )?;
        Ok(removed as u64)
    }

    fn insert_link(&mut self, link: &NewLink) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO links (resource_id, href, is_internal, status_code, is_broken)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                link.resource_id,
                link.href,
                link.is_internal,
                link.status_code,
                link.is_broken
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_links(&self, resource_id: ResourceId) -> StorageResult<Vec<LinkRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, resource_id, href, is_internal, status_code, is_broken
             FROM links WHERE resource_id = ?1 ORDER BY id",
        )?;

        let links = stmt
            .query_map(params![resource_id], |row| {
                Ok(LinkRecord {
                    id: row.get(0)?,
                    resource_id: row.get(1)?,
                    href: row.get(2)?,
                    is_internal: row.get(3)?,
                    status_code: row.get(4)?,
                    is_broken: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(links)
    }

    // ===== Statistics =====

    fn link_counts(&self, resource_id: ResourceId) -> StorageResult<LinkCounts> {
        let (internal, external): (i64, i64) = self.conn.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN is_internal = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN is_internal = 0 THEN 1 ELSE 0 END), 0)
             FROM links WHERE resource_id = ?1",
            params![resource_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(LinkCounts {
            internal: internal as u64,
            external: external as u64,
        })
    }

    fn broken_links(&self, resource_id: ResourceId) -> StorageResult<Vec<BrokenLink>> {
        let mut stmt = self.conn.prepare(
            "SELECT href, status_code FROM links
             WHERE resource_id = ?1 AND is_broken = 1 ORDER BY id",
        )?;

        let links = stmt
            .query_map(params![resource_id], |row| {
                Ok(BrokenLink {
                    href: row.get(0)?,
                    status_code: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(links)
    }

    fn count_resources_by_status(&self, status: ResourceStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM resources WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
