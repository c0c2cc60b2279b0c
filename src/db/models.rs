// src/db/models.rs

//! Data models for the local backend database
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for creating, reading, and updating records.

use crate::error::Result;
use crate::packages::models::Metadata;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// Convert a JSON column into a conversion error rusqlite understands
fn json_column_error(index: usize, err: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(err))
}

/// One pushed revision of a package
#[derive(Debug, Clone, PartialEq)]
pub struct PackageRevision {
    pub id: Option<i64>,
    pub registry: String,
    pub name: String,
    pub top_hash: String,
    pub message: Option<String>,
    pub metadata: Metadata,
    pub copied: bool,
    pub created_at: String,
}

const REVISION_COLUMNS: &str =
    "id, registry, name, top_hash, message, metadata, copied, created_at";

impl PackageRevision {
    /// Create a new, not yet stored revision
    pub fn new(registry: String, name: String, top_hash: String, created_at: String) -> Self {
        Self {
            id: None,
            registry,
            name,
            top_hash,
            message: None,
            metadata: Metadata::new(),
            copied: false,
            created_at,
        }
    }

    /// Store this revision, or refresh the existing row with the same top hash
    ///
    /// Returns the row id and whether the row was newly created.
    pub fn upsert(&mut self, conn: &Connection) -> Result<(i64, bool)> {
        let metadata = serde_json::to_string(&self.metadata)?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM package_revisions WHERE registry = ?1 AND name = ?2 AND top_hash = ?3",
                params![&self.registry, &self.name, &self.top_hash],
                |row| row.get(0),
            )
            .optional()?;

        let (id, created) = match existing {
            Some(id) => {
                conn.execute(
                    "UPDATE package_revisions SET message = ?1, copied = ?2, created_at = ?3 WHERE id = ?4",
                    params![&self.message, self.copied, &self.created_at, id],
                )?;
                (id, false)
            }
            None => {
                conn.execute(
                    "INSERT INTO package_revisions (registry, name, top_hash, message, metadata, copied, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        &self.registry,
                        &self.name,
                        &self.top_hash,
                        &self.message,
                        metadata,
                        self.copied,
                        &self.created_at,
                    ],
                )?;
                (conn.last_insert_rowid(), true)
            }
        };

        self.id = Some(id);
        Ok((id, created))
    }

    /// Most recently pushed revision of a package
    pub fn find_latest(conn: &Connection, registry: &str, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM package_revisions WHERE registry = ?1 AND name = ?2
             ORDER BY created_at DESC, id DESC LIMIT 1",
            REVISION_COLUMNS
        ))?;

        let revision = stmt
            .query_row(params![registry, name], Self::from_row)
            .optional()?;

        Ok(revision)
    }

    /// Find a revision by its top hash
    pub fn find_by_hash(
        conn: &Connection,
        registry: &str,
        name: &str,
        top_hash: &str,
    ) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM package_revisions WHERE registry = ?1 AND name = ?2 AND top_hash = ?3",
            REVISION_COLUMNS
        ))?;

        let revision = stmt
            .query_row(params![registry, name, top_hash], Self::from_row)
            .optional()?;

        Ok(revision)
    }

    /// Latest revision of every package whose name contains `pattern`
    pub fn search_latest(conn: &Connection, registry: &str, pattern: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM package_revisions r
             WHERE r.registry = ?1 AND instr(lower(r.name), lower(?2)) > 0
               AND r.id = (
                   SELECT id FROM package_revisions
                   WHERE registry = r.registry AND name = r.name
                   ORDER BY created_at DESC, id DESC LIMIT 1
               )
             ORDER BY r.name",
            REVISION_COLUMNS
        ))?;

        let revisions = stmt
            .query_map(params![registry, pattern], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(revisions)
    }

    /// Distinct registries holding at least one revision
    pub fn list_registries(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt =
            conn.prepare("SELECT DISTINCT registry FROM package_revisions ORDER BY registry")?;

        let registries = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(registries)
    }

    /// Convert a database row to a PackageRevision
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let metadata_json: String = row.get(5)?;
        let metadata: Metadata =
            serde_json::from_str(&metadata_json).map_err(|e| json_column_error(5, e))?;

        Ok(Self {
            id: Some(row.get(0)?),
            registry: row.get(1)?,
            name: row.get(2)?,
            top_hash: row.get(3)?,
            message: row.get(4)?,
            metadata,
            copied: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

/// A stored entry of one revision
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub id: Option<i64>,
    pub revision_id: i64,
    pub logical_key: String,
    pub physical_key: String,
    pub hash: Option<String>,
    pub size: Option<i64>,
    pub meta: Option<Metadata>,
}

impl StoredEntry {
    pub fn new(revision_id: i64, logical_key: String, physical_key: String) -> Self {
        Self {
            id: None,
            revision_id,
            logical_key,
            physical_key,
            hash: None,
            size: None,
            meta: None,
        }
    }

    /// Insert this entry into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        let meta = self.meta.as_ref().map(serde_json::to_string).transpose()?;

        conn.execute(
            "INSERT INTO package_entries (revision_id, logical_key, physical_key, hash, size, meta)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.revision_id,
                &self.logical_key,
                &self.physical_key,
                &self.hash,
                &self.size,
                meta,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// All entries of a revision, ordered by logical key
    pub fn find_by_revision(conn: &Connection, revision_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, revision_id, logical_key, physical_key, hash, size, meta
             FROM package_entries WHERE revision_id = ?1 ORDER BY logical_key",
        )?;

        let entries = stmt
            .query_map([revision_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let meta_json: Option<String> = row.get(6)?;
        let meta = meta_json
            .map(|json| serde_json::from_str::<Metadata>(&json))
            .transpose()
            .map_err(|e| json_column_error(6, e))?;

        Ok(Self {
            id: Some(row.get(0)?),
            revision_id: row.get(1)?,
            logical_key: row.get(2)?,
            physical_key: row.get(3)?,
            hash: row.get(4)?,
            size: row.get(5)?,
            meta,
        })
    }
}

/// Persisted key/value settings
pub struct Setting;

impl Setting {
    pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
        let value = conn
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        schema::migrate(&conn).unwrap();
        conn
    }

    fn revision(name: &str, top_hash: &str, created_at: &str) -> PackageRevision {
        PackageRevision::new(
            "s3://reg".to_string(),
            name.to_string(),
            top_hash.to_string(),
            created_at.to_string(),
        )
    }

    #[test]
    fn test_revision_upsert_and_find() {
        let conn = create_test_db();

        let mut rev = revision("team/data", "h1", "2026-01-01T00:00:00.000000Z");
        rev.metadata.insert("owner".to_string(), "ana".into());
        let (id, created) = rev.upsert(&conn).unwrap();
        assert!(created);

        let found = PackageRevision::find_by_hash(&conn, "s3://reg", "team/data", "h1")
            .unwrap()
            .unwrap();
        assert_eq!(found.id, Some(id));
        assert_eq!(found.metadata["owner"], "ana");

        // Same top hash again refreshes the timestamp instead of duplicating
        let mut again = revision("team/data", "h1", "2026-01-03T00:00:00.000000Z");
        let (again_id, created) = again.upsert(&conn).unwrap();
        assert_eq!(again_id, id);
        assert!(!created);
    }

    #[test]
    fn test_find_latest_revision() {
        let conn = create_test_db();

        revision("team/data", "h1", "2026-01-01T00:00:00.000000Z").upsert(&conn).unwrap();
        revision("team/data", "h2", "2026-01-02T00:00:00.000000Z").upsert(&conn).unwrap();

        let latest = PackageRevision::find_latest(&conn, "s3://reg", "team/data")
            .unwrap()
            .unwrap();
        assert_eq!(latest.top_hash, "h2");
        assert!(PackageRevision::find_latest(&conn, "s3://reg", "team/none").unwrap().is_none());
    }

    #[test]
    fn test_search_latest_per_package() {
        let conn = create_test_db();

        revision("team/data", "h1", "2026-01-01T00:00:00.000000Z").upsert(&conn).unwrap();
        revision("team/data", "h2", "2026-01-02T00:00:00.000000Z").upsert(&conn).unwrap();
        revision("team/models", "h3", "2026-01-01T00:00:00.000000Z").upsert(&conn).unwrap();

        let all = PackageRevision::search_latest(&conn, "s3://reg", "").unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].top_hash, "h2");

        let models = PackageRevision::search_latest(&conn, "s3://reg", "MODEL").unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].name, "team/models");
    }

    #[test]
    fn test_entries_roundtrip_through_revision() {
        let conn = create_test_db();
        let (rev_id, _) = revision("team/data", "h1", "2026-01-01T00:00:00.000000Z")
            .upsert(&conn)
            .unwrap();

        let mut entry = StoredEntry::new(rev_id, "b.csv".to_string(), "s3://src/b.csv".to_string());
        entry.hash = Some("abc".to_string());
        entry.insert(&conn).unwrap();
        StoredEntry::new(rev_id, "a.csv".to_string(), "s3://src/a.csv".to_string())
            .insert(&conn)
            .unwrap();

        let entries = StoredEntry::find_by_revision(&conn, rev_id).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].logical_key, "a.csv");
        assert_eq!(entries[1].hash.as_deref(), Some("abc"));
    }

    #[test]
    fn test_settings() {
        let conn = create_test_db();

        assert!(Setting::get(&conn, "catalog_url").unwrap().is_none());
        Setting::set(&conn, "catalog_url", "https://a.example.com").unwrap();
        Setting::set(&conn, "catalog_url", "https://b.example.com").unwrap();
        assert_eq!(
            Setting::get(&conn, "catalog_url").unwrap().as_deref(),
            Some("https://b.example.com")
        );
    }

    #[test]
    fn test_list_registries() {
        let conn = create_test_db();
        revision("team/data", "h1", "2026-01-01T00:00:00.000000Z").upsert(&conn).unwrap();
        let mut other = PackageRevision::new(
            "s3://other".to_string(),
            "team/data".to_string(),
            "h1".to_string(),
            "2026-01-01T00:00:00.000000Z".to_string(),
        );
        other.upsert(&conn).unwrap();

        assert_eq!(
            PackageRevision::list_registries(&conn).unwrap(),
            vec!["s3://other".to_string(), "s3://reg".to_string()]
        );
    }
}
