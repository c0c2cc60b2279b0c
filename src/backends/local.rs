// src/backends/local.rs

//! Local, SQLite-backed package backend
//!
//! Revisions and their entries are recorded in a local database. Objects are
//! referenced by physical key and never downloaded: entry hashes are derived
//! from the physical key, so a changed object location is a changed entry.

use crate::config::{Config, DEFAULT_HTTP_TIMEOUT};
use crate::db::{
    self,
    models::{PackageRevision, Setting, StoredEntry},
};
use crate::error::{Error, Result};
use crate::packages::diff::EntryMap;
use crate::packages::models::{
    BucketInfo, ContentInfo, Metadata, PackageBuilder, PackageEntry, PackageInfo, SessionInfo,
};
use crate::packages::traits::PackageBackend;
use crate::packages::uri::{S3Uri, bucket_from_registry};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

const CATALOG_URL_SETTING: &str = "catalog_url";

/// A fetched revision together with its stored entries
#[derive(Debug, Clone)]
pub struct LocalPackage {
    pub revision: PackageRevision,
    pub entries: Vec<StoredEntry>,
}

/// One row of a directory listing
#[derive(Debug, Clone, PartialEq)]
pub enum LocalContentEntry {
    File {
        path: String,
        physical_key: String,
        size: Option<i64>,
        meta: Option<Metadata>,
        modified: String,
    },
    Directory {
        path: String,
    },
}

#[derive(Debug)]
pub struct LocalBackend {
    conn: Mutex<Connection>,
    default_registry: Option<String>,
    http_timeout: Duration,
}

impl LocalBackend {
    /// Open (creating and migrating if needed) the database named by `config`
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;
        let conn = db::init(&config.db_path)?;
        info!("Opened local package backend at {}", config.db_path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            default_registry: config.default_registry.clone(),
            http_timeout: config.http_timeout,
        })
    }

    /// Wrap an already-migrated connection
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            default_registry: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| {
            Error::backend("local backend connection lock poisoned")
                .with_context("operation", "lock")
        })
    }

    fn find_revision(
        conn: &Connection,
        name: &str,
        registry: &str,
        top_hash: Option<&str>,
    ) -> Result<PackageRevision> {
        let revision = match top_hash {
            Some(hash) => PackageRevision::find_by_hash(conn, registry, name, hash)?,
            None => PackageRevision::find_latest(conn, registry, name)?,
        };

        revision.ok_or_else(|| {
            let what = match top_hash {
                Some(hash) => format!("{}@{}", name, hash),
                None => name.to_string(),
            };
            Error::not_found(format!("package {} not found in {}", what, registry))
                .with_context("package_name", name)
                .with_context("registry", registry)
                .with_context("top_hash", top_hash)
        })
    }
}

/// Content hash recorded for an entry
fn entry_hash(physical_key: &str) -> String {
    format!("{:x}", Sha256::digest(physical_key.as_bytes()))
}

/// Revision hash over name, sorted entries, and metadata
fn compute_top_hash(name: &str, builder: &PackageBuilder) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(b"\n");

    let mut sorted: Vec<&PackageEntry> = builder.entries().iter().collect();
    sorted.sort_by(|a, b| a.logical_key.cmp(&b.logical_key));
    for entry in sorted {
        hasher.update(entry.logical_key.as_bytes());
        hasher.update(b"\t");
        hasher.update(entry.hash.as_deref().unwrap_or_default().as_bytes());
        hasher.update(b"\n");
    }

    let metadata = serde_json::to_string(&builder.metadata().cloned().unwrap_or_default())?;
    hasher.update(metadata.as_bytes());

    Ok(format!("{:x}", hasher.finalize()))
}

/// Public HTTPS URL of an object, or the key itself when it is not an S3 URI
fn object_url(physical_key: &str) -> String {
    match S3Uri::parse(physical_key) {
        Ok(uri) => {
            let mut url = format!("https://{}.s3.amazonaws.com/{}", uri.bucket, uri.key);
            if let Some(version) = uri.version_id {
                url.push_str("?versionId=");
                url.push_str(&version);
            }
            url
        }
        Err(_) => physical_key.to_string(),
    }
}

fn parse_timestamp(timestamp: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(timestamp)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn current_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn tags_from_metadata(metadata: &Metadata) -> Vec<String> {
    metadata
        .get("tags")
        .and_then(|tags| tags.as_array())
        .map(|tags| {
            tags.iter()
                .filter_map(|tag| tag.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn package_info(revision: &PackageRevision, registry: &str) -> Result<PackageInfo> {
    let bucket = bucket_from_registry(registry).unwrap_or_default().to_string();
    let info = PackageInfo::new(
        revision.name.clone(),
        registry.to_string(),
        bucket,
        revision.top_hash.clone(),
    )?
    .with_description(revision.message.clone())
    .with_tags(tags_from_metadata(&revision.metadata))
    .with_modified_date(parse_timestamp(&revision.created_at));
    Ok(info)
}

impl PackageBackend for LocalBackend {
    type Package = LocalPackage;
    type SearchHit = PackageRevision;
    type Entry = LocalContentEntry;

    fn default_registry(&self) -> Option<String> {
        self.default_registry.clone()
    }

    fn create_empty_package(&self) -> Result<PackageBuilder> {
        Ok(PackageBuilder::new())
    }

    fn add_file_to_package(
        &self,
        builder: &mut PackageBuilder,
        logical_key: &str,
        uri: &str,
    ) -> Result<()> {
        builder.set_entry(PackageEntry::new(logical_key.to_string(), uri.to_string()));
        Ok(())
    }

    fn set_package_metadata(&self, builder: &mut PackageBuilder, metadata: Metadata) -> Result<()> {
        builder.set_metadata(metadata);
        Ok(())
    }

    fn push_package(
        &self,
        builder: &mut PackageBuilder,
        name: &str,
        registry: &str,
        message: Option<&str>,
        copy: bool,
    ) -> Result<String> {
        for entry in builder.entries_mut() {
            entry.hash = Some(entry_hash(&entry.physical_key));
        }
        let top_hash = compute_top_hash(name, builder)?;

        let mut revision = PackageRevision::new(
            registry.to_string(),
            name.to_string(),
            top_hash.clone(),
            current_timestamp(),
        );
        revision.message = message.map(str::to_string);
        revision.metadata = builder.metadata().cloned().unwrap_or_default();
        revision.copied = copy;

        let mut conn = self.lock()?;
        db::transaction(&mut conn, |tx| {
            let (revision_id, created) = revision.upsert(tx)?;
            if !created {
                debug!("Revision {} of {} already stored", top_hash, name);
                return Ok(());
            }

            for entry in builder.entries() {
                let mut stored = StoredEntry::new(
                    revision_id,
                    entry.logical_key.clone(),
                    entry.physical_key.clone(),
                );
                stored.hash = entry.hash.clone();
                stored.size = entry.size.map(|s| s as i64);
                stored.meta = entry.meta.clone();
                stored.insert(tx)?;
            }
            Ok(())
        })?;

        info!(
            "Pushed {} to {} ({} entries, top hash {})",
            name,
            registry,
            builder.len(),
            top_hash
        );
        Ok(top_hash)
    }

    fn get_package(
        &self,
        name: &str,
        registry: &str,
        top_hash: Option<&str>,
    ) -> Result<LocalPackage> {
        let conn = self.lock()?;
        let revision = Self::find_revision(&conn, name, registry, top_hash)?;
        let revision_id = revision.id.ok_or_else(|| Error::backend("stored revision without id"))?;
        let entries = StoredEntry::find_by_revision(&conn, revision_id)?;

        Ok(LocalPackage { revision, entries })
    }

    fn get_package_entries(&self, package: &LocalPackage) -> Result<EntryMap> {
        package
            .entries
            .iter()
            .map(|stored| -> Result<(String, PackageEntry)> {
                let size = stored
                    .size
                    .map(|s| {
                        u64::try_from(s).map_err(|_| {
                            Error::backend(format!(
                                "negative size recorded for {}",
                                stored.logical_key
                            ))
                            .with_context("path", stored.logical_key.as_str())
                            .with_context("size", s)
                        })
                    })
                    .transpose()?;
                let entry = PackageEntry {
                    logical_key: stored.logical_key.clone(),
                    physical_key: stored.physical_key.clone(),
                    hash: stored.hash.clone(),
                    size,
                    meta: stored.meta.clone(),
                };
                Ok((stored.logical_key.clone(), entry))
            })
            .collect()
    }

    fn get_package_metadata(&self, package: &LocalPackage) -> Result<Metadata> {
        Ok(package.revision.metadata.clone())
    }

    fn search_packages(&self, query: &str, registry: &str) -> Result<Vec<PackageRevision>> {
        let conn = self.lock()?;
        PackageRevision::search_latest(&conn, registry, query)
    }

    fn browse_package_content(
        &self,
        package: &LocalPackage,
        path: &str,
    ) -> Result<Vec<LocalContentEntry>> {
        let trimmed = path.trim_matches('/');
        let prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("{}/", trimmed)
        };

        let mut directories = BTreeMap::new();
        let mut files = Vec::new();
        for stored in &package.entries {
            if !trimmed.is_empty() && stored.logical_key == trimmed {
                files.push(file_entry(stored, &package.revision));
                continue;
            }
            let Some(rest) = stored.logical_key.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    let dir_path = format!("{}{}/", prefix, dir);
                    directories
                        .entry(dir_path.clone())
                        .or_insert(LocalContentEntry::Directory { path: dir_path });
                }
                None => files.push(file_entry(stored, &package.revision)),
            }
        }

        if !trimmed.is_empty() && directories.is_empty() && files.is_empty() {
            return Err(Error::not_found(format!(
                "path '{}' not found in {}",
                path, package.revision.name
            ))
            .with_context("package_name", package.revision.name.as_str())
            .with_context("path", path));
        }

        let mut listing: Vec<LocalContentEntry> = directories.into_values().collect();
        listing.extend(files);
        Ok(listing)
    }

    fn get_file_url(
        &self,
        name: &str,
        registry: &str,
        path: &str,
        top_hash: Option<&str>,
    ) -> Result<String> {
        let package = self.get_package(name, registry, top_hash)?;
        let entry = package
            .entries
            .iter()
            .find(|entry| entry.logical_key == path)
            .ok_or_else(|| {
                Error::not_found(format!("path '{}' not found in {}", path, name))
                    .with_context("package_name", name)
                    .with_context("path", path)
            })?;

        Ok(object_url(&entry.physical_key))
    }

    fn get_session_info(&self) -> Result<SessionInfo> {
        let conn = self.lock()?;
        let catalog_url = Setting::get(&conn, CATALOG_URL_SETTING)?;

        Ok(SessionInfo {
            is_authenticated: catalog_url.is_some(),
            catalog_url,
        })
    }

    fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        let conn = self.lock()?;
        let mut registries = PackageRevision::list_registries(&conn)?;
        if let Some(default) = &self.default_registry {
            registries.push(default.clone());
        }

        let mut names: Vec<String> = registries
            .iter()
            .filter_map(|registry| bucket_from_registry(registry).map(str::to_string))
            .collect();
        names.sort();
        names.dedup();

        Ok(names.into_iter().map(BucketInfo::new).collect())
    }

    fn configure_catalog(&self, catalog_url: &str) -> Result<()> {
        let conn = self.lock()?;
        Setting::set(&conn, CATALOG_URL_SETTING, catalog_url)
    }

    fn transform_search_hit(&self, hit: &PackageRevision, registry: &str) -> Result<PackageInfo> {
        package_info(hit, registry)
    }

    fn transform_content_entry(&self, entry: &LocalContentEntry) -> Result<ContentInfo> {
        match entry {
            LocalContentEntry::Directory { path } => ContentInfo::directory(path.clone()),
            LocalContentEntry::File {
                path,
                physical_key,
                size,
                meta,
                modified,
            } => {
                if matches!(size, Some(s) if *s < 0) {
                    return Err(Error::backend(format!("negative size recorded for {}", path))
                        .with_context("path", path.as_str()));
                }
                let mut info = ContentInfo::file(path.clone(), size.map(|s| s as u64))?;
                info.download_url = Some(object_url(physical_key));
                info.modified_date = parse_timestamp(modified);
                info.meta = meta.clone();
                Ok(info)
            }
        }
    }

    fn transform_package(&self, package: &LocalPackage) -> Result<PackageInfo> {
        package_info(&package.revision, &package.revision.registry)
    }

    fn http_timeout(&self) -> Duration {
        self.http_timeout
    }
}

fn file_entry(stored: &StoredEntry, revision: &PackageRevision) -> LocalContentEntry {
    LocalContentEntry::File {
        path: stored.logical_key.clone(),
        physical_key: stored.physical_key.clone(),
        size: stored.size,
        meta: stored.meta.clone(),
        modified: revision.created_at.clone(),
    }
}
