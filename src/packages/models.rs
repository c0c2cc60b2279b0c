// src/packages/models.rs

//! Backend-agnostic value objects shared by every layer
//!
//! Records returned to callers (`PackageInfo`, `ContentInfo`,
//! `PackageCreationResult`, ...) validate themselves on construction and are
//! never mutated afterwards. `PackageBuilder` is the one mutable type: a
//! staging area owned by a single create/update call.

use crate::error::{Error, Result};
use crate::packages::uri::S3_SCHEME;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Free-form package or entry metadata
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// One logical-key to physical-key mapping inside a package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageEntry {
    pub logical_key: String,
    pub physical_key: String,
    /// Populated once the entry has been pushed
    pub hash: Option<String>,
    pub size: Option<u64>,
    pub meta: Option<Metadata>,
}

impl PackageEntry {
    pub fn new(logical_key: String, physical_key: String) -> Self {
        Self {
            logical_key,
            physical_key,
            hash: None,
            size: None,
            meta: None,
        }
    }
}

/// Transient staging structure for one create/update call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageBuilder {
    entries: Vec<PackageEntry>,
    metadata: Option<Metadata>,
}

impl PackageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an entry; an existing entry with the same logical key is replaced in place
    pub fn set_entry(&mut self, entry: PackageEntry) {
        match self
            .entries
            .iter_mut()
            .find(|existing| existing.logical_key == entry.logical_key)
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Replace the package-level metadata wholesale
    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = Some(metadata);
    }

    pub fn entries(&self) -> &[PackageEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [PackageEntry] {
        &mut self.entries
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn get(&self, logical_key: &str) -> Option<&PackageEntry> {
        self.entries.iter().find(|e| e.logical_key == logical_key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A named package revision as seen by search/get
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub modified_date: Option<DateTime<Utc>>,
    pub registry: String,
    pub bucket: String,
    pub top_hash: String,
}

impl PackageInfo {
    pub fn new(name: String, registry: String, bucket: String, top_hash: String) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::validation("package info requires a name"));
        }
        if top_hash.is_empty() {
            return Err(Error::validation(format!(
                "package info for '{}' requires a top hash",
                name
            )));
        }

        Ok(Self {
            name,
            description: None,
            tags: Vec::new(),
            modified_date: None,
            registry,
            bucket,
            top_hash,
        })
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_modified_date(mut self, modified_date: Option<DateTime<Utc>>) -> Self {
        self.modified_date = modified_date;
        self
    }
}

/// Kind of an entry observed while browsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    File,
    Directory,
}

impl ContentType {
    pub fn as_str(&self) -> &str {
        match self {
            ContentType::File => "file",
            ContentType::Directory => "directory",
        }
    }
}

/// One entry observed while browsing a package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentInfo {
    pub path: String,
    pub size: Option<u64>,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub modified_date: Option<DateTime<Utc>>,
    pub download_url: Option<String>,
    pub meta: Option<Metadata>,
}

impl ContentInfo {
    pub fn new(path: String, content_type: ContentType) -> Result<Self> {
        if path.is_empty() {
            return Err(Error::validation("content path must not be empty"));
        }

        Ok(Self {
            path,
            size: None,
            content_type,
            modified_date: None,
            download_url: None,
            meta: None,
        })
    }

    pub fn file(path: String, size: Option<u64>) -> Result<Self> {
        let mut info = Self::new(path, ContentType::File)?;
        info.size = size;
        Ok(info)
    }

    pub fn directory(path: String) -> Result<Self> {
        Self::new(path, ContentType::Directory)
    }

    pub fn is_dir(&self) -> bool {
        self.content_type == ContentType::Directory
    }
}

/// An object-storage bucket visible to the current session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub name: String,
    pub region: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl BucketInfo {
    pub fn new(name: String) -> Self {
        Self {
            name,
            region: None,
            title: None,
            description: None,
        }
    }

    /// Registry URI for this bucket
    pub fn registry(&self) -> String {
        format!("{}{}", S3_SCHEME, self.name)
    }
}

/// Outcome of a create or update call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageCreationResult {
    pub package_name: String,
    pub top_hash: String,
    pub registry: String,
    pub catalog_url: Option<String>,
    pub file_count: usize,
    pub success: bool,
}

impl PackageCreationResult {
    pub fn new(
        package_name: String,
        top_hash: String,
        registry: String,
        catalog_url: Option<String>,
        file_count: usize,
        success: bool,
    ) -> Result<Self> {
        crate::packages::validation::validate_package_name(&package_name)?;

        if !registry.starts_with(S3_SCHEME) {
            return Err(Error::validation(format!(
                "registry must start with {}",
                S3_SCHEME
            ))
            .with_context("registry", registry.as_str()));
        }

        if success && (top_hash.is_empty() || file_count == 0) {
            return Err(Error::validation(
                "a successful result requires a top hash and at least one file",
            )
            .with_context("package_name", package_name.as_str())
            .with_context("file_count", file_count));
        }

        Ok(Self {
            package_name,
            top_hash,
            registry,
            catalog_url,
            file_count,
            success,
        })
    }
}

/// Added/deleted/modified logical keys between two revisions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDiff {
    pub added: Vec<String>,
    pub deleted: Vec<String>,
    pub modified: Vec<String>,
}

impl PackageDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }
}

/// Basic session state reported by a backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub is_authenticated: bool,
    pub catalog_url: Option<String>,
}

/// Object copy behaviour for update pushes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyMode {
    All,
    SameBucket,
    #[default]
    None,
}

impl CopyMode {
    pub fn as_str(&self) -> &str {
        match self {
            CopyMode::All => "all",
            CopyMode::SameBucket => "same_bucket",
            CopyMode::None => "none",
        }
    }

    /// Whether the push should copy objects into the registry
    pub fn copies_objects(&self) -> bool {
        matches!(self, CopyMode::All)
    }
}

impl FromStr for CopyMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(CopyMode::All),
            "same_bucket" => Ok(CopyMode::SameBucket),
            "none" => Ok(CopyMode::None),
            _ => Err(Error::validation(format!("Invalid copy mode: {}", s))
                .with_context("copy_mode", s)),
        }
    }
}

impl fmt::Display for CopyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, physical: &str) -> PackageEntry {
        PackageEntry::new(key.to_string(), physical.to_string())
    }

    #[test]
    fn test_builder_last_entry_wins() {
        let mut builder = PackageBuilder::new();
        builder.set_entry(entry("a.csv", "s3://b/old/a.csv"));
        builder.set_entry(entry("b.csv", "s3://b/b.csv"));
        builder.set_entry(entry("a.csv", "s3://b/new/a.csv"));

        assert_eq!(builder.len(), 2);
        assert_eq!(builder.entries()[0].logical_key, "a.csv");
        assert_eq!(builder.get("a.csv").unwrap().physical_key, "s3://b/new/a.csv");
    }

    #[test]
    fn test_content_info_requires_path() {
        assert!(ContentInfo::file(String::new(), Some(1)).is_err());
        let dir = ContentInfo::directory("data/".to_string()).unwrap();
        assert!(dir.is_dir());
        assert_eq!(dir.content_type.as_str(), "directory");
    }

    #[test]
    fn test_content_info_serializes_type_field() {
        let info = ContentInfo::file("a.csv".to_string(), Some(10)).unwrap();
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["type"], "file");
        assert_eq!(json["size"], 10);
    }

    #[test]
    fn test_creation_result_invariants() {
        let ok = PackageCreationResult::new(
            "team/data".to_string(),
            "abc123".to_string(),
            "s3://reg".to_string(),
            None,
            1,
            true,
        );
        assert!(ok.is_ok());

        let bad_registry = PackageCreationResult::new(
            "team/data".to_string(),
            "abc123".to_string(),
            "reg".to_string(),
            None,
            1,
            true,
        );
        assert!(matches!(bad_registry, Err(Error::Validation { .. })));

        let empty_hash = PackageCreationResult::new(
            "team/data".to_string(),
            String::new(),
            "s3://reg".to_string(),
            None,
            1,
            true,
        );
        assert!(empty_hash.is_err());

        let failed_push = PackageCreationResult::new(
            "team/data".to_string(),
            String::new(),
            "s3://reg".to_string(),
            None,
            1,
            false,
        );
        assert!(failed_push.is_ok());
    }

    #[test]
    fn test_copy_mode_parsing() {
        assert_eq!("all".parse::<CopyMode>().unwrap(), CopyMode::All);
        assert_eq!("same_bucket".parse::<CopyMode>().unwrap(), CopyMode::SameBucket);
        assert!("everything".parse::<CopyMode>().is_err());
        assert!(CopyMode::All.copies_objects());
        assert!(!CopyMode::SameBucket.copies_objects());
    }

    #[test]
    fn test_bucket_registry() {
        assert_eq!(BucketInfo::new("reg".to_string()).registry(), "s3://reg");
    }
}
