// src/packages/traits.rs

//! The primitive contract every package backend implements

use crate::catalog::CatalogClient;
use crate::error::Result;
use crate::packages::diff::{EntryMap, diff_entries};
use crate::packages::models::{
    BucketInfo, ContentInfo, Metadata, PackageBuilder, PackageDiff, PackageInfo, SessionInfo,
};
use std::time::Duration;

/// Common interface for package backends (local library, remote API, ...)
///
/// Primitives fail with `Error::NotFound` when the target does not exist and
/// `Error::Backend` (or a raw lower-level error) otherwise. They never
/// validate caller input; orchestration does that first.
pub trait PackageBackend {
    /// Handle to one fetched package revision
    type Package;

    /// One raw search hit
    type SearchHit;

    /// One raw browse entry
    type Entry;

    /// Registry used when the caller does not name one
    fn default_registry(&self) -> Option<String> {
        None
    }

    /// Start a fresh, empty package
    fn create_empty_package(&self) -> Result<PackageBuilder>;

    /// Stage `uri` under `logical_key`, replacing any entry already there
    fn add_file_to_package(
        &self,
        builder: &mut PackageBuilder,
        logical_key: &str,
        uri: &str,
    ) -> Result<()>;

    /// Replace the package-level metadata
    fn set_package_metadata(&self, builder: &mut PackageBuilder, metadata: Metadata)
    -> Result<()>;

    /// Push the staged package and return its top hash
    fn push_package(
        &self,
        builder: &mut PackageBuilder,
        name: &str,
        registry: &str,
        message: Option<&str>,
        copy: bool,
    ) -> Result<String>;

    /// Fetch one revision; `top_hash = None` means the latest
    fn get_package(&self, name: &str, registry: &str, top_hash: Option<&str>)
    -> Result<Self::Package>;

    fn get_package_entries(&self, package: &Self::Package) -> Result<EntryMap>;

    fn get_package_metadata(&self, package: &Self::Package) -> Result<Metadata>;

    /// Run a search; an empty query lists every package
    fn search_packages(&self, query: &str, registry: &str) -> Result<Vec<Self::SearchHit>>;

    /// List the entries directly under `path` (empty = package root)
    fn browse_package_content(&self, package: &Self::Package, path: &str)
    -> Result<Vec<Self::Entry>>;

    fn get_file_url(
        &self,
        name: &str,
        registry: &str,
        path: &str,
        top_hash: Option<&str>,
    ) -> Result<String>;

    fn get_session_info(&self) -> Result<SessionInfo>;

    fn list_buckets(&self) -> Result<Vec<BucketInfo>>;

    /// Persist the catalog this backend talks to
    fn configure_catalog(&self, catalog_url: &str) -> Result<()>;

    fn transform_search_hit(&self, hit: &Self::SearchHit, registry: &str) -> Result<PackageInfo>;

    fn transform_content_entry(&self, entry: &Self::Entry) -> Result<ContentInfo>;

    fn transform_package(&self, package: &Self::Package) -> Result<PackageInfo>;

    /// Compare two revisions
    ///
    /// The default fetches both and compares entry maps; backends with a
    /// native diff may override it.
    fn diff_packages(
        &self,
        name1: &str,
        name2: &str,
        registry: &str,
        hash1: Option<&str>,
        hash2: Option<&str>,
    ) -> Result<PackageDiff> {
        let first = self.get_package(name1, registry, hash1)?;
        let second = self.get_package(name2, registry, hash2)?;
        let entries1 = self.get_package_entries(&first)?;
        let entries2 = self.get_package_entries(&second)?;
        Ok(diff_entries(&entries1, &entries2))
    }

    /// Download the raw `config.json` of a catalog
    fn fetch_catalog_document(&self, catalog_url: &str) -> Result<serde_json::Value> {
        CatalogClient::new(self.http_timeout())?.fetch_config(catalog_url)
    }

    /// Timeout for the default catalog download
    fn http_timeout(&self) -> Duration {
        crate::config::DEFAULT_HTTP_TIMEOUT
    }
}
