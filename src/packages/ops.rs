// src/packages/ops.rs

//! Package lifecycle orchestration
//!
//! `PackageManager` composes backend primitives into the public workflows:
//! create, update, diff, browse, search, catalog resolution, and auth status.
//! It validates input first, calls primitives in a fixed order, and only
//! ever returns domain errors. It depends on nothing but the
//! [`PackageBackend`] trait.

use crate::catalog::{
    AuthStatus, BasicAuthStatus, CatalogConfig, catalog_name, catalog_package_url,
};
use crate::config::{DEFAULT_CATALOG_URL, PLACEHOLDER_REGISTRY};
use crate::error::{Error, ErrorContext, Result};
use crate::error_context;
use crate::packages::models::{
    BucketInfo, ContentInfo, CopyMode, Metadata, PackageBuilder, PackageCreationResult,
    PackageDiff, PackageInfo,
};
use crate::packages::traits::PackageBackend;
use crate::packages::uri::{extract_logical_key, is_plausible_s3_uri};
use crate::packages::validation::{
    validate_catalog_url, validate_package_name, validate_registry, validate_s3_uris,
    validate_update_uris,
};
use tracing::{debug, info, warn};

/// Arguments for [`PackageManager::create_package_revision`]
#[derive(Debug, Clone)]
pub struct CreateRevision {
    pub name: String,
    pub uris: Vec<String>,
    pub metadata: Option<Metadata>,
    pub registry: Option<String>,
    pub message: Option<String>,
    pub auto_organize: bool,
    pub copy: bool,
}

impl CreateRevision {
    pub fn new(name: impl Into<String>, uris: Vec<String>) -> Self {
        Self {
            name: name.into(),
            uris,
            metadata: None,
            registry: None,
            message: None,
            auto_organize: true,
            copy: false,
        }
    }

    pub fn registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn auto_organize(mut self, auto_organize: bool) -> Self {
        self.auto_organize = auto_organize;
        self
    }

    pub fn copy(mut self, copy: bool) -> Self {
        self.copy = copy;
        self
    }
}

/// Arguments for [`PackageManager::update_package_revision`]
#[derive(Debug, Clone)]
pub struct UpdateRevision {
    pub name: String,
    pub uris: Vec<String>,
    pub registry: String,
    pub metadata: Option<Metadata>,
    pub message: Option<String>,
    pub auto_organize: bool,
    pub copy_mode: CopyMode,
    /// Refuse to update unless the latest revision still has this top hash
    pub expected_top_hash: Option<String>,
}

impl UpdateRevision {
    pub fn new(name: impl Into<String>, uris: Vec<String>, registry: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uris,
            registry: registry.into(),
            metadata: None,
            message: None,
            auto_organize: true,
            copy_mode: CopyMode::None,
            expected_top_hash: None,
        }
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn auto_organize(mut self, auto_organize: bool) -> Self {
        self.auto_organize = auto_organize;
        self
    }

    pub fn copy_mode(mut self, copy_mode: CopyMode) -> Self {
        self.copy_mode = copy_mode;
        self
    }

    pub fn expect_top_hash(mut self, top_hash: impl Into<String>) -> Self {
        self.expected_top_hash = Some(top_hash.into());
        self
    }
}

/// Backend-agnostic package operations
#[derive(Debug)]
pub struct PackageManager<B: PackageBackend> {
    backend: B,
    catalog_url: Option<String>,
}

impl<B: PackageBackend> PackageManager<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            catalog_url: None,
        }
    }

    /// Catalog used to build package web URLs
    pub fn with_catalog_url(mut self, catalog_url: impl Into<String>) -> Self {
        self.catalog_url = Some(catalog_url.into());
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Search packages in a registry; an empty query lists everything
    pub fn search_packages(&self, query: &str, registry: &str) -> Result<Vec<PackageInfo>> {
        validate_registry(registry)?;
        let context = error_context! { "query" => query, "registry" => registry };

        let hits = self
            .backend
            .search_packages(query, registry)
            .map_err(|e| e.into_backend("search_packages", context.clone()))?;

        let packages = hits
            .iter()
            .map(|hit| {
                self.backend
                    .transform_search_hit(hit, registry)
                    .map_err(|e| transform_error(e, "search_packages", &context))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Search '{}' in {} returned {} packages", query, registry, packages.len());
        Ok(packages)
    }

    /// Describe one revision (latest when `top_hash` is `None`)
    pub fn get_package_info(
        &self,
        name: &str,
        registry: &str,
        top_hash: Option<&str>,
    ) -> Result<PackageInfo> {
        validate_package_name(name)?;
        validate_registry(registry)?;
        let context = error_context! { "package_name" => name, "registry" => registry };

        let package = self
            .backend
            .get_package(name, registry, top_hash)
            .map_err(|e| e.into_backend("get_package_info", context.clone()))?;

        self.backend
            .transform_package(&package)
            .map_err(|e| transform_error(e, "get_package_info", &context))
    }

    /// List the contents of a package directly under `path`
    pub fn browse_content(&self, name: &str, registry: &str, path: &str) -> Result<Vec<ContentInfo>> {
        validate_package_name(name)?;
        validate_registry(registry)?;
        let context =
            error_context! { "package_name" => name, "registry" => registry, "path" => path };

        let entries = self
            .backend
            .get_package(name, registry, None)
            .and_then(|package| self.backend.browse_package_content(&package, path))
            .map_err(|e| e.into_backend("browse_content", context.clone()))?;

        entries
            .iter()
            .map(|entry| {
                self.backend
                    .transform_content_entry(entry)
                    .map_err(|e| transform_error(e, "browse_content", &context))
            })
            .collect()
    }

    /// Download URL of one file in a package
    pub fn get_content_url(
        &self,
        name: &str,
        registry: &str,
        path: &str,
        top_hash: Option<&str>,
    ) -> Result<String> {
        validate_package_name(name)?;
        validate_registry(registry)?;
        if path.is_empty() || path.ends_with('/') {
            return Err(Error::validation(format!("path must name a file: '{}'", path))
                .with_context("path", path));
        }

        self.backend
            .get_file_url(name, registry, path, top_hash)
            .map_err(|e| {
                e.into_backend(
                    "get_content_url",
                    error_context! { "package_name" => name, "registry" => registry, "path" => path },
                )
            })
    }

    /// Resolve and derive the catalog configuration
    ///
    /// Uses `catalog_url` when given, else the session's catalog, else the
    /// catalog this manager was built with.
    pub fn get_catalog_config(&self, catalog_url: Option<&str>) -> Result<CatalogConfig> {
        let catalog_url = match catalog_url {
            Some(url) => url.to_string(),
            None => self.resolve_catalog_url()?,
        };
        validate_catalog_url(&catalog_url)?;

        let document = self
            .backend
            .fetch_catalog_document(&catalog_url)
            .map_err(|e| {
                e.into_backend(
                    "get_catalog_config",
                    error_context! { "catalog_url" => catalog_url.as_str() },
                )
            })?;

        let config = CatalogConfig::from_document(&document)
            .map_err(|e| e.with_context("catalog_url", catalog_url.as_str()))?;
        info!(
            "Resolved catalog {} (region {}, stack {})",
            catalog_url, config.region, config.stack_prefix
        );
        Ok(config)
    }

    fn resolve_catalog_url(&self) -> Result<String> {
        let session = self
            .backend
            .get_session_info()
            .map_err(|e| e.into_backend("get_session_info", ErrorContext::new()))?;

        session
            .catalog_url
            .or_else(|| self.catalog_url.clone())
            .ok_or_else(|| Error::validation("no catalog URL given and none is configured"))
    }

    /// Point the backend at a catalog
    pub fn configure_catalog(&self, catalog_url: &str) -> Result<()> {
        validate_catalog_url(catalog_url)?;
        let normalized = catalog_url.trim_end_matches('/');

        self.backend.configure_catalog(normalized).map_err(|e| {
            e.into_backend(
                "configure_catalog",
                error_context! { "catalog_url" => normalized },
            )
        })?;

        info!("Configured catalog: {}", normalized);
        Ok(())
    }

    /// Create a new revision from a list of object URIs
    pub fn create_package_revision(&self, request: &CreateRevision) -> Result<PackageCreationResult> {
        validate_package_name(&request.name)?;
        validate_s3_uris(&request.uris)?;
        if let Some(registry) = &request.registry {
            validate_registry(registry)?;
        }

        let registry = self.resolve_registry(request.registry.as_deref());
        validate_registry(&registry)?;
        let context = error_context! {
            "package_name" => request.name.as_str(),
            "registry" => registry.as_str(),
            "file_count" => request.uris.len(),
        };

        self.push_new_revision(request, &registry)
            .map_err(|e| e.into_backend("create_package_revision", context))
    }

    fn push_new_revision(
        &self,
        request: &CreateRevision,
        registry: &str,
    ) -> Result<PackageCreationResult> {
        let mut builder = self.backend.create_empty_package()?;

        for uri in &request.uris {
            let logical_key = extract_logical_key(uri, request.auto_organize);
            debug!("Adding {} as {}", uri, logical_key);
            self.backend.add_file_to_package(&mut builder, &logical_key, uri)?;
        }

        if let Some(metadata) = &request.metadata {
            self.backend
                .set_package_metadata(&mut builder, metadata.clone())?;
        }

        let top_hash = self.backend.push_package(
            &mut builder,
            &request.name,
            registry,
            request.message.as_deref(),
            request.copy,
        )?;

        let result = self.creation_result(&request.name, top_hash, registry, request.uris.len())?;
        info!(
            "Created {} in {} ({} files, top hash {})",
            result.package_name, result.registry, result.file_count, result.top_hash
        );
        Ok(result)
    }

    /// Add files and metadata to the latest revision of an existing package
    ///
    /// Existing entries are carried forward; new files replace existing ones
    /// at the same logical key. Metadata is merged shallowly with new keys
    /// winning. URIs that do not name an object are skipped.
    pub fn update_package_revision(&self, request: &UpdateRevision) -> Result<PackageCreationResult> {
        validate_package_name(&request.name)?;
        validate_registry(&request.registry)?;
        validate_update_uris(&request.uris)?;

        let context = error_context! {
            "package_name" => request.name.as_str(),
            "registry" => request.registry.as_str(),
            "file_count" => request.uris.len(),
        };

        self.push_updated_revision(request)
            .map_err(|e| e.into_backend("update_package_revision", context))
    }

    fn push_updated_revision(&self, request: &UpdateRevision) -> Result<PackageCreationResult> {
        let existing = self
            .backend
            .get_package(&request.name, &request.registry, None)?;

        if let Some(expected) = &request.expected_top_hash {
            let current = self.backend.transform_package(&existing)?;
            if &current.top_hash != expected {
                return Err(Error::backend(format!(
                    "{} changed since it was read: expected {}, found {}",
                    request.name, expected, current.top_hash
                ))
                .with_context("operation", "update_package_revision")
                .with_context("package_name", request.name.as_str())
                .with_context("expected_top_hash", expected.as_str())
                .with_context("actual_top_hash", current.top_hash));
            }
        }

        let entries = self.backend.get_package_entries(&existing)?;
        let mut metadata = self.backend.get_package_metadata(&existing)?;

        let mut builder: PackageBuilder = self.backend.create_empty_package()?;
        for (logical_key, entry) in &entries {
            self.backend
                .add_file_to_package(&mut builder, logical_key, &entry.physical_key)?;
        }

        let mut added = 0;
        for uri in &request.uris {
            if !is_plausible_s3_uri(uri) {
                warn!("Skipping invalid URI for {}: {}", request.name, uri);
                continue;
            }
            let logical_key = extract_logical_key(uri, request.auto_organize);
            if entries.contains_key(&logical_key) {
                debug!("Replacing {} with {}", logical_key, uri);
            }
            self.backend.add_file_to_package(&mut builder, &logical_key, uri)?;
            added += 1;
        }

        if let Some(new_metadata) = &request.metadata {
            metadata.extend(new_metadata.clone());
        }
        self.backend.set_package_metadata(&mut builder, metadata)?;

        let top_hash = self.backend.push_package(
            &mut builder,
            &request.name,
            &request.registry,
            request.message.as_deref(),
            request.copy_mode.copies_objects(),
        )?;

        let result = self.creation_result(&request.name, top_hash, &request.registry, added)?;
        info!(
            "Updated {} in {} ({} new files, {} carried forward)",
            result.package_name,
            result.registry,
            added,
            entries.len()
        );
        Ok(result)
    }

    /// Compare two revisions by logical key
    pub fn diff_packages(
        &self,
        name1: &str,
        name2: &str,
        registry: &str,
        hash1: Option<&str>,
        hash2: Option<&str>,
    ) -> Result<PackageDiff> {
        validate_package_name(name1)?;
        validate_package_name(name2)?;
        validate_registry(registry)?;

        self.backend
            .diff_packages(name1, name2, registry, hash1, hash2)
            .map_err(|e| {
                e.into_backend(
                    "diff_packages",
                    error_context! {
                        "package1" => name1,
                        "package2" => name2,
                        "registry" => registry,
                    },
                )
            })
    }

    pub fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        self.backend
            .list_buckets()
            .map_err(|e| e.into_backend("list_buckets", ErrorContext::new()))
    }

    /// Session status, enriched with catalog details when they can be resolved
    ///
    /// Enrichment failures are logged and the basic status is returned.
    pub fn get_auth_status(&self) -> Result<AuthStatus> {
        let session = self
            .backend
            .get_session_info()
            .map_err(|e| e.into_backend("get_auth_status", ErrorContext::new()))?;

        let basic = BasicAuthStatus {
            is_authenticated: session.is_authenticated,
            catalog_name: session.catalog_url.as_deref().and_then(catalog_name),
            logged_in_url: session.catalog_url,
        };

        let logged_in_url = match basic.logged_in_url.clone() {
            Some(url) if basic.is_authenticated => url,
            _ => return Ok(AuthStatus::Basic(basic)),
        };

        match self.get_catalog_config(Some(&logged_in_url)) {
            Ok(config) => Ok(AuthStatus::enrich(basic, &config)),
            Err(e) => {
                warn!("Could not enrich auth status from {}: {}", logged_in_url, e);
                Ok(AuthStatus::Basic(basic))
            }
        }
    }

    fn resolve_registry(&self, registry: Option<&str>) -> String {
        registry
            .map(str::to_string)
            .or_else(|| self.backend.default_registry())
            .unwrap_or_else(|| PLACEHOLDER_REGISTRY.to_string())
    }

    fn creation_result(
        &self,
        name: &str,
        top_hash: String,
        registry: &str,
        file_count: usize,
    ) -> Result<PackageCreationResult> {
        let success = !top_hash.is_empty();
        let catalog = self.catalog_url.as_deref().unwrap_or(DEFAULT_CATALOG_URL);
        let catalog_url = catalog_package_url(catalog, name, registry);

        PackageCreationResult::new(
            name.to_string(),
            top_hash,
            registry.to_string(),
            catalog_url,
            file_count,
            success,
        )
    }
}

/// Any failure while turning a backend record into a value object
fn transform_error(err: Error, operation: &str, context: &ErrorContext) -> Error {
    let mut full = context.clone();
    full.insert("operation".to_string(), operation.into());
    Error::Backend {
        message: format!("{} failed to transform a backend result: {}", operation, err.message()),
        context: full,
        source: Some(Box::new(err)),
    }
}
