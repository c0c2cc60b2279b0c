// src/config.rs

//! Runtime configuration
//!
//! Values come from code, a deserialized document, or `QUILT_*` environment
//! variables. Persistent runtime settings (such as the configured catalog)
//! live in the local backend's database instead of config files.

use crate::error::{Error, Result};
use crate::packages::validation::{validate_catalog_url, validate_registry};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default timeout for HTTP requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default location of the local backend database
pub const DEFAULT_DB_PATH: &str = "/var/lib/quiltcore/packages.db";

/// Registry passed to backends when neither the caller nor the config names one
pub const PLACEHOLDER_REGISTRY: &str = "s3://quilt-default-registry";

/// Catalog used for package web URLs when none is configured
pub const DEFAULT_CATALOG_URL: &str = "https://open.quiltdata.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub default_registry: Option<String>,
    pub catalog_url: Option<String>,
    pub db_path: PathBuf,
    #[serde(with = "duration_secs")]
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_registry: None,
            catalog_url: None,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl Config {
    /// Load from `QUILT_*` environment variables over the defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(registry) = lookup("QUILT_DEFAULT_REGISTRY") {
            config.default_registry = Some(registry);
        }
        if let Some(catalog_url) = lookup("QUILT_CATALOG_URL") {
            config.catalog_url = Some(catalog_url);
        }
        if let Some(db_path) = lookup("QUILT_DB_PATH") {
            config.db_path = PathBuf::from(db_path);
        }
        if let Some(secs) = lookup("QUILT_HTTP_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                Error::validation(format!("QUILT_HTTP_TIMEOUT_SECS must be a number: {}", secs))
                    .with_context("value", secs.as_str())
            })?;
            config.http_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(registry) = &self.default_registry {
            validate_registry(registry)?;
        }
        if let Some(catalog_url) = &self.catalog_url {
            validate_catalog_url(catalog_url)?;
        }
        Ok(())
    }

    pub fn with_default_registry(mut self, registry: impl Into<String>) -> Self {
        self.default_registry = Some(registry.into());
        self
    }

    pub fn with_catalog_url(mut self, catalog_url: impl Into<String>) -> Self {
        self.catalog_url = Some(catalog_url.into());
        self
    }

    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
