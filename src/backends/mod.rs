// src/backends/mod.rs

//! Backend selection
//!
//! A backend is chosen once, when the manager is built. The local backend
//! ships with this crate; remote (GraphQL) clients live in their own crates
//! and are plugged in with [`PackageManager::new`].

pub mod local;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::error_context;
use crate::packages::PackageManager;
use local::LocalBackend;
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Kinds of package backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Local library client over a SQLite database
    Local,
    /// Remote GraphQL API client
    Remote,
}

impl BackendKind {
    pub fn as_str(&self) -> &str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Remote => "remote",
        }
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "remote" | "graphql" => Ok(BackendKind::Remote),
            _ => Err(Error::validation(format!("Invalid backend kind: {}", s))
                .with_context("backend", s)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a package manager over the backend of the given kind
pub fn open_manager(kind: BackendKind, config: &Config) -> Result<PackageManager<LocalBackend>> {
    match kind {
        BackendKind::Local => {
            let backend = LocalBackend::open(config).map_err(|e| {
                e.into_backend(
                    "open_manager",
                    error_context! { "db_path" => config.db_path.display().to_string() },
                )
            })?;
            let mut manager = PackageManager::new(backend);
            if let Some(catalog_url) = &config.catalog_url {
                manager = manager.with_catalog_url(catalog_url.clone());
            }
            info!("Using {} package backend", kind);
            Ok(manager)
        }
        BackendKind::Remote => Err(Error::backend(
            "the remote backend is not bundled; construct PackageManager::new with a remote client",
        )
        .with_context("operation", "open_manager")
        .with_context("backend", kind.as_str())),
    }
}
