// src/lib.rs

//! Quiltcore
//!
//! Versioned, content-addressed data packages stored in object-storage
//! registries, managed through interchangeable backends.
//!
//! # Architecture
//!
//! - Packages: named `namespace/name` collections of logical keys mapped to
//!   object URIs, plus metadata, identified per revision by a top hash
//! - Backends: implement the `PackageBackend` primitives (build, push, fetch,
//!   search, browse, ...); a SQLite-backed local backend is included
//! - Orchestration: `PackageManager` validates input, sequences primitives,
//!   and translates every failure into one of five error kinds
//! - Catalog: `config.json` resolution and auth-status enrichment

pub mod backends;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod packages;

pub use config::Config;
pub use error::{Error, ErrorContext, Result};
pub use packages::{CreateRevision, PackageBackend, PackageManager, UpdateRevision};
