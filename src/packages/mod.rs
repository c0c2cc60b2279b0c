// src/packages/mod.rs

//! Package lifecycle
//!
//! Value objects, validation, the backend primitive contract, and the
//! orchestration built on top of it. Each backend implements the
//! `PackageBackend` trait; `PackageManager` drives any of them.

pub mod diff;
pub mod models;
pub mod ops;
pub mod traits;
pub mod uri;
pub mod validation;

pub use ops::{CreateRevision, PackageManager, UpdateRevision};
pub use traits::PackageBackend;
