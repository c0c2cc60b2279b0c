// src/packages/validation.rs

//! Input validation run before any backend call
//!
//! All checks are pure and fail with [`Error::Validation`]; the error context
//! names the offending value so callers can report a precise fix.

use crate::error::{Error, Result};
use crate::packages::uri::{S3_SCHEME, S3Uri, is_plausible_s3_uri};

/// Require `namespace/name`: exactly one `/`, both sides non-empty
pub fn validate_package_name(name: &str) -> Result<()> {
    let valid = match name.split_once('/') {
        Some((namespace, rest)) => !namespace.is_empty() && !rest.is_empty() && !rest.contains('/'),
        None => false,
    };

    if !valid {
        return Err(Error::validation(format!(
            "package name must be in 'namespace/name' format: {}",
            name
        ))
        .with_context("package_name", name));
    }
    Ok(())
}

/// Require a non-empty registry starting with the object-store scheme
pub fn validate_registry(registry: &str) -> Result<()> {
    if registry.is_empty() || !registry.starts_with(S3_SCHEME) {
        return Err(Error::validation(format!(
            "registry must start with {}: {}",
            S3_SCHEME, registry
        ))
        .with_context("registry", registry));
    }
    Ok(())
}

/// Require scheme, bucket, and key; `index` is reported for list positions
pub fn validate_s3_uri(uri: &str, index: Option<usize>) -> Result<()> {
    S3Uri::parse(uri).map(|_| ()).map_err(|err| match index {
        Some(i) => err.with_context("index", i),
        None => err,
    })
}

/// Validate every URI of a non-empty list
pub fn validate_s3_uris(uris: &[String]) -> Result<()> {
    if uris.is_empty() {
        return Err(Error::validation("at least one S3 URI is required"));
    }

    let mut invalid = Vec::new();
    for (index, uri) in uris.iter().enumerate() {
        if validate_s3_uri(uri, Some(index)).is_err() {
            invalid.push(serde_json::json!({ "index": index, "uri": uri }));
        }
    }

    if !invalid.is_empty() {
        let first_index = invalid[0]["index"].clone();
        return Err(Error::validation(format!(
            "{} of {} S3 URIs are invalid; each must look like {}bucket/key",
            invalid.len(),
            uris.len(),
            S3_SCHEME
        ))
        .with_context("index", first_index)
        .with_context("invalid_uris", invalid));
    }
    Ok(())
}

/// Permissive check for updates: non-empty, with at least one plausible URI
///
/// Individual implausible URIs are skipped later by the update itself.
pub fn validate_update_uris(uris: &[String]) -> Result<()> {
    if uris.is_empty() {
        return Err(Error::validation("at least one S3 URI is required"));
    }
    if !uris.iter().any(|uri| is_plausible_s3_uri(uri)) {
        return Err(Error::validation(format!(
            "none of the {} URIs is a valid {}bucket/key object URI",
            uris.len(),
            S3_SCHEME
        ))
        .with_context("uri_count", uris.len()));
    }
    Ok(())
}

/// Require an `http://` or `https://` catalog URL
pub fn validate_catalog_url(catalog_url: &str) -> Result<()> {
    match url::Url::parse(catalog_url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.host().is_some() => {
            Ok(())
        }
        _ => Err(
            Error::validation(format!("catalog URL must be an http(s) URL: {}", catalog_url))
                .with_context("catalog_url", catalog_url),
        ),
    }
}
