// src/packages/uri.rs

//! Object-store URI handling
//!
//! Parsing of `s3://bucket/key[?versionId=...]` URIs and the mapping from
//! source URIs to in-package logical keys.

use crate::error::{Error, Result};

/// Object-store URI scheme prefix
pub const S3_SCHEME: &str = "s3://";

/// A parsed object-store URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Uri {
    pub bucket: String,
    pub key: String,
    pub version_id: Option<String>,
}

impl S3Uri {
    /// Parse a URI that must carry both a bucket and a key
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri.strip_prefix(S3_SCHEME).ok_or_else(|| {
            Error::validation(format!("URI must start with {}: {}", S3_SCHEME, uri))
                .with_context("uri", uri)
        })?;

        let (bucket, path) = rest.split_once('/').unwrap_or((rest, ""));
        let (key, query) = split_query(path);
        if bucket.is_empty() {
            return Err(Error::validation(format!("URI has no bucket: {}", uri))
                .with_context("uri", uri));
        }
        if key.is_empty() {
            return Err(
                Error::validation(format!("URI has no object key: {}", uri)).with_context("uri", uri)
            );
        }

        let version_id = query.and_then(|q| {
            q.split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(k, _)| *k == "versionId")
                .map(|(_, v)| v.to_string())
        });

        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
            version_id,
        })
    }

    /// Final path component of the key
    pub fn basename(&self) -> &str {
        basename_of(&self.key)
    }
}

fn split_query(path: &str) -> (&str, Option<&str>) {
    match path.split_once('?') {
        Some((key, query)) => (key, Some(query)),
        None => (path, None),
    }
}

fn basename_of(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Map a source URI to its in-package path
///
/// With `auto_organize` the bucket is dropped and the remaining key becomes
/// the logical key (`s3://bucket/a/b/c.csv` -> `a/b/c.csv`); otherwise only the
/// final path component is kept. Query strings never reach the logical key.
pub fn extract_logical_key(uri: &str, auto_organize: bool) -> String {
    let without_scheme = uri.strip_prefix(S3_SCHEME).unwrap_or(uri);
    let (without_query, _) = split_query(without_scheme);

    if auto_organize {
        if let Some((_, key)) = without_query.split_once('/') {
            let key = key.trim_start_matches('/');
            if !key.is_empty() {
                return key.to_string();
            }
        }
    }

    basename_of(without_query).to_string()
}

/// Loose URI check used on the update path
///
/// Requires the scheme, a `/` after the bucket, a non-empty key, and a key
/// that does not name a directory.
pub fn is_plausible_s3_uri(uri: &str) -> bool {
    let Some(rest) = uri.strip_prefix(S3_SCHEME) else {
        return false;
    };
    let Some((_, path)) = rest.split_once('/') else {
        return false;
    };
    let (key, _) = split_query(path);
    !key.is_empty() && !key.ends_with('/')
}

/// Bucket name of a registry URI (`s3://bucket[/...]`)
pub fn bucket_from_registry(registry: &str) -> Option<&str> {
    let rest = registry.strip_prefix(S3_SCHEME)?;
    let bucket = rest.split('/').next().unwrap_or(rest);
    if bucket.is_empty() { None } else { Some(bucket) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_uri() {
        let uri = S3Uri::parse("s3://src/a/b.csv?versionId=v1").unwrap();
        assert_eq!(uri.bucket, "src");
        assert_eq!(uri.key, "a/b.csv");
        assert_eq!(uri.version_id.as_deref(), Some("v1"));
        assert_eq!(uri.basename(), "b.csv");
    }

    #[test]
    fn test_parse_rejects_incomplete_uris() {
        assert!(S3Uri::parse("https://src/a.csv").is_err());
        assert!(S3Uri::parse("s3:///a.csv").is_err());
        assert!(S3Uri::parse("s3://src").is_err());
        assert!(S3Uri::parse("s3://src/").is_err());
    }

    #[test]
    fn test_extract_logical_key_auto_organize() {
        assert_eq!(extract_logical_key("s3://bucket/a/b/c.csv", true), "a/b/c.csv");
        assert_eq!(extract_logical_key("s3://bucket/c.csv?versionId=x", true), "c.csv");
        // No path after the bucket falls back to the basename
        assert_eq!(extract_logical_key("s3://bucket", true), "bucket");
        assert_eq!(extract_logical_key("s3://bucket/", true), "bucket");
    }

    #[test]
    fn test_extract_logical_key_flat() {
        assert_eq!(extract_logical_key("s3://bucket/a/b/c.csv", false), "c.csv");
        assert_eq!(extract_logical_key("s3://bucket/c.csv", false), "c.csv");
        assert_eq!(extract_logical_key("s3://bucket/dir/", false), "dir");
    }

    #[test]
    fn test_extract_logical_key_never_empty_with_key() {
        for uri in ["s3://b/x", "s3://b/x/y", "s3://b//x", "s3://b/x/y.z?versionId=1"] {
            assert!(!extract_logical_key(uri, true).is_empty(), "{}", uri);
            assert!(!extract_logical_key(uri, false).is_empty(), "{}", uri);
        }
    }

    #[test]
    fn test_plausible_uris() {
        assert!(is_plausible_s3_uri("s3://b/k.csv"));
        assert!(is_plausible_s3_uri("s3://b/dir/k.csv?versionId=1"));
        assert!(!is_plausible_s3_uri("s3://b"));
        assert!(!is_plausible_s3_uri("s3://b/"));
        assert!(!is_plausible_s3_uri("s3://b/dir/"));
        assert!(!is_plausible_s3_uri("/local/file.csv"));
    }

    #[test]
    fn test_bucket_from_registry() {
        assert_eq!(bucket_from_registry("s3://reg"), Some("reg"));
        assert_eq!(bucket_from_registry("s3://reg/prefix"), Some("reg"));
        assert_eq!(bucket_from_registry("s3://"), None);
        assert_eq!(bucket_from_registry("reg"), None);
    }
}
