// src/catalog/mod.rs

//! Catalog configuration and session status
//!
//! This module provides functionality for:
//! - Downloading a catalog's `config.json`
//! - Deriving the stack prefix and tabulator data catalog name
//! - Building catalog web URLs for packages
//! - The basic/enriched authentication status shapes

use crate::error::{Error, Result};
use crate::packages::uri::bucket_from_registry;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Substring marking the generated analytics bucket name
const ANALYTICS_BUCKET_MARKER: &str = "-analyticsbucket";

/// Resolved catalog configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub region: String,
    pub api_gateway_endpoint: String,
    pub analytics_bucket: String,
    pub stack_prefix: String,
    pub tabulator_data_catalog: String,
}

impl CatalogConfig {
    pub fn new(
        region: String,
        api_gateway_endpoint: String,
        analytics_bucket: String,
        stack_prefix: String,
        tabulator_data_catalog: String,
    ) -> Result<Self> {
        let fields = [
            ("region", &region),
            ("api_gateway_endpoint", &api_gateway_endpoint),
            ("analytics_bucket", &analytics_bucket),
            ("stack_prefix", &stack_prefix),
            ("tabulator_data_catalog", &tabulator_data_catalog),
        ];
        if let Some((field, _)) = fields.iter().find(|(_, value)| value.is_empty()) {
            return Err(
                Error::validation(format!("catalog config field '{}' must not be empty", field))
                    .with_context("field", *field),
            );
        }

        Ok(Self {
            region,
            api_gateway_endpoint,
            analytics_bucket,
            stack_prefix,
            tabulator_data_catalog,
        })
    }

    /// Derive the configuration from a raw `config.json` document
    ///
    /// `region`, `apiGatewayEndpoint`, `registryUrl`, and `analyticsBucket`
    /// must all be present as non-empty strings.
    pub fn from_document(document: &Value) -> Result<Self> {
        let region = required_field(document, "region")?;
        let api_gateway_endpoint = required_field(document, "apiGatewayEndpoint")?;
        required_field(document, "registryUrl")?;
        let analytics_bucket = required_field(document, "analyticsBucket")?;

        let stack_prefix = derive_stack_prefix(&analytics_bucket);
        let tabulator_data_catalog = tabulator_catalog_name(&stack_prefix);

        Self::new(
            region,
            api_gateway_endpoint,
            analytics_bucket,
            stack_prefix,
            tabulator_data_catalog,
        )
    }
}

fn required_field(document: &Value, key: &str) -> Result<String> {
    match document.get(key).and_then(Value::as_str) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(Error::backend(format!(
            "catalog config is missing required field '{}'",
            key
        ))
        .with_context("operation", "get_catalog_config")
        .with_context("missing_key", key)),
    }
}

/// Stack prefix encoded in an analytics bucket name
///
/// Everything before `-analyticsbucket` (case-insensitive) when present,
/// otherwise everything before the first `-`.
pub fn derive_stack_prefix(analytics_bucket: &str) -> String {
    // ASCII folding keeps byte offsets aligned with the original name
    let lowered = analytics_bucket.to_ascii_lowercase();
    if let Some(idx) = lowered.find(ANALYTICS_BUCKET_MARKER) {
        return analytics_bucket[..idx].to_string();
    }

    analytics_bucket
        .split('-')
        .next()
        .unwrap_or(analytics_bucket)
        .to_string()
}

/// Tabulator data catalog name for a stack
pub fn tabulator_catalog_name(stack_prefix: &str) -> String {
    format!("quilt-{}-tabulator", stack_prefix)
}

/// Catalog web URL of a package, if the registry names a bucket
pub fn catalog_package_url(catalog_url: &str, package_name: &str, registry: &str) -> Option<String> {
    let bucket = bucket_from_registry(registry)?;
    Some(format!(
        "{}/b/{}/packages/{}",
        catalog_url.trim_end_matches('/'),
        bucket,
        package_name
    ))
}

/// Host part of a catalog URL, used as the catalog's display name
pub fn catalog_name(catalog_url: &str) -> Option<String> {
    url::Url::parse(catalog_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
}

/// HTTP client for catalog documents
pub struct CatalogClient {
    client: Client,
}

impl CatalogClient {
    /// Create a new catalog client
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client })
    }

    /// Fetch `{catalog_url}/config.json`
    pub fn fetch_config(&self, catalog_url: &str) -> Result<Value> {
        let config_url = config_document_url(catalog_url);
        info!("Fetching catalog config from {}", config_url);

        let response = self.client.get(&config_url).send()?;

        if let Some(err) = status_error(response.status(), &config_url) {
            return Err(err.with_context("catalog_url", catalog_url));
        }

        let document: Value = response.json()?;

        debug!("Fetched catalog config with {} keys", document.as_object().map_or(0, |o| o.len()));
        Ok(document)
    }
}

/// URL of a catalog's config document
pub fn config_document_url(catalog_url: &str) -> String {
    format!("{}/config.json", catalog_url.trim_end_matches('/'))
}

/// Map a non-success HTTP status to a domain error
fn status_error(status: StatusCode, url: &str) -> Option<Error> {
    if status.is_success() {
        return None;
    }

    let err = match status {
        StatusCode::NOT_FOUND => Error::not_found(format!("catalog config not found at {}", url)),
        _ => Error::backend(format!("HTTP {} from {}", status, url))
            .with_context("operation", "get_catalog_config"),
    };
    Some(err.with_context("status", status.as_u16()))
}

/// Session status without catalog details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuthStatus {
    pub is_authenticated: bool,
    pub logged_in_url: Option<String>,
    pub catalog_name: Option<String>,
}

/// Authentication status, optionally enriched with catalog details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum AuthStatus {
    Basic(BasicAuthStatus),
    Enriched {
        #[serde(flatten)]
        basic: BasicAuthStatus,
        region: String,
        tabulator_data_catalog: String,
    },
}

impl AuthStatus {
    pub fn enrich(basic: BasicAuthStatus, config: &CatalogConfig) -> Self {
        AuthStatus::Enriched {
            basic,
            region: config.region.clone(),
            tabulator_data_catalog: config.tabulator_data_catalog.clone(),
        }
    }

    pub fn basic(&self) -> &BasicAuthStatus {
        match self {
            AuthStatus::Basic(basic) => basic,
            AuthStatus::Enriched { basic, .. } => basic,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.basic().is_authenticated
    }

    pub fn is_enriched(&self) -> bool {
        matches!(self, AuthStatus::Enriched { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(analytics_bucket: &str) -> Value {
        json!({
            "region": "us-east-1",
            "apiGatewayEndpoint": "https://api.example.com",
            "registryUrl": "https://registry.example.com",
            "analyticsBucket": analytics_bucket,
        })
    }

    #[test]
    fn test_stack_prefix_from_generated_bucket() {
        assert_eq!(derive_stack_prefix("myco-prod-AnalyticsBucket-1A2B"), "myco-prod");
        assert_eq!(derive_stack_prefix("stack-analyticsbucket-xyz"), "stack");
    }

    #[test]
    fn test_stack_prefix_fallbacks() {
        assert_eq!(derive_stack_prefix("simplebucket"), "simplebucket");
        assert_eq!(derive_stack_prefix("team-analytics-data"), "team");
    }

    #[test]
    fn test_stack_prefix_with_non_ascii_name() {
        assert_eq!(derive_stack_prefix("İx-analyticsbucket-1"), "İx");
        assert_eq!(derive_stack_prefix("ÄÖ-Stack-AnalyticsBucket-9"), "ÄÖ-Stack");
    }

    #[test]
    fn test_config_from_document() {
        let config = CatalogConfig::from_document(&document("myco-prod-AnalyticsBucket-1A2B")).unwrap();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.stack_prefix, "myco-prod");
        assert_eq!(config.tabulator_data_catalog, "quilt-myco-prod-tabulator");
    }

    #[test]
    fn test_config_missing_key_is_backend_error() {
        let mut doc = document("simplebucket");
        doc.as_object_mut().unwrap().remove("registryUrl");

        let err = CatalogConfig::from_document(&doc).unwrap_err();
        assert!(matches!(err, Error::Backend { .. }));
        assert_eq!(err.context().unwrap()["missing_key"], "registryUrl");
    }

    #[test]
    fn test_config_rejects_empty_fields() {
        let result = CatalogConfig::new(
            "us-east-1".to_string(),
            String::new(),
            "bucket".to_string(),
            "bucket".to_string(),
            "quilt-bucket-tabulator".to_string(),
        );
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[test]
    fn test_catalog_package_url() {
        assert_eq!(
            catalog_package_url("https://catalog.example.com/", "team/data", "s3://reg").as_deref(),
            Some("https://catalog.example.com/b/reg/packages/team/data")
        );
        assert!(catalog_package_url("https://catalog.example.com", "team/data", "reg").is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert!(status_error(StatusCode::OK, "u").is_none());
        let missing = status_error(StatusCode::NOT_FOUND, "u").unwrap();
        assert!(matches!(missing, Error::NotFound { .. }));
        let broken = status_error(StatusCode::BAD_GATEWAY, "u").unwrap();
        assert!(matches!(broken, Error::Backend { .. }));
        assert_eq!(broken.context().unwrap()["status"], 502);
    }

    #[test]
    fn test_config_document_url() {
        assert_eq!(config_document_url("https://c.example.com/"), "https://c.example.com/config.json");
    }

    #[test]
    fn test_auth_status_serialization() {
        let basic = BasicAuthStatus {
            is_authenticated: true,
            logged_in_url: Some("https://catalog.example.com".to_string()),
            catalog_name: catalog_name("https://catalog.example.com"),
        };
        let config = CatalogConfig::from_document(&document("simplebucket")).unwrap();
        let status = AuthStatus::enrich(basic, &config);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "enriched");
        assert_eq!(json["catalog_name"], "catalog.example.com");
        assert_eq!(json["tabulator_data_catalog"], "quilt-simplebucket-tabulator");
    }
}
