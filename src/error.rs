// src/error.rs

use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Structured payload attached to every domain error
pub type ErrorContext = BTreeMap<String, Value>;

/// Boxed lower-level cause kept on backend errors
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Core error types for quiltcore
///
/// The first five variants are the domain kinds callers see. The remaining
/// variants carry raw failures from lower layers; orchestration never lets
/// them escape and wraps them as [`Error::Backend`] instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed caller input, detected before any backend call
    #[error("Validation error: {message}")]
    Validation { message: String, context: ErrorContext },

    /// The requested package, path, or catalog resource does not exist
    #[error("Not found: {message}")]
    NotFound { message: String, context: ErrorContext },

    /// Credentials missing or invalid
    #[error("Authentication error: {message}")]
    Authentication { message: String, context: ErrorContext },

    /// Caller lacks privilege for the operation
    #[error("Permission denied: {message}")]
    Permission { message: String, context: ErrorContext },

    /// Backend, network, or transformation failure
    #[error("Backend error: {message}")]
    Backend {
        message: String,
        context: ErrorContext,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Error::Permission {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Error::Backend {
            message: message.into(),
            context: ErrorContext::new(),
            source: None,
        }
    }

    /// Attach a context entry; a no-op on raw variants
    pub fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Some(context) = self.context_mut() {
            context.insert(key.to_string(), value.into());
        }
        self
    }

    /// Whether this is one of the five domain kinds
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            Error::Validation { .. }
                | Error::NotFound { .. }
                | Error::Authentication { .. }
                | Error::Permission { .. }
                | Error::Backend { .. }
        )
    }

    /// Short kind name, stable for logging and reporting
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "validation",
            Error::NotFound { .. } => "not_found",
            Error::Authentication { .. } => "authentication",
            Error::Permission { .. } => "permission",
            _ => "backend",
        }
    }

    /// Domain message without the kind prefix
    pub fn message(&self) -> String {
        match self {
            Error::Validation { message, .. }
            | Error::NotFound { message, .. }
            | Error::Authentication { message, .. }
            | Error::Permission { message, .. }
            | Error::Backend { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Validation { context, .. }
            | Error::NotFound { context, .. }
            | Error::Authentication { context, .. }
            | Error::Permission { context, .. }
            | Error::Backend { context, .. } => Some(context),
            _ => None,
        }
    }

    fn context_mut(&mut self) -> Option<&mut ErrorContext> {
        match self {
            Error::Validation { context, .. }
            | Error::NotFound { context, .. }
            | Error::Authentication { context, .. }
            | Error::Permission { context, .. }
            | Error::Backend { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Translate at an orchestration boundary
    ///
    /// Domain errors pass through unchanged. Raw errors become
    /// [`Error::Backend`] carrying `operation`, the supplied context, and the
    /// original error as source.
    pub fn into_backend(self, operation: &str, context: ErrorContext) -> Self {
        if self.is_domain() {
            return self;
        }

        let message = format!("{} failed: {}", operation, self);
        let mut full = context;
        full.insert("operation".to_string(), Value::from(operation));
        Error::Backend {
            message,
            context: full,
            source: Some(Box::new(self)),
        }
    }
}

/// Result type alias using quiltcore's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Build an [`ErrorContext`] from key/value pairs
#[macro_export]
macro_rules! error_context {
    ($($key:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut context = $crate::error::ErrorContext::new();
        $(context.insert($key.to_string(), ::core::convert::Into::into($value));)*
        context
    }};
}
