//! Error types for release-manifest
//!
//! Transport failures are wrapped into [`ApiError`] at the platform boundary so
//! callers can inspect the HTTP status without knowing which client produced it.

use std::fmt;
use thiserror::Error;

/// Boxed underlying cause of an API failure
pub type Cause = Box<dyn std::error::Error + Send + Sync>;

/// A failed call against the hosting platform
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status, when the failure came from an HTTP response
    pub status: Option<u16>,
    /// GraphQL error type (e.g. `FORBIDDEN`), when reported
    pub error_type: Option<String>,
    /// Human readable summary
    pub message: String,
    /// Raw response body, if any
    pub body: Option<String>,
    /// Original error that produced this one
    pub cause: Option<Cause>,
}

impl ApiError {
    /// Create an error with just a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            error_type: None,
            message: message.into(),
            body: None,
            cause: None,
        }
    }

    /// Create an error for an HTTP status with its response body
    pub fn with_status(status: u16, message: impl Into<String>, body: Option<String>) -> Self {
        Self {
            status: Some(status),
            error_type: None,
            message: message.into(),
            body,
            cause: None,
        }
    }

    /// Attach the original cause
    #[must_use]
    pub fn caused_by(mut self, cause: impl Into<Cause>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Attach a GraphQL error type
    #[must_use]
    pub fn typed(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {status})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|c| c as &(dyn std::error::Error + 'static))
    }
}

/// Main error type for release-manifest operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing configuration; always fatal to the run
    #[error("configuration error for {releaser} in {repo}: {message}")]
    Configuration {
        /// Releaser (component path or config file) the error belongs to
        releaser: String,
        /// Repository as `owner/name`
        repo: String,
        /// What went wrong
        message: String,
    },

    /// Any non-2xx response or transport failure from GitHub
    #[error("GitHub API error: {0}")]
    GitHubApi(ApiError),

    /// 401 from GitHub
    #[error("authentication failed: {0}")]
    Auth(ApiError),

    /// The tag for a release already exists
    #[error("release tag already exists: {tag}")]
    DuplicateRelease {
        /// Tag that already exists
        tag: String,
        /// Underlying 422 response
        #[source]
        source: ApiError,
    },

    /// File lookup miss on a branch
    #[error("file not found: {path} on {branch}")]
    FileNotFound {
        /// Repository-relative path
        path: String,
        /// Branch that was searched
        branch: String,
    },

    /// Several errors from a batch in which nothing succeeded
    #[error("{} operations failed: {}", .0.len(), join_errors(.0))]
    Aggregate(Vec<Error>),

    /// Branch name does not follow the release branch encoding
    #[error("invalid release branch name: {0}")]
    InvalidBranchName(String),

    /// Version string could not be parsed
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    /// No token available
    #[error("no GitHub token found: {0}")]
    NoToken(String),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization failure
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant violation
    #[error("internal error: {0}")]
    Internal(String),
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Build a configuration error
    pub fn config(
        releaser: impl Into<String>,
        repo: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            releaser: releaser.into(),
            repo: repo.into(),
            message: message.into(),
        }
    }

    /// The API error carried by this error, if any
    pub const fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::GitHubApi(e) | Self::Auth(e) | Self::DuplicateRelease { source: e, .. } => {
                Some(e)
            }
            _ => None,
        }
    }

    /// HTTP status for every API-derived variant
    pub fn status(&self) -> Option<u16> {
        self.api_error().and_then(|e| e.status)
    }

    /// 403 from REST or `FORBIDDEN` from GraphQL
    pub fn is_permission_error(&self) -> bool {
        self.api_error().is_some_and(|e| {
            e.status == Some(403) || e.error_type.as_deref() == Some("FORBIDDEN")
        })
    }

    /// Upstream 502 from the query path
    pub fn is_transient(&self) -> bool {
        self.status() == Some(502)
    }

    /// 404 from any API path
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Classify a status code into the matching variant
    pub fn from_api(error: ApiError) -> Self {
        match error.status {
            Some(401) => Self::Auth(error),
            _ => Self::GitHubApi(error),
        }
    }
}

impl From<ApiError> for Error {
    fn from(error: ApiError) -> Self {
        Self::from_api(error)
    }
}

impl From<octocrab::Error> for Error {
    fn from(err: octocrab::Error) -> Self {
        let api = match &err {
            octocrab::Error::GitHub { source, .. } => {
                let body = source
                    .errors
                    .as_ref()
                    .and_then(|errors| serde_json::to_string(errors).ok());
                ApiError::with_status(source.status_code.as_u16(), source.message.clone(), body)
            }
            other => ApiError::new(other.to_string()),
        };
        Self::from_api(api.caused_by(err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let mut api = ApiError::new(err.to_string());
        api.status = err.status().map(|s| s.as_u16());
        Self::from_api(api.caused_by(err))
    }
}

/// Result type alias for release-manifest operations
pub type Result<T> = std::result::Result<T, Error>;
