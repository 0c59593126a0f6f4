//! Error types for a report run.

use std::fmt;

use thiserror::Error;

/// Longest response body excerpt kept in an [`ReportError::Api`].
pub const BODY_SNIPPET_CHARS: usize = 512;

/// Pipeline stage an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Fetch,
    Cache,
    Render,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config resolution",
            Self::Fetch => "fetch",
            Self::Cache => "cache",
            Self::Render => "render",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while producing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Missing or invalid configuration, detected before any network call.
    #[error("{message}")]
    Config { message: String },

    /// The service answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// A request exceeded the configured timeout.
    #[error("request timed out after {secs}s: {url}")]
    Timeout { url: String, secs: u64 },

    /// Connection or TLS failure.
    #[error("network error: {message}")]
    Network { message: String },

    /// The response body was not the expected JSON.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    /// Cache store failure. Never fatal to a run.
    #[error("{0}")]
    Cache(#[from] launch_report_cache::CacheError),

    /// Serialization or output failure.
    #[error("{message}")]
    Render { message: String },
}

impl ReportError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
        }
    }

    /// Builds an API error, keeping at most [`BODY_SNIPPET_CHARS`] characters
    /// of the body.
    pub fn api(status: u16, body: &str) -> Self {
        let trimmed = body.trim();
        let body = if trimmed.chars().count() > BODY_SNIPPET_CHARS {
            let mut snippet: String = trimmed.chars().take(BODY_SNIPPET_CHARS).collect();
            snippet.push_str("...");
            snippet
        } else {
            trimmed.to_string()
        };
        Self::Api { status, body }
    }

    /// Stage reported in the user-facing message.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Config { .. } => Stage::Config,
            Self::Api { .. }
            | Self::Timeout { .. }
            | Self::Network { .. }
            | Self::InvalidResponse { .. } => Stage::Fetch,
            Self::Cache(_) => Stage::Cache,
            Self::Render { .. } => Stage::Render,
        }
    }

    /// Exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Api { .. } => 3,
            Self::Timeout { .. } => 4,
            Self::Network { .. } | Self::InvalidResponse { .. } => 5,
            Self::Render { .. } => 6,
            // Only surfaces when a caller chooses to treat cache failures as fatal.
            Self::Cache(_) => 1,
        }
    }

    /// Full message as printed by the CLI, `error: <stage> failed: <detail>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use launch_report_client::ReportError;
    ///
    /// let err = ReportError::config("no project configured");
    /// assert_eq!(err.user_message(), "error: config resolution failed: no project configured");
    /// ```
    pub fn user_message(&self) -> String {
        format!("error: {} failed: {self}", self.stage())
    }
}

impl From<reqwest::Error> for ReportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout {
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
                secs: 0,
            };
        }
        if err.is_decode() {
            return Self::InvalidResponse {
                message: err.to_string(),
            };
        }
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;
