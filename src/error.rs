//! Error types for the synchronizer.
//!
//! Each phase of a run has its own error type so callers can decide how far
//! a failure is allowed to travel: extraction errors stay with one document,
//! index errors are classified for retrying, and configuration errors stop a
//! run before any remote call.

use std::path::PathBuf;

use thiserror::Error;

/// Invalid or incomplete configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{0}")]
    Invalid(String),

    #[error("Missing search index credentials: set {0}")]
    MissingCredentials(String),
}

/// Failure to turn one Markdown file into a record.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid front-matter in {}: {message}", path.display())]
    FrontMatter { path: PathBuf, message: String },
}

/// Failure talking to the remote search index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search index returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected search index response: {0}")]
    Decode(String),

    /// Failure that should be retried regardless of its origin.
    #[error("Search index unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid search index request: {0}")]
    Invalid(String),
}

impl IndexError {
    /// Whether another attempt may succeed.
    ///
    /// Network failures, timeouts, rate limiting (429) and server errors (5xx)
    /// are transient. Other client errors and undecodable responses are not.
    pub fn is_transient(&self) -> bool {
        match self {
            IndexError::Http(e) => {
                if let Some(status) = e.status() {
                    status.as_u16() == 429 || status.is_server_error()
                } else {
                    !e.is_decode() && !e.is_builder()
                }
            }
            IndexError::Status { status, .. } => *status == 429 || *status >= 500,
            IndexError::Unavailable(_) => true,
            IndexError::Decode(_) | IndexError::Invalid(_) => false,
        }
    }
}

/// Errors that abort a whole run before any mutation happens.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Content root does not exist or is not a directory: {}", .0.display())]
    ContentRoot(PathBuf),

    #[error("Invalid exclude pattern: {0}")]
    Glob(#[from] globset::Error),

    #[error("Failed to create search index client: {0}")]
    Client(#[from] IndexError),
}
