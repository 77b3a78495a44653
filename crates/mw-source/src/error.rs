//! Errors raised while building a catalog.
//!
//! Every variant is fatal to the catalog build that produced it: a source
//! that fails never publishes a partial catalog.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Network failure, timeout or unreadable response body.
    Transport { url: String, message: String },
    /// The upstream answered with a non-2xx status.
    Status { url: String, status: u16 },
    /// A response or a field inside it could not be decoded.
    Parse { context: String, message: String },
    /// A continuation reference was seen twice during one pagination walk.
    PaginationLoop { url: String },
    /// Missing credential or inconsistent run setup.
    Config(String),
    /// The overall build deadline elapsed.
    Deadline { source: String, secs: u64 },
    /// Snapshot cache could not be read or written.
    Cache(String),
}

impl SourceError {
    pub fn parse(context: impl Into<String>, message: impl fmt::Display) -> Self {
        SourceError::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Only transport-level failures and overload/5xx answers are worth another GET.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Transport { .. } => true,
            SourceError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Transport { url, message } => {
                write!(f, "transport error: GET {url}: {message}")
            }
            SourceError::Status { url, status } => {
                write!(f, "transport error: GET {url} returned http {status}")
            }
            SourceError::Parse { context, message } => {
                write!(f, "parse error ({context}): {message}")
            }
            SourceError::PaginationLoop { url } => {
                write!(f, "pagination loop: continuation {url} was already visited")
            }
            SourceError::Config(msg) => write!(f, "configuration error: {msg}"),
            SourceError::Deadline { source, secs } => {
                write!(f, "catalog build for {source} exceeded the {secs}s deadline")
            }
            SourceError::Cache(msg) => write!(f, "cache error: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}
