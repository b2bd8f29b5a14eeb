//! Error types for sheit-rs.

use std::sync::Arc;

use thiserror::Error;

/// Cloneable so a single failure can be both returned and broadcast.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Construction-time failure. Nothing has touched the data source yet.
    #[error("incorrect configuration: {0}")]
    Config(String),

    /// A status call was made without a usable email or description.
    #[error("missing arguments: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Reading the workbook failed or returned something unusable.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Appending or saving a log row failed. The transition is dropped.
    #[error("persist failed: {0}")]
    Persist(String),

    /// Raw failure reported by a data source adapter.
    #[error("data source error: {0}")]
    Source(String),

    #[error("io error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("json error: {0}")]
    Json(Arc<serde_json::Error>),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound(_) => "not_found",
            Self::Fetch(_) => "fetch",
            Self::Persist(_) => "persist",
            Self::Source(_) => "source",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(Arc::new(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
