//! Worker error types.

/// Errors that can occur while submitting to or running a background
/// worker. Cancellation is deliberately *not* a variant here -- it
/// travels through [`crate::worker::WorkerEvent::Cancelled`] instead,
/// never logged as an error.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The search compiler or catalog populate step failed inside a
    /// worker job.
    #[error("search failed: {0}")]
    Search(#[from] sqlitely_search::SearchError),

    /// A catalog operation inside a worker job failed.
    #[error("catalog operation failed: {0}")]
    Catalog(#[from] sqlitely_catalog::CatalogError),

    /// SQLite returned a non-OK status during a worker's own query.
    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// A filesystem operation (folder scan, checksum) failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The embedded analyzer binary could not be spawned or exited with
    /// a non-zero status.
    #[error("analyzer failed: {0}")]
    Analyzer(String),

    /// The analyzer's stdout did not match the expected `INSERT INTO
    /// space_used VALUES (...)` row shape.
    #[error("could not parse analyzer output: {0}")]
    AnalyzerOutput(String),
}

pub type Result<T> = std::result::Result<T, WorkerError>;
