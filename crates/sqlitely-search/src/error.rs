//! Search compiler error types.

/// Errors that can occur while compiling a search query.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// An unterminated quoted phrase or parenthesis group.
    #[error("unterminated {what} starting at offset {offset}")]
    Unterminated { what: &'static str, offset: usize },

    /// The requested item has no catalog column list to search.
    #[error("{0} has no columns to search")]
    NoColumns(String),
}

pub type Result<T> = std::result::Result<T, SearchError>;
