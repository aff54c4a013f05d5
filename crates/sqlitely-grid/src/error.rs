//! Grid model error types.

/// Errors that can occur while constructing, seeking, or committing a
/// [`crate::GridTable`].
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// The underlying cursor or a commit/rollback statement failed.
    #[error("execution of `{sql}` failed: {source}")]
    Execution {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A PRAGMA or introspection query (row count estimate, column list)
    /// failed outside of cursor iteration.
    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// The grid was constructed over a category/name the catalog does not
    /// know about.
    #[error("{entity} not found: {name}")]
    NotFound { entity: String, name: String },

    /// An edit was attempted on a grid backed by a view or a raw query,
    /// neither of which accepts writes.
    #[error("{0} is read-only")]
    ReadOnly(String),

    /// A row index was out of range for the current seek position.
    #[error("row {0} is not available (seek further first)")]
    RowNotSeeked(usize),

    /// A table has no usable key (no single-column PK and no rowid) so
    /// `commit`/`delete_cascade` cannot identify its rows.
    #[error("table {0} has no primary key or rowid to identify rows by")]
    NoRowIdentity(String),

    /// A related table needed by cascading delete is currently locked.
    #[error("{name} is locked: {reason}, cannot delete")]
    Locked { name: String, reason: String },
}

pub type Result<T> = std::result::Result<T, GridError>;
