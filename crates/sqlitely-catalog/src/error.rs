//! Catalog error types.

/// Errors that can occur while populating or querying the schema catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// `populate` could not read `sqlite_master`.
    #[error("failed to read sqlite_master: {0}")]
    Query(#[from] rusqlite::Error),

    /// A `sqlite_master` row's `sql` column failed to parse.
    #[error("failed to parse schema object {name} ({category}): {source}")]
    Parse {
        /// Object name from `sqlite_master.name`.
        name: String,
        /// Object category from `sqlite_master.type`.
        category: String,
        /// Underlying grammar error.
        #[source]
        source: sqlitely_grammar::ParseError,
    },

    /// The requested item does not exist in the catalog.
    #[error("{entity} not found: {name}")]
    NotFound {
        /// The kind of entity (e.g. "table", "view").
        entity: String,
        /// The identifier that was looked up.
        name: String,
    },

    /// An item is already locked by a different operation.
    #[error("{name} is locked: {reason}")]
    Locked {
        /// Name of the locked item.
        name: String,
        /// Reason the lock was taken.
        reason: String,
    },
}
