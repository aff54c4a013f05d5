//! Alter planner error types.

/// Errors that can occur while planning or executing a schema alteration.
#[derive(Debug, thiserror::Error)]
pub enum AlterError {
    /// The item being altered (or one of its dependents) is locked.
    #[error("{name} is locked: {reason}")]
    Locked { name: String, reason: String },

    /// The requested item does not exist in the catalog.
    #[error("{entity} not found: {name}")]
    NotFound { entity: String, name: String },

    /// A proposed edit cannot be expressed by either alter path (e.g. a
    /// `WITHOUT ROWID` toggle with no rebuild possible, which cannot
    /// happen in practice but is guarded against explicitly).
    #[error("cannot plan alter: {0}")]
    Unplannable(String),

    /// Regenerating SQL for a rebuilt statement failed.
    #[error("failed to generate SQL: {0}")]
    Generate(#[from] sqlitely_grammar::generator::GenerateError),

    /// Parsing a dependent's SQL failed while rewriting it.
    #[error("failed to parse dependent SQL: {0}")]
    Parse(#[from] sqlitely_grammar::parser::ParseError),

    /// SQLite returned a non-OK status while executing a planned
    /// statement. The offending SQL travels with the error.
    #[error("execution of `{sql}` failed: {source}")]
    Execution {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A PRAGMA or introspection query failed outside of plan execution
    /// (e.g. detecting runtime capabilities).
    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// The item being planned for isn't a table, or its catalog entry
    /// never parsed.
    #[error("{name} is not a parsed table")]
    NotATable { name: String },

    /// The proposed schema would leave the table with no columns at all;
    /// SQLite rejects `CREATE TABLE t ()`.
    #[error("{name} would have no columns left")]
    NoColumns { name: String },
}

pub type Result<T> = std::result::Result<T, AlterError>;
