//! Subcommand implementations, one module per [`crate::cli::Commands`]
//! variant.

pub mod alter;
pub mod grid;
pub mod integrity;
pub mod schema;
pub mod search;
