//! Clap CLI definitions for the `sqlitely` command: global args plus
//! one subcommand per operation.

use clap::{Args, Parser, Subcommand};

/// sqlitely -- inspect and safely alter a SQLite database's schema.
#[derive(Parser, Debug)]
#[command(name = "sqlitely", about = "SQLite schema inspection and alteration tool", version, propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Global flags available to all subcommands.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to the SQLite database file.
    #[arg(long, global = true)]
    pub db: String,

    /// Output in JSON format instead of a formatted table.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose/debug logging.
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List schema items (tables, indexes, triggers, views).
    Schema(SchemaArgs),

    /// Compile and run a Google-style search expression.
    Search(SearchArgs),

    /// Show rows of a table or view through the grid model.
    Grid(GridArgs),

    /// Plan (and optionally execute) a table schema change.
    Alter(AlterArgs),

    /// Run `PRAGMA integrity_check` and report any failures.
    Integrity,

    /// Generate shell completion scripts.
    Completion(CompletionArgs),
}

#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Restrict to one category: table, index, trigger, or view.
    #[arg(long)]
    pub category: Option<String>,

    /// Restrict to a single item name.
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// The Google-style search expression.
    pub query: String,

    /// Restrict to a single table or view; without it, only `words`/
    /// `keywords` are reported.
    #[arg(long)]
    pub table: Option<String>,

    /// Maximum rows to print; defaults to the configured search result cap.
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct GridArgs {
    /// Table or view name.
    pub table: String,

    /// Maximum rows to print.
    #[arg(long, default_value_t = 50)]
    pub limit: usize,

    /// Column filter as `column=value` (repeatable).
    #[arg(long = "filter", value_name = "COLUMN=VALUE")]
    pub filters: Vec<String>,

    /// Column to sort by.
    #[arg(long)]
    pub sort: Option<String>,
}

#[derive(Args, Debug)]
pub struct AlterArgs {
    /// Existing table name as it appears in `sqlite_master`.
    pub table: String,

    /// The new `CREATE TABLE` statement the table should become.
    #[arg(long = "to")]
    pub new_sql: String,

    /// Actually run the plan instead of only printing it.
    #[arg(long)]
    pub execute: bool,
}

#[derive(Args, Debug)]
pub struct CompletionArgs {
    /// Shell to generate a completion script for.
    pub shell: clap_complete::Shell,
}
