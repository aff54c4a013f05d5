//! `sqlitely` -- inspect, search, grid-edit, and safely alter a SQLite
//! database's schema from the command line.
//!
//! Entry point: parse args, set up logging, open the one connection
//! every command shares, dispatch, and report errors uniformly whether
//! the output mode is JSON or plain text.

mod cli;
mod commands;
mod config;
mod output;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use config::RuntimeConfig;
use tracing::debug;

fn main() {
    let cli = Cli::parse();

    if cli.global.verbose {
        tracing_subscriber::fmt().with_env_filter("sqlitely=debug").with_writer(std::io::stderr).init();
    }

    let result = run(&cli);

    if let Err(e) = result {
        if cli.global.json {
            let err_json = serde_json::json!({ "error": format!("{:#}", e) });
            if let Ok(s) = serde_json::to_string_pretty(&err_json) {
                eprintln!("{s}");
            }
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    // Shell completion generation needs neither a database nor config.
    if let Commands::Completion(args) = &cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(args.shell, &mut cmd, name, &mut std::io::stdout());
        return Ok(());
    }

    let config = RuntimeConfig::load()?;
    debug!(db = %cli.global.db, "opening database");
    let conn = rusqlite::Connection::open(&cli.global.db)?;
    let json = cli.global.json;

    debug!(command = ?cli.command, "dispatching command");
    match &cli.command {
        Commands::Schema(args) => commands::schema::run(&conn, args, &config, json),
        Commands::Search(args) => commands::search::run(&conn, args, &config, json),
        Commands::Grid(args) => commands::grid::run(&conn, args, &config, &cli.global.db, json),
        Commands::Alter(args) => commands::alter::run(&conn, args, json),
        Commands::Integrity => commands::integrity::run(&conn, json),
        Commands::Completion(_) => unreachable!("handled above"),
    }
}
