//! `sqlitely grid` -- show rows of a table or view through the grid
//! model, applying any requested filters/sort before seeking.

use anyhow::{anyhow, Result};
use rusqlite::Connection;
use sqlitely_catalog::Catalog;
use sqlitely_grammar::Category;
use sqlitely_grid::{GridSource, GridTable};

use crate::cli::GridArgs;
use crate::config::RuntimeConfig;
use crate::output::print_rows;

pub fn run(conn: &Connection, args: &GridArgs, config: &RuntimeConfig, db_path: &str, json: bool) -> Result<()> {
    let catalog = Catalog::populate_all(conn)?;
    let item = catalog.get(&args.table).ok_or_else(|| anyhow!("{} not found in schema", args.table))?;
    let category = item.category;
    if category != Category::Table && category != Category::View {
        return Err(anyhow!("{} is a {}, not a table or view", args.table, category.as_str()));
    }

    let file_size_bytes = std::fs::metadata(db_path).ok().map(|m| m.len());
    let mut grid = GridTable::open_with_size_hint(
        conn,
        GridSource::Table { category, name: args.table.clone() },
        Some(&catalog),
        file_size_bytes,
        config.page_size_threshold_bytes,
    )?;

    for raw_filter in &args.filters {
        let (column, value) = raw_filter
            .split_once('=')
            .ok_or_else(|| anyhow!("filter `{raw_filter}` must be `column=value`"))?;
        grid.set_filter(column, value);
    }
    if let Some(sort_col) = &args.sort {
        grid.toggle_sort(conn, sort_col)?;
    }

    grid.seek_to(conn, args.limit.saturating_sub(1))?;

    let headers: Vec<String> = grid.columns().iter().map(|c| c.name.clone()).collect();
    let mut rows = Vec::new();
    for i in 0..args.limit.min(grid.visible_row_count()) {
        let Some(row) = grid.row(conn, i)? else { break };
        let cells: Vec<String> = headers.iter().map(|h| row.get(h).map(|v| v.to_string()).unwrap_or_default()).collect();
        rows.push(cells);
    }

    print_rows(&headers, &rows, json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn_with_data() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT, qty INTEGER);
             INSERT INTO widgets (name, qty) VALUES ('gear', 3), ('cog', 9), ('bolt', 1);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn grid_lists_rows_up_to_limit() {
        let conn = conn_with_data();
        let args = GridArgs { table: "widgets".into(), limit: 2, filters: vec![], sort: None };
        run(&conn, &args, &RuntimeConfig::default(), ":memory:", false).unwrap();
    }

    #[test]
    fn grid_rejects_unknown_table() {
        let conn = conn_with_data();
        let args = GridArgs { table: "nope".into(), limit: 2, filters: vec![], sort: None };
        assert!(run(&conn, &args, &RuntimeConfig::default(), ":memory:", false).is_err());
    }

    #[test]
    fn grid_rejects_malformed_filter() {
        let conn = conn_with_data();
        let args = GridArgs { table: "widgets".into(), limit: 10, filters: vec!["noequals".into()], sort: None };
        assert!(run(&conn, &args, &RuntimeConfig::default(), ":memory:", false).is_err());
    }

    #[test]
    fn grid_applies_filter_and_sort() {
        let conn = conn_with_data();
        let args =
            GridArgs { table: "widgets".into(), limit: 10, filters: vec!["name=cog".into()], sort: Some("qty".into()) };
        run(&conn, &args, &RuntimeConfig::default(), ":memory:", true).unwrap();
    }
}
