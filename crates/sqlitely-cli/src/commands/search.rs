//! `sqlitely search` -- compile and run a Google-style search expression.

use anyhow::Result;
use rusqlite::Connection;
use sqlitely_catalog::Catalog;
use sqlitely_search::SearchCompiler;

use crate::cli::SearchArgs;
use crate::config::RuntimeConfig;
use crate::output::print_rows;

pub fn run(conn: &Connection, args: &SearchArgs, config: &RuntimeConfig, json: bool) -> Result<()> {
    let catalog = Catalog::populate_all(conn)?;

    let Some(table) = &args.table else {
        // No target item: just show what the query parsed to.
        let compiled = SearchCompiler::compile(&args.query, None)?;
        println!("words: {:?}", compiled.words);
        println!("keywords: {:?}", compiled.keywords);
        return Ok(());
    };

    let item = catalog.get(table).ok_or_else(|| anyhow::anyhow!("{table} not found in schema"))?;
    let compiled = SearchCompiler::compile(&args.query, Some(item))?;
    if compiled.sql.is_empty() {
        println!("(search excluded by table:/view: keyword)");
        return Ok(());
    }

    let limit = args.limit.unwrap_or(config.search_result_cap);
    let sql_with_limit = format!("{} LIMIT {}", compiled.sql, limit);
    let mut stmt = conn.prepare(&sql_with_limit)?;
    let col_count = stmt.column_count();
    let headers: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let param_refs: Vec<(&str, &dyn rusqlite::ToSql)> =
        compiled.params.iter().map(|(name, value)| (name.as_str(), value as &dyn rusqlite::ToSql)).collect();
    let mut query_rows = stmt.query(param_refs.as_slice())?;

    let mut rows = Vec::new();
    while let Some(row) = query_rows.next()? {
        let mut cells = Vec::with_capacity(col_count);
        for i in 0..col_count {
            let v: rusqlite::types::Value = row.get(i)?;
            cells.push(format_value(&v));
        }
        rows.push(cells);
    }

    print_rows(&headers, &rows, json);
    Ok(())
}

fn format_value(v: &rusqlite::types::Value) -> String {
    match v {
        rusqlite::types::Value::Null => String::new(),
        rusqlite::types::Value::Integer(i) => i.to_string(),
        rusqlite::types::Value::Real(r) => r.to_string(),
        rusqlite::types::Value::Text(t) => t.clone(),
        rusqlite::types::Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn_with_data() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO widgets (name) VALUES ('red gear'), ('blue cog');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn search_without_table_reports_parsed_words() {
        let conn = conn_with_data();
        let args = SearchArgs { query: "foo bar".into(), table: None, limit: Some(10) };
        // Just exercises the no-table path end to end without panicking;
        // output shape is covered by sqlitely-search's own unit tests.
        run(&conn, &args, &RuntimeConfig::default(), false).unwrap();
    }

    #[test]
    fn search_with_unknown_table_errors() {
        let conn = conn_with_data();
        let args = SearchArgs { query: "gear".into(), table: Some("nope".into()), limit: Some(10) };
        assert!(run(&conn, &args, &RuntimeConfig::default(), false).is_err());
    }

    #[test]
    fn search_with_table_returns_matching_rows() {
        let conn = conn_with_data();
        let args = SearchArgs { query: "gear".into(), table: Some("widgets".into()), limit: Some(10) };
        run(&conn, &args, &RuntimeConfig::default(), true).unwrap();
    }

    #[test]
    fn search_falls_back_to_configured_result_cap_when_limit_omitted() {
        let conn = conn_with_data();
        let args = SearchArgs { query: "gear".into(), table: Some("widgets".into()), limit: None };
        let config = RuntimeConfig { search_result_cap: 1, ..RuntimeConfig::default() };
        run(&conn, &args, &config, false).unwrap();
    }
}
