//! Search worker: runs a compiled search against one or more schema items
//! on a background thread, emitting chunks of matching rows as it goes.

use rusqlite::Connection;
use sqlitely_catalog::{Catalog, SchemaItem};
use sqlitely_search::SearchCompiler;
use tracing::debug;

use crate::error::{Result, WorkerError};
use crate::worker::{CancelToken, Outcome};

/// One page of search hits for a single schema item.
#[derive(Debug, Clone)]
pub struct SearchChunk {
    pub item: String,
    pub rows: Vec<Vec<rusqlite::types::Value>>,
}

/// Final frame delivered once every candidate item has been searched (or
/// the search was cancelled or hit its cap).
#[derive(Debug, Clone, Default)]
pub struct SearchSummary {
    pub items_searched: usize,
    pub total_hits: usize,
    pub capped: bool,
}

/// Searches `query` against every item in `catalog`, or just `scope` when
/// given, delivering one [`SearchChunk`] per matching item via `progress`
/// and a final [`SearchSummary`] as the job's `Done` outcome. Stops early
/// once `cap` rows have been found, marking the summary `capped`.
pub fn run_search_job(
    conn: &Connection,
    catalog: &Catalog,
    query: String,
    scope: Option<String>,
    cap: usize,
    token: &CancelToken,
    progress: &mut dyn FnMut(SearchChunk),
) -> Outcome<SearchSummary> {
    match search_impl(conn, catalog, &query, scope.as_deref(), cap, token, progress) {
        Ok(Some(summary)) => Outcome::Done(summary),
        Ok(None) => Outcome::Cancelled,
        Err(e) => Outcome::Error(e),
    }
}

fn search_impl(
    conn: &Connection,
    catalog: &Catalog,
    query: &str,
    scope: Option<&str>,
    cap: usize,
    token: &CancelToken,
    progress: &mut dyn FnMut(SearchChunk),
) -> Result<Option<SearchSummary>> {
    let targets: Vec<&SchemaItem> = match scope {
        Some(name) => catalog.get(name).into_iter().collect(),
        None => catalog.items().iter().collect(),
    };

    let mut summary = SearchSummary::default();
    for item in targets {
        if token.is_cancelled() {
            return Ok(None);
        }
        let compiled = SearchCompiler::compile(query, Some(item))?;
        if compiled.sql.is_empty() {
            continue;
        }
        debug!(sql = %compiled.sql, item = %item.name, "search worker executing query");
        let mut stmt = conn.prepare(&compiled.sql)?;
        let param_refs: Vec<(&str, &dyn rusqlite::ToSql)> =
            compiled.params.iter().map(|(name, value)| (name.as_str(), value as &dyn rusqlite::ToSql)).collect();
        let col_count = stmt.column_count();
        let mut rows = stmt.query(param_refs.as_slice())?;
        let mut chunk_rows = Vec::new();
        while let Some(row) = rows.next()? {
            if token.is_cancelled() {
                return Ok(None);
            }
            let mut values = Vec::with_capacity(col_count);
            for i in 0..col_count {
                values.push(row.get::<_, rusqlite::types::Value>(i)?);
            }
            chunk_rows.push(values);
            summary.total_hits += 1;
            if summary.total_hits >= cap {
                summary.capped = true;
                break;
            }
        }
        summary.items_searched += 1;
        if !chunk_rows.is_empty() {
            progress(SearchChunk { item: item.name.clone(), rows: chunk_rows });
        }
        if summary.capped {
            break;
        }
    }
    Ok(Some(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn new_token() -> CancelToken {
        CancelToken::new(Arc::new(AtomicBool::new(false)))
    }

    fn conn_with_data() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO widgets (name) VALUES ('red gear'), ('blue cog'), ('red cog');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn search_job_emits_chunk_and_summary() {
        let conn = conn_with_data();
        let catalog = Catalog::populate_all(&conn).unwrap();
        let token = new_token();
        let mut chunks = Vec::new();
        let outcome = run_search_job(&conn, &catalog, "red".into(), None, 1000, &token, &mut |c| chunks.push(c));
        match outcome {
            Outcome::Done(summary) => {
                assert_eq!(summary.total_hits, 2);
                assert!(!summary.capped);
            }
            _ => panic!("expected Done outcome"),
        }
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].rows.len(), 2);
    }

    #[test]
    fn search_job_respects_cap() {
        let conn = conn_with_data();
        let catalog = Catalog::populate_all(&conn).unwrap();
        let token = new_token();
        let mut chunks = Vec::new();
        let outcome = run_search_job(&conn, &catalog, "cog".into(), None, 1, &token, &mut |c| chunks.push(c));
        match outcome {
            Outcome::Done(summary) => {
                assert_eq!(summary.total_hits, 1);
                assert!(summary.capped);
            }
            _ => panic!("expected Done outcome"),
        }
    }
}
