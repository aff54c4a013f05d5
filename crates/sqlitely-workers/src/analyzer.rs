//! Analyzer worker: invokes the embedded page-size analyzer binary and
//! parses its output.
//!
//! Subprocess *discovery* (finding the analyzer on disk) is a GUI/config
//! concern; this worker only knows how to run a given path
//! and parse what comes back.

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{Result, WorkerError};
use crate::worker::{CancelToken, Outcome};

/// One row of the analyzer's `space_used` output.
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceUsed {
    pub name: String,
    pub tblname: String,
    pub is_index: bool,
    pub compressed_size: u64,
}

/// Runs `analyzer_path database_path`, parses its stdout, and reports
/// per-table/per-index size records. The spawned process is killed as
/// soon as `token` is observed cancelled.
pub fn run_analyzer_job(analyzer_path: &Path, database_path: &Path, token: &CancelToken) -> Outcome<Vec<SpaceUsed>> {
    match analyze(analyzer_path, database_path, token) {
        Ok(Some(rows)) => Outcome::Done(rows),
        Ok(None) => Outcome::Cancelled,
        Err(e) => Outcome::Error(e),
    }
}

fn analyze(analyzer_path: &Path, database_path: &Path, token: &CancelToken) -> Result<Option<Vec<SpaceUsed>>> {
    debug!(analyzer = %analyzer_path.display(), db = %database_path.display(), "spawning analyzer");
    let mut child = Command::new(analyzer_path)
        .arg(database_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| WorkerError::Analyzer(format!("failed to spawn {}: {e}", analyzer_path.display())))?;
    debug!(pid = child.id(), "analyzer running");

    let stdout = child.stdout.take().expect("piped stdout");
    let reader = BufReader::new(stdout);
    let mut lines = Vec::new();
    for line in reader.lines() {
        if token.is_cancelled() {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        lines.push(line.map_err(WorkerError::Io)?);
    }

    let status = child.wait().map_err(WorkerError::Io)?;
    if !status.success() {
        return Err(WorkerError::Analyzer(format!("analyzer exited with {status}")));
    }
    parse_space_used(&lines).map(Some)
}

/// Parses the analyzer's stdout: comment lines begin with `/**`; the
/// first non-comment statement is `space_used(name, tblname, is_index,
/// compressed_size, ...)` rows, one `INSERT INTO space_used VALUES (...)`
/// per line (the shape `sqlite3_analyzer`/`dbstat`-derived tools emit).
fn parse_space_used(lines: &[String]) -> Result<Vec<SpaceUsed>> {
    let mut rows = Vec::new();
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("/**") || trimmed.starts_with('*') {
            continue;
        }
        if let Some(row) = parse_insert_values(trimmed)? {
            rows.push(row);
        }
    }
    Ok(rows)
}

fn parse_insert_values(line: &str) -> Result<Option<SpaceUsed>> {
    let Some(open) = line.find('(') else { return Ok(None) };
    let Some(close) = line.rfind(')') else { return Ok(None) };
    if close <= open {
        return Ok(None);
    }
    let inner = &line[open + 1..close];
    let fields: Vec<&str> = inner.split(',').map(|f| f.trim().trim_matches('\'').trim_matches('"')).collect();
    if fields.len() < 4 {
        return Err(WorkerError::AnalyzerOutput(format!("expected >=4 fields in `{line}`")));
    }
    let is_index = fields[2].eq_ignore_ascii_case("true") || fields[2] == "1";
    let compressed_size = fields[3]
        .parse::<u64>()
        .map_err(|_| WorkerError::AnalyzerOutput(format!("non-numeric compressed_size in `{line}`")))?;
    Ok(Some(SpaceUsed {
        name: fields[0].to_string(),
        tblname: fields[1].to_string(),
        is_index,
        compressed_size,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_insert_style_space_used_rows() {
        let lines = vec![
            "/** sqlite3_analyzer output */".to_string(),
            "INSERT INTO space_used VALUES('widgets','widgets',0,4096);".to_string(),
            "INSERT INTO space_used VALUES('widgets_ix','widgets',1,1024);".to_string(),
        ];
        let rows = parse_space_used(&lines).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], SpaceUsed { name: "widgets".into(), tblname: "widgets".into(), is_index: false, compressed_size: 4096 });
        assert!(rows[1].is_index);
    }

    #[test]
    fn rejects_malformed_row() {
        let lines = vec!["INSERT INTO space_used VALUES('only_one_field');".to_string()];
        assert!(parse_space_used(&lines).is_err());
    }

    #[test]
    fn unparseable_path_reports_analyzer_error() {
        let token = CancelToken::new(std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false)));
        let outcome =
            run_analyzer_job(Path::new("/nonexistent/analyzer/binary"), Path::new("/tmp/does-not-matter.db"), &token);
        assert!(matches!(outcome, Outcome::Error(_)));
    }
}
