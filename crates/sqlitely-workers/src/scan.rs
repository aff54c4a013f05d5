//! Folder scan and detector workers: walk a directory tree looking for
//! SQLite databases.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::worker::{CancelToken, Outcome};

const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// A batch of discovered candidate database files, delivered as the scan
/// descends the tree.
#[derive(Debug, Clone, Default)]
pub struct ScanChunk {
    pub paths: Vec<PathBuf>,
}

/// Final tally once a scan finishes or is cancelled mid-walk.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    pub files_examined: usize,
    pub matches: usize,
}

/// How a scan decides a file is a candidate database.
pub struct ScanOptions {
    /// Restrict to these extensions (case-insensitive, without the dot).
    /// Empty means "any extension, header check only".
    pub extensions: Vec<String>,
    /// How many paths to accumulate before emitting a [`ScanChunk`].
    pub batch_size: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self { extensions: Vec::new(), batch_size: 32 }
    }
}

/// Walks `root` depth-first, testing every regular file for the SQLite
/// magic header (and, if `opts.extensions` is non-empty, a matching
/// extension), delivering batches of hits via `progress`.
pub fn run_folder_scan(
    root: &Path,
    opts: &ScanOptions,
    token: &CancelToken,
    progress: &mut dyn FnMut(ScanChunk),
) -> Outcome<ScanSummary> {
    run_multi_root_scan(std::slice::from_ref(&root.to_path_buf()), opts, token, progress)
}

/// Like [`run_folder_scan`] but walks several roots in order, stopping
/// early on cancellation. Used by the detector worker to search
/// known user-data directories before falling back to the working
/// directory.
pub fn run_multi_root_scan(
    roots: &[PathBuf],
    opts: &ScanOptions,
    token: &CancelToken,
    progress: &mut dyn FnMut(ScanChunk),
) -> Outcome<ScanSummary> {
    let mut summary = ScanSummary::default();
    let mut pending = Vec::new();
    for root in roots {
        if token.is_cancelled() {
            return Outcome::Cancelled;
        }
        match walk(root, opts, token, &mut summary, &mut pending, progress) {
            Ok(true) => {}
            Ok(false) => return Outcome::Cancelled,
            Err(e) => return Outcome::Error(e),
        }
    }
    if !pending.is_empty() {
        progress(ScanChunk { paths: std::mem::take(&mut pending) });
    }
    Outcome::Done(summary)
}

/// Returns `Ok(false)` on cancellation, `Ok(true)` on a completed walk.
fn walk(
    dir: &Path,
    opts: &ScanOptions,
    token: &CancelToken,
    summary: &mut ScanSummary,
    pending: &mut Vec<PathBuf>,
    progress: &mut dyn FnMut(ScanChunk),
) -> Result<bool> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        // A directory we can't read (permissions, race with deletion) is
        // skipped rather than aborting the whole scan.
        Err(_) => return Ok(true),
    };
    for entry in entries {
        if token.is_cancelled() {
            return Ok(false);
        }
        let entry = entry?;
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(_) => continue,
        };
        if file_type.is_dir() {
            if !walk(&path, opts, token, summary, pending, progress)? {
                return Ok(false);
            }
            continue;
        }
        if !file_type.is_file() {
            continue;
        }
        summary.files_examined += 1;
        if !opts.extensions.is_empty() && !has_allowed_extension(&path, &opts.extensions) {
            continue;
        }
        if is_sqlite_file(&path) {
            debug!(path = %path.display(), "folder scan found candidate database");
            summary.matches += 1;
            pending.push(path);
            if pending.len() >= opts.batch_size {
                progress(ScanChunk { paths: std::mem::take(pending) });
            }
        }
    }
    Ok(true)
}

fn has_allowed_extension(path: &Path, extensions: &[String]) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Tests whether `path` begins with the SQLite 3 magic header
/// (`"SQLite format 3\0"`).
pub fn is_sqlite_file(path: &Path) -> bool {
    let mut buf = [0u8; 16];
    let Ok(mut file) = File::open(path) else { return false };
    match file.read_exact(&mut buf) {
        Ok(()) => &buf == SQLITE_MAGIC,
        Err(_) => false,
    }
}

/// Builds the root list for the detector worker: known user-data
/// directories (home directory, then its `Documents` subdirectory) ahead
/// of the current working directory, skipping any that don't exist.
/// Otherwise behaves exactly like [`run_folder_scan`].
pub fn detector_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(home) = std::env::home_dir() {
        let docs = home.join("Documents");
        if docs.is_dir() {
            roots.push(docs);
        }
        if home.is_dir() {
            roots.push(home);
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn new_token() -> CancelToken {
        CancelToken::new(Arc::new(AtomicBool::new(false)))
    }

    fn write_sqlite_stub(path: &Path) {
        let mut f = File::create(path).unwrap();
        f.write_all(SQLITE_MAGIC).unwrap();
        f.write_all(b"rest of header ignored").unwrap();
    }

    #[test]
    fn finds_sqlite_files_by_magic_header() {
        let dir = tempfile::tempdir().unwrap();
        write_sqlite_stub(&dir.path().join("a.db"));
        std::fs::write(dir.path().join("b.txt"), b"not a database").unwrap();
        let sub = dir.path().join("nested");
        std::fs::create_dir(&sub).unwrap();
        write_sqlite_stub(&sub.join("c.sqlite"));

        let token = new_token();
        let mut chunks = Vec::new();
        let outcome =
            run_folder_scan(dir.path(), &ScanOptions::default(), &token, &mut |c: ScanChunk| chunks.push(c));
        match outcome {
            Outcome::Done(summary) => {
                assert_eq!(summary.matches, 2);
                assert_eq!(summary.files_examined, 3);
            }
            _ => panic!("expected Done"),
        }
        let total_paths: usize = chunks.iter().map(|c| c.paths.len()).sum();
        assert_eq!(total_paths, 2);
    }

    #[test]
    fn extension_filter_excludes_matching_header_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        write_sqlite_stub(&dir.path().join("a.db"));
        write_sqlite_stub(&dir.path().join("b.dat"));
        let opts = ScanOptions { extensions: vec!["db".into()], batch_size: 32 };
        let token = new_token();
        let mut chunks = Vec::new();
        let outcome = run_folder_scan(dir.path(), &opts, &token, &mut |c| chunks.push(c));
        match outcome {
            Outcome::Done(summary) => assert_eq!(summary.matches, 1),
            _ => panic!("expected Done"),
        }
    }

    #[test]
    fn cancellation_stops_the_walk_early() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            write_sqlite_stub(&dir.path().join(format!("f{i}.db")));
        }
        let flag = Arc::new(AtomicBool::new(true));
        let token = CancelToken::new(flag);
        let mut chunks = Vec::new();
        let outcome = run_folder_scan(dir.path(), &ScanOptions::default(), &token, &mut |c| chunks.push(c));
        assert!(matches!(outcome, Outcome::Cancelled));
    }
}
