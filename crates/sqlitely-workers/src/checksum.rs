//! Checksum worker: streams a file through MD5 and SHA-1 simultaneously
//! at 1 MiB blocks.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use md5::{Digest, Md5};
use sha1::Sha1;
use tracing::debug;

use crate::error::{Result, WorkerError};
use crate::worker::{CancelToken, Outcome};

const BLOCK_SIZE: usize = 1024 * 1024;

/// Both digests of a file, formatted as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksums {
    pub md5: String,
    pub sha1: String,
    pub bytes_read: u64,
}

/// Streams `path` through MD5 and SHA-1 concurrently, checking `token`
/// between blocks so a large file can be cancelled promptly.
pub fn run_checksum_job(path: &Path, token: &CancelToken) -> Outcome<Checksums> {
    match checksum(path, token) {
        Ok(Some(sums)) => Outcome::Done(sums),
        Ok(None) => Outcome::Cancelled,
        Err(e) => Outcome::Error(e),
    }
}

fn checksum(path: &Path, token: &CancelToken) -> Result<Option<Checksums>> {
    debug!(path = %path.display(), "checksum worker starting");
    let mut file = File::open(path).map_err(WorkerError::Io)?;
    let mut md5 = Md5::new();
    let mut sha1 = Sha1::new();
    let mut buf = vec![0u8; BLOCK_SIZE];
    let mut bytes_read: u64 = 0;

    loop {
        if token.is_cancelled() {
            return Ok(None);
        }
        let n = file.read(&mut buf).map_err(WorkerError::Io)?;
        if n == 0 {
            break;
        }
        md5.update(&buf[..n]);
        sha1.update(&buf[..n]);
        bytes_read += n as u64;
    }

    Ok(Some(Checksums { md5: hex(&md5.finalize()), sha1: hex(&sha1.finalize()), bytes_read }))
}

fn hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
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

    #[test]
    fn known_vector_matches_expected_digests() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::File::create(&path).unwrap().write_all(b"abc").unwrap();
        let token = new_token();
        let outcome = run_checksum_job(&path, &token);
        match outcome {
            Outcome::Done(sums) => {
                assert_eq!(sums.md5, "900150983cd24fb0d6963f7d28e17f72");
                assert_eq!(sums.sha1, "a9993e364706816aba3e25717850c26c9cd0d89d");
                assert_eq!(sums.bytes_read, 3);
            }
            _ => panic!("expected Done"),
        }
    }

    #[test]
    fn cancellation_before_first_block_yields_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        std::fs::write(&path, vec![0u8; BLOCK_SIZE * 2]).unwrap();
        let token = CancelToken::new(Arc::new(AtomicBool::new(true)));
        let outcome = run_checksum_job(&path, &token);
        assert!(matches!(outcome, Outcome::Cancelled));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let token = new_token();
        let outcome = run_checksum_job(Path::new("/nonexistent/path/file.bin"), &token);
        assert!(matches!(outcome, Outcome::Error(WorkerError::Io(_))));
    }
}
