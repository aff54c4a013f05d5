//! Runtime dialect feature detection: `RENAME COLUMN` and cascading
//! rename need SQLite 3.25; view column definitions need 3.9. Below
//! these versions the planner falls back to the complex rebuild path.

use rusqlite::Connection;

use crate::error::Result;

/// Dialect features the connected SQLite library supports, used by
/// [`crate::AlterPlanner`] to decide whether a simple ALTER is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeCapabilities {
    pub rename_column: bool,
    pub cascading_rename: bool,
    pub view_columns: bool,
}

impl RuntimeCapabilities {
    /// Queries `sqlite_version()` and gates features against the parsed
    /// `(major, minor, patch)` triple.
    pub fn detect(conn: &Connection) -> Result<Self> {
        let version: String = conn.query_row("SELECT sqlite_version()", [], |r| r.get(0))?;
        let (major, minor, _patch) = parse_version(&version).unwrap_or((3, 0, 0));
        let at_least_3_25 = major > 3 || (major == 3 && minor >= 25);
        let at_least_3_9 = major > 3 || (major == 3 && minor >= 9);
        Ok(RuntimeCapabilities {
            rename_column: at_least_3_25,
            cascading_rename: at_least_3_25,
            view_columns: at_least_3_9,
        })
    }

    /// A capability set for the oldest supported runtime, useful for
    /// tests and for callers that want to force the complex rebuild path.
    pub fn minimal() -> Self {
        RuntimeCapabilities { rename_column: false, cascading_rename: false, view_columns: false }
    }
}

fn parse_version(v: &str) -> Option<(u32, u32, u32)> {
    let mut parts = v.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    Some((major, minor, patch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_capabilities_on_a_modern_bundled_sqlite() {
        let conn = Connection::open_in_memory().unwrap();
        let caps = RuntimeCapabilities::detect(&conn).unwrap();
        assert!(caps.rename_column);
        assert!(caps.cascading_rename);
        assert!(caps.view_columns);
    }

    #[test]
    fn parses_version_triples() {
        assert_eq!(parse_version("3.31.1"), Some((3, 31, 1)));
        assert_eq!(parse_version("3.9"), Some((3, 9, 0)));
        assert_eq!(parse_version("garbage"), None);
    }
}
