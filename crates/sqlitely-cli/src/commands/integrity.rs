//! `sqlitely integrity` -- run `PRAGMA integrity_check`.

use anyhow::Result;
use rusqlite::Connection;
use sqlitely_catalog::Catalog;

use crate::output::print_value;

pub fn run(conn: &Connection, json: bool) -> Result<()> {
    let report = Catalog::integrity_check(conn)?;
    if report.is_ok() {
        println!("ok");
    } else {
        print_value(&report.0, json);
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_database_reports_ok() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (a INT)", []).unwrap();
        let report = Catalog::integrity_check(&conn).unwrap();
        assert!(report.is_ok());
    }
}
