//! Black-box tests driving the `sqlitely` binary end to end, via
//! `assert_cmd`/`predicates` over a real process instead of calling
//! `commands::*::run` in-process.

use assert_cmd::Command;
use predicates::prelude::*;
use rusqlite::Connection;

fn seeded_db() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let conn = Connection::open(dir.path().join("test.db")).unwrap();
    conn.execute_batch(
        "CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT);
         INSERT INTO widgets (name) VALUES ('red gear'), ('blue cog');",
    )
    .unwrap();
    dir
}

fn sqlitely() -> Command {
    Command::cargo_bin("sqlitely").unwrap()
}

#[test]
fn schema_lists_the_seeded_table() {
    let dir = seeded_db();
    sqlitely()
        .args(["--db", dir.path().join("test.db").to_str().unwrap(), "schema"])
        .assert()
        .success()
        .stdout(predicate::str::contains("widgets"));
}

#[test]
fn integrity_reports_ok_on_a_healthy_database() {
    let dir = seeded_db();
    sqlitely()
        .args(["--db", dir.path().join("test.db").to_str().unwrap(), "integrity"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));
}

#[test]
fn corrupt_database_file_is_a_clean_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("not-a-database.db");
    std::fs::write(&path, b"this is not a sqlite file").unwrap();
    sqlitely()
        .args(["--db", path.to_str().unwrap(), "--json", "schema"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn grid_shows_inserted_rows() {
    let dir = seeded_db();
    sqlitely()
        .args(["--db", dir.path().join("test.db").to_str().unwrap(), "grid", "widgets"])
        .assert()
        .success()
        .stdout(predicate::str::contains("red gear"));
}

#[test]
fn completion_generates_a_script_without_touching_any_database() {
    sqlitely()
        .args(["--db", "unused.db", "completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sqlitely"));
}
