//! `sqlitely alter` -- plan (and optionally run) a table schema change.
//!
//! The caller supplies the table's new shape as a `CREATE TABLE`
//! statement; this command maps each new column back to the old one it
//! came from by name (falling back to positional matching), builds a
//! [`TableEdit`], and hands it to [`AlterPlanner`]. A real UI (the grid's
//! schema editor) would track column identity directly instead of
//! re-deriving it from two texts -- see `sqlitely-alter`'s `TableEdit`
//! doc comment.

use anyhow::{anyhow, Result};
use rusqlite::Connection;
use sqlitely_alter::{AlterPlanner, RuntimeCapabilities, TableEdit};
use sqlitely_catalog::Catalog;
use sqlitely_grammar::ast::{CreateTable, Stmt};
use sqlitely_grammar::{parse, Category};

use crate::cli::AlterArgs;

pub fn run(conn: &Connection, args: &AlterArgs, json: bool) -> Result<()> {
    let catalog = Catalog::populate_all(conn)?;
    let old = catalog.get(&args.table).ok_or_else(|| anyhow!("{} not found in schema", args.table))?;
    if old.category != Category::Table {
        return Err(anyhow!("{} is a {}, not a table", args.table, old.category.as_str()));
    }

    let new_stmt = parse(&args.new_sql, Some(Category::Table))?;
    let new_table = match &new_stmt {
        Stmt::CreateTable(t) => t,
        _ => return Err(anyhow!("--to must be a CREATE TABLE statement")),
    };

    let column_origin = match_columns(old, new_table);
    let edit = TableEdit { old, new: new_table, column_origin };

    let caps = RuntimeCapabilities::detect(conn)?;
    let plan = AlterPlanner::plan(conn, &edit, &catalog, &caps)?;

    if json {
        let steps: Vec<_> = plan.steps.iter().map(|s| serde_json::json!({"kind": format!("{:?}", s.kind), "sql": s.sql})).collect();
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({"simple": plan.is_simple(), "steps": steps}))?);
    } else {
        println!("plan for {} ({}):", args.table, if plan.is_simple() { "simple" } else { "complex rebuild" });
        for step in &plan.steps {
            println!("  [{:?}] {}", step.kind, step.sql);
        }
    }

    if args.execute {
        AlterPlanner::execute(&plan, conn)?;
        println!("executed.");
    } else {
        println!("(dry run; pass --execute to apply)");
    }
    Ok(())
}

/// Matches each column of `new` back to a column of `old`'s current
/// definition by case-insensitive name, then falls back to position for
/// any new column whose name doesn't appear in `old` at all.
fn match_columns(old: &sqlitely_catalog::SchemaItem, new: &CreateTable) -> Vec<Option<usize>> {
    let old_table = match &old.meta {
        Some(Stmt::CreateTable(t)) => t,
        _ => return vec![None; new.columns.len()],
    };
    new.columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            old_table
                .columns
                .iter()
                .position(|oc| oc.name.eq_ignore_ascii_case(&col.name))
                .or_else(|| old_table.columns.get(i).map(|_| i))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (a INT, b INT)", []).unwrap();
        conn.execute("INSERT INTO t VALUES (1, 2)", []).unwrap();
        conn
    }

    #[test]
    fn dry_run_does_not_touch_the_database() {
        let conn = setup();
        let args = AlterArgs { table: "t".into(), new_sql: "CREATE TABLE t (a INT, b INT, c TEXT)".into(), execute: false };
        run(&conn, &args, false).unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
        let has_c: Result<i64, _> = conn.query_row("SELECT c FROM t", [], |r| r.get(0));
        assert!(has_c.is_err(), "column should not exist before --execute");
    }

    #[test]
    fn execute_applies_the_simple_add_column_plan() {
        let conn = setup();
        let args =
            AlterArgs { table: "t".into(), new_sql: "CREATE TABLE t (a INT, b INT, c TEXT DEFAULT 'x')".into(), execute: true };
        run(&conn, &args, false).unwrap();
        let c: String = conn.query_row("SELECT c FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(c, "x");
    }

    #[test]
    fn rejects_non_table_targets() {
        let conn = setup();
        conn.execute("CREATE VIEW v AS SELECT a FROM t", []).unwrap();
        let args = AlterArgs { table: "v".into(), new_sql: "CREATE TABLE v (a INT)".into(), execute: false };
        assert!(run(&conn, &args, false).is_err());
    }

    #[test]
    fn rejects_unknown_table() {
        let conn = setup();
        let args = AlterArgs { table: "nope".into(), new_sql: "CREATE TABLE nope (a INT)".into(), execute: false };
        assert!(run(&conn, &args, false).is_err());
    }
}
