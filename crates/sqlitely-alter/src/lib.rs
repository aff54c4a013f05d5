//! Computes the minimal safe sequence of statements that turns a table's
//! current schema into a new one, preserving data and dependents: a
//! simple `ALTER TABLE` when SQLite's limited ALTER grammar can express
//! the change, a temp-table rebuild otherwise.
//!
//! SQLite itself offers no "diff two schemas" primitive, so a plan is
//! always built from an explicit before/after pair rather than derived
//! from a single statement the way [`sqlitely_grammar::parser`] works.

mod caps;
mod complex;
mod error;
mod rename;
mod simple;

use rusqlite::Connection;
use sqlitely_catalog::{Catalog, SchemaItem};
use sqlitely_grammar::ast::CreateTable;
use sqlitely_grammar::{Category, Stmt};
use tracing::{debug, warn};

pub use caps::RuntimeCapabilities;
pub use error::AlterError;

/// One statement in an [`AlterPlan`], tagged with the role it plays so a
/// caller can render a preview without re-deriving it from the SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Pragma,
    Savepoint,
    Release,
    CreateTempTable,
    CopyRows,
    DropDependent,
    DropTable,
    RenameTempToFinal,
    RecreateDependent,
    MasterPatch,
    /// A single `ALTER TABLE ... RENAME TO/COLUMN/ADD COLUMN` statement,
    /// the simple-ALTER path's only step shape.
    SimpleAlter,
}

#[derive(Debug, Clone)]
pub struct AlterStep {
    pub kind: StepKind,
    pub sql: String,
}

/// An ordered, already-validated sequence of statements that [`AlterPlanner::execute`]
/// runs on a single connection as one logical operation.
#[derive(Debug, Clone, Default)]
pub struct AlterPlan {
    pub steps: Vec<AlterStep>,
    /// Whether `PRAGMA foreign_keys` was ON before planning and must be
    /// restored after the rebuild.
    pub restores_foreign_keys: bool,
}

impl AlterPlan {
    pub fn is_simple(&self) -> bool {
        self.steps.iter().all(|s| matches!(s.kind, StepKind::Savepoint | StepKind::Release | StepKind::SimpleAlter))
    }
}

/// A caller-supplied description of a table edit: the schema as it
/// stands in the catalog, the schema it should become, and a mapping
/// from each new column back to the old column it came from.
///
/// SQLite's own `sqlite_master` carries no identity for a column beyond
/// its position, and a headless planner has no UI session tracking a
/// "stable id" the way the source tool's grid does (see DESIGN.md); the
/// caller -- whatever assembled the edit, typically the grid or a CLI
/// diff -- is the only party that knows whether the column at new index 2
/// is old column 1 renamed, or a fresh addition.
pub struct TableEdit<'a> {
    pub old: &'a SchemaItem,
    pub new: &'a CreateTable,
    /// `column_origin[i]` is `Some(j)` when `new.columns[i]` is the old
    /// table's `old.columns[j]` (possibly renamed/retyped), or `None`
    /// when it's a brand new column.
    pub column_origin: Vec<Option<usize>>,
}

impl<'a> TableEdit<'a> {
    pub fn old_table(&self) -> Option<&'a CreateTable> {
        match &self.old.meta {
            Some(Stmt::CreateTable(t)) => Some(t),
            _ => None,
        }
    }
}

/// Stateless entry point: every method takes the connection and catalog
/// it needs explicitly rather than holding them, since planning and
/// execution are typically separated by a confirmation prompt.
pub struct AlterPlanner;

impl AlterPlanner {
    /// Plans a table alteration, choosing the simple ALTER path when
    /// eligible and falling back to a full rebuild otherwise.
    pub fn plan(
        conn: &Connection,
        edit: &TableEdit,
        catalog: &Catalog,
        caps: &RuntimeCapabilities,
    ) -> error::Result<AlterPlan> {
        let old = edit.old_table().ok_or_else(|| AlterError::NotATable { name: edit.old.name.clone() })?;
        if let Some(reason) = catalog.get_lock(Category::Table, &old.name, None) {
            return Err(AlterError::Locked { name: old.name.clone(), reason: reason.to_string() });
        }

        if let Some(steps) = simple::try_simple_plan(edit, catalog, caps) {
            debug!(table = %old.name, operation = "alter.plan", "simple ALTER path eligible");
            return Ok(AlterPlan { steps, restores_foreign_keys: false });
        }

        debug!(table = %old.name, operation = "alter.plan", "falling back to complex rebuild");
        complex::complex_plan(conn, edit, catalog, &[])
    }

    /// Plans dropping `dropped` from the table described by `edit.old`,
    /// always via the complex rebuild path.
    /// `edit.new` must already omit the dropped columns; `dropped` names
    /// them so dependent tables/indexes/triggers can be rewritten.
    pub fn plan_drop_column(
        conn: &Connection,
        edit: &TableEdit,
        catalog: &Catalog,
        dropped: &[&str],
    ) -> error::Result<AlterPlan> {
        let old = edit.old_table().ok_or_else(|| AlterError::NotATable { name: edit.old.name.clone() })?;
        if let Some(reason) = catalog.get_lock(Category::Table, &old.name, None) {
            return Err(AlterError::Locked { name: old.name.clone(), reason: reason.to_string() });
        }
        complex::complex_plan(conn, edit, catalog, dropped)
    }

    /// Plans a bare rename of a table, index, view, or trigger with no
    /// other structural change.
    pub fn plan_rename(
        conn: &Connection,
        catalog: &Catalog,
        category: Category,
        name: &str,
        new_name: &str,
        caps: &RuntimeCapabilities,
    ) -> error::Result<AlterPlan> {
        if let Some(reason) = catalog.get_lock(category, name, None) {
            return Err(AlterError::Locked { name: name.to_string(), reason: reason.to_string() });
        }
        rename::plan_rename(conn, catalog, category, name, new_name, caps)
    }

    /// Runs every step of `plan` on `conn` inside the plan's own
    /// savepoint, rolling back to it and restoring the foreign-key
    /// pragma on the first failure.
    pub fn execute(plan: &AlterPlan, conn: &Connection) -> error::Result<()> {
        for step in &plan.steps {
            debug!(sql = %step.sql, kind = ?step.kind, operation = "alter.execute", "running step");
            if let Err(source) = conn.execute_batch(&step.sql) {
                warn!(sql = %step.sql, error = %source, operation = "alter.execute", "step failed, rolling back");
                let _ = conn.execute_batch("ROLLBACK TO alter_table; RELEASE alter_table;");
                if plan.restores_foreign_keys {
                    let _ = conn.execute_batch("PRAGMA foreign_keys = ON");
                }
                return Err(AlterError::Execution { sql: step.sql.clone(), source });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use sqlitely_catalog::Catalog;
    use sqlitely_grammar::ast::{Column, CreateTable};

    use super::*;
    use pretty_assertions::assert_eq;

    fn setup(stmts: &[&str]) -> (Connection, Catalog) {
        let conn = Connection::open_in_memory().unwrap();
        for s in stmts {
            conn.execute(s, []).unwrap();
        }
        let cat = Catalog::populate_all(&conn).unwrap();
        (conn, cat)
    }

    #[test]
    fn rename_column_with_dependents_takes_simple_path_and_cascades() {
        let (conn, cat) = setup(&[
            "CREATE TABLE t (a INT, b INT)",
            "CREATE INDEX ix ON t(a)",
            "CREATE VIEW v AS SELECT a FROM t",
        ]);
        let caps = RuntimeCapabilities::detect(&conn).unwrap();
        let old = cat.get("t").unwrap();
        let mut new = old_table(old).clone();
        new.columns[0].name = "a2".into();

        let edit = TableEdit { old, new: &new, column_origin: vec![Some(0), Some(1)] };
        let plan = AlterPlanner::plan(&conn, &edit, &cat, &caps).unwrap();
        assert!(plan.is_simple());

        AlterPlanner::execute(&plan, &conn).unwrap();
        conn.execute("SELECT a2 FROM v", []).unwrap();
        let ix_sql: String =
            conn.query_row("SELECT sql FROM sqlite_master WHERE name = 'ix'", [], |r| r.get(0)).unwrap();
        assert!(ix_sql.to_ascii_lowercase().contains("a2"));
    }

    #[test]
    fn drop_column_with_fk_strips_dependent_constraint() {
        let (conn, cat) = setup(&[
            "CREATE TABLE p (id INT PRIMARY KEY, label TEXT)",
            "CREATE TABLE c (pid INT REFERENCES p(id))",
        ]);
        conn.execute("INSERT INTO p VALUES (1, 'x')", []).unwrap();
        conn.execute("INSERT INTO c VALUES (1)", []).unwrap();

        let old = cat.get("p").unwrap();
        let mut new = old_table(old).clone();
        new.columns.retain(|c| c.name != "id");

        let edit = TableEdit { old, new: &new, column_origin: vec![Some(1)] };
        let plan = AlterPlanner::plan_drop_column(&conn, &edit, &cat, &["id"]).unwrap();
        assert!(!plan.is_simple());
        AlterPlanner::execute(&plan, &conn).unwrap();

        let c_sql: String =
            conn.query_row("SELECT sql FROM sqlite_master WHERE name = 'c'", [], |r| r.get(0)).unwrap();
        assert!(!c_sql.to_ascii_uppercase().contains("REFERENCES"));
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM c", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn dropping_the_only_column_is_rejected_before_emitting_invalid_sql() {
        let (conn, cat) = setup(&["CREATE TABLE p (id INT PRIMARY KEY)"]);
        let old = cat.get("p").unwrap();
        let mut new = old_table(old).clone();
        new.columns.retain(|c| c.name != "id");

        let edit = TableEdit { old, new: &new, column_origin: vec![] };
        let err = AlterPlanner::plan_drop_column(&conn, &edit, &cat, &["id"]).unwrap_err();
        assert!(matches!(err, AlterError::NoColumns { name } if name == "p"));
    }

    #[test]
    fn add_column_takes_simple_path() {
        let (conn, cat) = setup(&["CREATE TABLE t (a INT)", "INSERT INTO t VALUES (1)"]);
        let caps = RuntimeCapabilities::detect(&conn).unwrap();
        let old = cat.get("t").unwrap();
        let mut new = old_table(old).clone();
        new.columns.push(Column { name: "b".into(), r#type: Some("TEXT".into()), default: Some("'x'".into()), ..Default::default() });

        let edit = TableEdit { old, new: &new, column_origin: vec![Some(0), None] };
        let plan = AlterPlanner::plan(&conn, &edit, &cat, &caps).unwrap();
        assert!(plan.is_simple());
        assert_eq!(plan.steps.iter().filter(|s| s.kind == StepKind::SimpleAlter).count(), 1);

        AlterPlanner::execute(&plan, &conn).unwrap();
        let b: String = conn.query_row("SELECT b FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(b, "x");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn reorder_columns_takes_complex_path_and_preserves_values() {
        let (conn, cat) =
            setup(&["CREATE TABLE t (a INT, b INT)", "INSERT INTO t VALUES (1, 2)"]);
        let old = cat.get("t").unwrap();
        let mut new = old_table(old).clone();
        new.columns.swap(0, 1);

        let caps = RuntimeCapabilities::detect(&conn).unwrap();
        let edit = TableEdit { old, new: &new, column_origin: vec![Some(1), Some(0)] };
        let plan = AlterPlanner::plan(&conn, &edit, &cat, &caps).unwrap();
        assert!(!plan.is_simple());
        AlterPlanner::execute(&plan, &conn).unwrap();

        let (b, a): (i64, i64) = conn.query_row("SELECT b, a FROM t", [], |r| Ok((r.get(0)?, r.get(1)?))).unwrap();
        assert_eq!((b, a), (2, 1));
    }

    fn old_table(item: &SchemaItem) -> &CreateTable {
        match &item.meta {
            Some(Stmt::CreateTable(t)) => t,
            _ => panic!("not a table"),
        }
    }
}
