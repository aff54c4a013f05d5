//! Bespoke rename path for a table, index, view, or trigger renamed in
//! isolation, including the direct `sqlite_master` patch needed for
//! dependents the runtime can't cascade into itself.

use rusqlite::Connection;
use sqlitely_catalog::Catalog;
use sqlitely_grammar::ident::quote;
use sqlitely_grammar::transform::{transform, RenameSpec};
use sqlitely_grammar::{generate, Category, GenerateOptions};

use crate::caps::RuntimeCapabilities;
use crate::error::Result;
use crate::{AlterError, AlterPlan, AlterStep, StepKind};

pub(crate) fn plan_rename(
    conn: &Connection,
    catalog: &Catalog,
    category: Category,
    name: &str,
    new_name: &str,
    caps: &RuntimeCapabilities,
) -> Result<AlterPlan> {
    let item = catalog.get(name).ok_or_else(|| AlterError::NotATable { name: name.to_string() })?;
    if item.category != category {
        return Err(AlterError::NotATable { name: name.to_string() });
    }

    let mut steps = vec![AlterStep { kind: StepKind::Savepoint, sql: "SAVEPOINT alter_table".into() }];

    match category {
        Category::Table => {
            steps.push(AlterStep {
                kind: StepKind::SimpleAlter,
                sql: format!("ALTER TABLE {} RENAME TO {}", quote(name, false), quote(new_name, false)),
            });
        }
        _ => {
            // SQLite has no ALTER ... RENAME for indexes, views, or
            // triggers: drop and recreate under the new name.
            let stmt = item.meta.as_ref().ok_or_else(|| AlterError::NotATable { name: name.to_string() })?;
            let mut renamed = stmt.clone();
            *renamed.name_mut() = new_name.to_string();
            let sql = generate(&renamed, GenerateOptions::default())?;
            steps.push(AlterStep {
                kind: StepKind::DropDependent,
                sql: format!("DROP {} IF EXISTS {}", category.as_str().to_uppercase(), quote(name, false)),
            });
            steps.push(AlterStep { kind: StepKind::RecreateDependent, sql });
        }
    }

    let cascades_itself = category == Category::Table && caps.cascading_rename;
    if cascades_itself {
        steps.push(AlterStep { kind: StepKind::Release, sql: "RELEASE SAVEPOINT alter_table".into() });
        return Ok(AlterPlan { steps, restores_foreign_keys: false });
    }

    let renames = RenameSpec::new(name).rename_table(new_name).into_map();
    let dependents = catalog.get_related(category, name, false, false);
    if !dependents.is_empty() {
        let version: i64 = conn.query_row("PRAGMA schema_version", [], |r| r.get(0))?;
        steps.push(AlterStep { kind: StepKind::Pragma, sql: "PRAGMA writable_schema = ON".into() });
        for dep in dependents {
            if let Some(dep_stmt) = &dep.meta {
                let rewritten = transform(dep_stmt, name, &renames);
                let sql = generate(&rewritten, GenerateOptions::compact())?;
                steps.push(AlterStep {
                    kind: StepKind::MasterPatch,
                    sql: format!(
                        "UPDATE sqlite_master SET sql = {} WHERE type = '{}' AND name = {}",
                        sql_literal(&sql),
                        dep.category.as_str(),
                        sql_literal(&dep.name),
                    ),
                });
            }
        }
        steps.push(AlterStep { kind: StepKind::Pragma, sql: format!("PRAGMA schema_version = {}", version + 1) });
        steps.push(AlterStep { kind: StepKind::Pragma, sql: "PRAGMA writable_schema = OFF".into() });
    }

    steps.push(AlterStep { kind: StepKind::Release, sql: "RELEASE SAVEPOINT alter_table".into() });
    Ok(AlterPlan { steps, restores_foreign_keys: false })
}

fn sql_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use sqlitely_catalog::Catalog;

    use super::*;
    use crate::AlterPlanner;

    #[test]
    fn renames_index_via_drop_and_recreate() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (a INT)", []).unwrap();
        conn.execute("CREATE INDEX ix ON t(a)", []).unwrap();
        let cat = Catalog::populate_all(&conn).unwrap();
        let caps = RuntimeCapabilities::detect(&conn).unwrap();

        let plan = AlterPlanner::plan_rename(&conn, &cat, Category::Index, "ix", "ix2", &caps).unwrap();
        AlterPlanner::execute(&plan, &conn).unwrap();

        let cat2 = Catalog::populate_all(&conn).unwrap();
        assert!(cat2.get("ix2").is_some());
        assert!(cat2.get("ix").is_none());
    }

    #[test]
    fn renames_table_with_cascading_runtime() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (a INT)", []).unwrap();
        conn.execute("CREATE VIEW v AS SELECT a FROM t", []).unwrap();
        let cat = Catalog::populate_all(&conn).unwrap();
        let caps = RuntimeCapabilities::detect(&conn).unwrap();

        let plan = AlterPlanner::plan_rename(&conn, &cat, Category::Table, "t", "t2", &caps).unwrap();
        AlterPlanner::execute(&plan, &conn).unwrap();
        conn.execute("SELECT a FROM v", []).unwrap();
    }
}
