//! Complex-ALTER rebuild path: the fallback whenever the simple path
//! can't express a change, and the only path for dropping a column.

use std::collections::HashSet;

use rusqlite::Connection;
use sqlitely_catalog::Catalog;
use sqlitely_grammar::ast::{CreateTable, Stmt, TableConstraint};
use sqlitely_grammar::ident::quote;
use sqlitely_grammar::transform::{transform, RenameSpec};
use sqlitely_grammar::{generate, Category, GenerateOptions};

use crate::error::Result;
use crate::{AlterPlan, AlterStep, StepKind, TableEdit};

pub(crate) fn complex_plan(
    conn: &Connection,
    edit: &TableEdit,
    catalog: &Catalog,
    dropped: &[&str],
) -> Result<AlterPlan> {
    let old = edit.old_table().ok_or_else(|| crate::AlterError::NotATable { name: edit.old.name.clone() })?;

    let fks_on: i64 = conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0))?;
    let fks_on = fks_on != 0;

    let mut steps = Vec::new();
    if fks_on {
        steps.push(AlterStep { kind: StepKind::Pragma, sql: "PRAGMA foreign_keys = OFF".into() });
    }
    steps.push(AlterStep { kind: StepKind::Savepoint, sql: "SAVEPOINT alter_table".into() });

    let mut existing: HashSet<String> = catalog.items().iter().map(|i| i.name.to_ascii_lowercase()).collect();

    rebuild_table(&mut steps, &mut existing, old, edit.new, &old.name, catalog, dropped)?;

    // Sibling tables whose own foreign key points at the dropped columns
    // need their FK constraint stripped and their own table rebuilt too.
    if !dropped.is_empty() {
        for other in catalog.items() {
            if other.category != Category::Table || other.name.eq_ignore_ascii_case(&old.name) {
                continue;
            }
            let Some(Stmt::CreateTable(other_table)) = &other.meta else { continue };
            let mut stripped = other_table.clone();
            if !strip_fk_to_dropped(&mut stripped, &old.name, dropped) {
                continue;
            }
            rebuild_table(&mut steps, &mut existing, other_table, &stripped, &other.name, catalog, &[])?;
        }
    }

    steps.push(AlterStep { kind: StepKind::Release, sql: "RELEASE SAVEPOINT alter_table".into() });
    if fks_on {
        steps.push(AlterStep { kind: StepKind::Pragma, sql: "PRAGMA foreign_keys = ON".into() });
    }

    Ok(AlterPlan { steps, restores_foreign_keys: fks_on })
}

/// Appends the temp-table rebuild sequence for one table: create under a
/// generated name, copy matching rows, drop owned/dependent objects
/// (rewriting or dropping them as `dropped` requires), drop the old
/// table, rename the temp table into place, and recreate what survived.
fn rebuild_table(
    steps: &mut Vec<AlterStep>,
    existing: &mut HashSet<String>,
    old: &CreateTable,
    new: &CreateTable,
    table_name: &str,
    catalog: &Catalog,
    dropped: &[&str],
) -> Result<()> {
    if new.columns.is_empty() {
        return Err(crate::AlterError::NoColumns { name: table_name.to_string() });
    }
    let tempname = unique_name(&new.name, existing);
    existing.insert(tempname.to_ascii_lowercase());
    let mut temp_table = new.clone();
    temp_table.name = tempname.clone();
    steps.push(AlterStep {
        kind: StepKind::CreateTempTable,
        sql: generate(&Stmt::CreateTable(temp_table), GenerateOptions::default())?,
    });

    let mut dst_cols = Vec::new();
    let mut src_cols = Vec::new();
    for old_col in &old.columns {
        if dropped.iter().any(|d| d.eq_ignore_ascii_case(&old_col.name)) {
            continue;
        }
        if let Some(new_col) = new.columns.iter().find(|c| c.name.eq_ignore_ascii_case(&old_col.name)) {
            src_cols.push(old_col.name.clone());
            dst_cols.push(new_col.name.clone());
        }
    }
    steps.push(AlterStep {
        kind: StepKind::CopyRows,
        sql: format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            quote(&tempname, false),
            dst_cols.iter().map(|c| quote(c, false)).collect::<Vec<_>>().join(", "),
            src_cols.iter().map(|c| quote(c, false)).collect::<Vec<_>>().join(", "),
            quote(table_name, false),
        ),
    });

    let owned = catalog.get_related(Category::Table, table_name, true, false);
    let referencing_views: Vec<_> = catalog
        .get_related(Category::Table, table_name, false, false)
        .into_iter()
        .filter(|i| i.category == Category::View)
        .collect();

    let mut to_recreate = Vec::new();
    for dep in owned.iter().chain(referencing_views.iter()) {
        let Some(stmt) = &dep.meta else { continue };
        match (dep.category, stmt) {
            (Category::Index, Stmt::CreateIndex(ix)) => {
                let touches_dropped =
                    ix.columns.iter().any(|c| c.name.as_deref().is_some_and(|n| dropped.iter().any(|d| d.eq_ignore_ascii_case(n))));
                steps.push(AlterStep {
                    kind: StepKind::DropDependent,
                    sql: format!("DROP INDEX IF EXISTS {}", quote(&dep.name, false)),
                });
                if !touches_dropped {
                    to_recreate.push(stmt.clone());
                }
            }
            (Category::Trigger, Stmt::CreateTrigger(tr)) => {
                steps.push(AlterStep {
                    kind: StepKind::DropDependent,
                    sql: format!("DROP TRIGGER IF EXISTS {}", quote(&dep.name, false)),
                });
                if !tr.columns.is_empty() && !dropped.is_empty() {
                    let shrunk: Vec<String> =
                        tr.columns.iter().filter(|c| !dropped.iter().any(|d| d.eq_ignore_ascii_case(c))).cloned().collect();
                    if shrunk.is_empty() {
                        continue; // fired only on dropped columns: drop, don't recreate
                    }
                    if shrunk.len() != tr.columns.len() {
                        let mut narrowed = tr.clone();
                        narrowed.columns = shrunk;
                        to_recreate.push(Stmt::CreateTrigger(narrowed));
                        continue;
                    }
                }
                to_recreate.push(stmt.clone());
            }
            (Category::View, Stmt::CreateView(_)) => {
                steps.push(AlterStep {
                    kind: StepKind::DropDependent,
                    sql: format!("DROP VIEW IF EXISTS {}", quote(&dep.name, false)),
                });
                to_recreate.push(stmt.clone());
            }
            _ => {}
        }
    }

    steps.push(AlterStep { kind: StepKind::DropTable, sql: format!("DROP TABLE {}", quote(table_name, false)) });
    steps.push(AlterStep {
        kind: StepKind::RenameTempToFinal,
        sql: format!("ALTER TABLE {} RENAME TO {}", quote(&tempname, false), quote(&new.name, false)),
    });

    let renames = if !new.name.eq_ignore_ascii_case(table_name) {
        RenameSpec::new(table_name).rename_table(new.name.clone()).into_map()
    } else {
        RenameSpec::new(table_name).into_map()
    };
    for stmt in &to_recreate {
        let rewritten = transform(stmt, table_name, &renames);
        steps.push(AlterStep { kind: StepKind::RecreateDependent, sql: generate(&rewritten, GenerateOptions::default())? });
    }

    Ok(())
}

/// Strips a foreign key on `table`'s columns that points at `target_table`
/// and any of `dropped`'s columns. Returns whether anything changed.
fn strip_fk_to_dropped(table: &mut CreateTable, target_table: &str, dropped: &[&str]) -> bool {
    let mut changed = false;
    for col in &mut table.columns {
        if let Some(fk) = &col.fk {
            if fk.table.eq_ignore_ascii_case(target_table) && fk.key.iter().any(|k| dropped.iter().any(|d| d.eq_ignore_ascii_case(k))) {
                col.fk = None;
                changed = true;
            }
        }
    }
    table.constraints.retain_mut(|c| {
        if let TableConstraint::ForeignKey { table: ftable, key, columns, .. } = c {
            if ftable.eq_ignore_ascii_case(target_table) && key.iter().any(|k| dropped.iter().any(|d| d.eq_ignore_ascii_case(k))) {
                changed = true;
                let keep: Vec<(String, String)> = columns
                    .iter()
                    .cloned()
                    .zip(key.iter().cloned())
                    .filter(|(_, k)| !dropped.iter().any(|d| d.eq_ignore_ascii_case(k)))
                    .collect();
                if keep.is_empty() {
                    return false;
                }
                *columns = keep.iter().map(|(c, _)| c.clone()).collect();
                *key = keep.into_iter().map(|(_, k)| k).collect();
            }
        }
        true
    });
    changed
}

fn unique_name(base: &str, existing: &HashSet<String>) -> String {
    let mut candidate = format!("{base}_tmp");
    let mut n = 1;
    while existing.contains(&candidate.to_ascii_lowercase()) {
        n += 1;
        candidate = format!("{base}_tmp{n}");
    }
    candidate
}
