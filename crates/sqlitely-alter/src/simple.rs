//! Eligibility check and emission for the simple `ALTER TABLE` path,
//! taken whenever SQLite's own limited ALTER grammar can express a
//! change without a rebuild.

use sqlitely_catalog::Catalog;
use sqlitely_grammar::ast::Column;
use sqlitely_grammar::ident::quote;
use sqlitely_grammar::{column_sql, Category};

use crate::caps::RuntimeCapabilities;
use crate::{AlterStep, StepKind, TableEdit};

fn column_sans_name(c: &Column) -> Column {
    let mut c2 = c.clone();
    c2.name = String::new();
    c2
}

/// Returns the plan's steps if `edit` qualifies for the simple path,
/// `None` if it must fall back to a rebuild.
pub(crate) fn try_simple_plan(edit: &TableEdit, catalog: &Catalog, caps: &RuntimeCapabilities) -> Option<Vec<AlterStep>> {
    let old = edit.old_table()?;
    let new = edit.new;

    if old.temporary != new.temporary || old.exists != new.exists || old.without_rowid != new.without_rowid {
        return None;
    }
    if old.constraints != new.constraints {
        return None;
    }
    if edit.column_origin.len() != new.columns.len() {
        return None;
    }

    // No column removed: every old index must be referenced exactly once.
    let matched: Vec<usize> = edit.column_origin.iter().filter_map(|o| *o).collect();
    if matched.len() != old.columns.len() {
        return None;
    }
    // Identity sequence is order-preserving: 0, 1, 2, ... in that order.
    if matched.iter().enumerate().any(|(i, &oi)| oi != i) {
        return None;
    }
    // New columns only appear after every existing one (append-only).
    let first_new = edit.column_origin.iter().position(|o| o.is_none());
    if let Some(fi) = first_new {
        if edit.column_origin[fi..].iter().any(|o| o.is_some()) {
            return None;
        }
    }

    let mut renamed_table = None;
    if !old.name.eq_ignore_ascii_case(&new.name) {
        let has_dependents = !catalog.get_related(Category::Table, &old.name, false, false).is_empty()
            || !catalog.get_related(Category::Table, &old.name, true, false).is_empty();
        if has_dependents && !caps.cascading_rename {
            return None;
        }
        renamed_table = Some(new.name.clone());
    }

    let mut renamed_columns = Vec::new();
    for (new_idx, old_idx) in edit.column_origin.iter().enumerate().filter_map(|(i, o)| o.map(|j| (i, j))) {
        let old_col = &old.columns[old_idx];
        let new_col = &new.columns[new_idx];
        if !old_col.name.eq_ignore_ascii_case(&new_col.name) {
            if !caps.rename_column {
                return None;
            }
            renamed_columns.push((old_col.name.clone(), new_col.name.clone()));
        }
        if column_sans_name(old_col) != column_sans_name(new_col) {
            return None;
        }
    }

    let added_columns: Vec<&Column> = edit
        .column_origin
        .iter()
        .enumerate()
        .filter(|(_, o)| o.is_none())
        .map(|(i, _)| &new.columns[i])
        .collect();

    let mut steps = vec![AlterStep { kind: StepKind::Savepoint, sql: "SAVEPOINT alter_table".into() }];

    let table_before_columns = if let Some(new_name) = &renamed_table {
        steps.push(AlterStep {
            kind: StepKind::SimpleAlter,
            sql: format!("ALTER TABLE {} RENAME TO {}", quote(&old.name, false), quote(new_name, false)),
        });
        new_name.clone()
    } else {
        old.name.clone()
    };

    for (from, to) in &renamed_columns {
        steps.push(AlterStep {
            kind: StepKind::SimpleAlter,
            sql: format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                quote(&table_before_columns, false),
                quote(from, false),
                quote(to, false)
            ),
        });
    }

    for col in &added_columns {
        steps.push(AlterStep {
            kind: StepKind::SimpleAlter,
            sql: format!("ALTER TABLE {} ADD COLUMN {}", quote(&table_before_columns, false), column_sql(col)),
        });
    }

    steps.push(AlterStep { kind: StepKind::Release, sql: "RELEASE SAVEPOINT alter_table".into() });
    Some(steps)
}
