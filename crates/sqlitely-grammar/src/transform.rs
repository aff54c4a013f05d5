//! Rename-aware rewriting of AST nodes and raw SQL text.
//!
//! Renaming a table or column touches more than its own `CREATE TABLE`:
//! indexes, triggers and views that mention it need their definitions
//! patched too, and trigger bodies need the same treatment while leaving
//! the `OLD`/`NEW` pseudo-table aliases alone (renaming a column called
//! `old` must not turn `OLD.old` into `OLD.new_name` and then mangle the
//! alias itself).

use std::collections::HashMap;

use crate::ast::*;
use crate::ident::quote;
use crate::lexer::{Lexer, TokenKind};

/// One rename instruction: a table, optionally renamed itself, with a set
/// of column renames scoped to it.
#[derive(Debug, Clone, Default)]
pub struct RenameSpec {
    pub table: String,
    pub to_table: Option<String>,
    pub columns: HashMap<String, String>,
}

impl RenameSpec {
    pub fn new(table: impl Into<String>) -> Self {
        RenameSpec { table: table.into(), to_table: None, columns: HashMap::new() }
    }

    pub fn rename_table(mut self, to: impl Into<String>) -> Self {
        self.to_table = Some(to.into());
        self
    }

    pub fn rename_column(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.columns.insert(from.into(), to.into());
        self
    }

    pub fn into_map(self) -> RenameMap {
        let mut map = RenameMap::default();
        map.add(self);
        map
    }
}

/// Accumulates rename instructions across possibly several tables, as
/// happens when a cascading rename touches more than one object.
///
/// `schema` is kept apart from `tables`/`columns`: it is a distinct
/// pseudo-category, rewriting only the top-level schema qualifier a
/// statement was parsed with (`CREATE TABLE main.t ...`), never
/// occurrences of the same word elsewhere in the statement's body.
#[derive(Debug, Clone, Default)]
pub struct RenameMap {
    tables: HashMap<String, String>,
    columns: HashMap<String, HashMap<String, String>>,
    schema: Option<String>,
}

impl RenameMap {
    pub fn add(&mut self, spec: RenameSpec) {
        if let Some(to) = spec.to_table {
            self.tables.insert(spec.table.clone(), to);
        }
        if !spec.columns.is_empty() {
            self.columns.entry(spec.table).or_default().extend(spec.columns);
        }
    }

    /// Sets the pseudo-category `schema` rename: the new qualifier to give
    /// whatever statement [`transform`] is called on, regardless of which
    /// table it names.
    pub fn set_schema(&mut self, new_schema: impl Into<String>) {
        self.schema = Some(new_schema.into());
    }

    fn table_rename(&self, table: &str) -> Option<&str> {
        lookup_ci(&self.tables, table).map(String::as_str)
    }

    fn column_map(&self, table: &str) -> Option<&HashMap<String, String>> {
        self.columns
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(table))
            .map(|(_, v)| v)
    }
}

fn lookup_ci<'m>(map: &'m HashMap<String, String>, key: &str) -> Option<&'m String> {
    map.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v)
}

/// Rewrites every identifier in `stmt` that refers to `table` (or one of
/// its columns) according to `renames`. `stmt`s unrelated to `table` are
/// returned unchanged.
pub fn transform(stmt: &Stmt, table: &str, renames: &RenameMap) -> Stmt {
    let mut out = stmt.clone();
    match &mut out {
        Stmt::CreateTable(t) if t.name.eq_ignore_ascii_case(table) => {
            if let Some(new_name) = renames.table_rename(table) {
                t.name = new_name.to_string();
            }
            let col_map = renames.column_map(table);
            for col in &mut t.columns {
                if let Some(new_name) = col_map.and_then(|m| lookup_ci(m, &col.name)) {
                    col.name = new_name.clone();
                }
                if let Some(check) = &col.check {
                    col.check = Some(rewrite_raw(check, table, renames));
                }
                if let Some(fk) = &mut col.fk {
                    rewrite_fk(fk, renames);
                }
            }
            for c in &mut t.constraints {
                rewrite_table_constraint(c, table, renames);
            }
        }
        Stmt::CreateIndex(i) if i.table.eq_ignore_ascii_case(table) => {
            if let Some(new_name) = renames.table_rename(table) {
                i.table = new_name.to_string();
            }
            let col_map = renames.column_map(table);
            for c in &mut i.columns {
                if let Some(name) = &mut c.name {
                    if let Some(new_name) = col_map.and_then(|m| lookup_ci(m, name)) {
                        *name = new_name.clone();
                    }
                }
                if let Some(expr) = &mut c.expr {
                    *expr = rewrite_raw(expr, table, renames);
                }
            }
            if let Some(w) = &i.r#where {
                i.r#where = Some(rewrite_raw(w, table, renames));
            }
        }
        Stmt::CreateTrigger(t) if t.table.eq_ignore_ascii_case(table) => {
            if let Some(new_name) = renames.table_rename(table) {
                t.table = new_name.to_string();
            }
            let col_map = renames.column_map(table);
            for c in &mut t.columns {
                if let Some(new_name) = col_map.and_then(|m| lookup_ci(m, c)) {
                    *c = new_name.clone();
                }
            }
            if let Some(w) = &t.when {
                t.when = Some(rewrite_raw(w, table, renames));
            }
            t.body = rewrite_raw(&t.body, table, renames);
        }
        Stmt::CreateView(v) => {
            v.select = rewrite_raw(&v.select, table, renames);
        }
        _ => {}
    }
    // The `schema` pseudo-category applies to the statement's own
    // qualifier only, independent of which table-rename branch matched
    // above (or whether any did).
    if let Some(new_schema) = &renames.schema {
        *out.schema_mut() = Some(new_schema.clone());
    }
    out
}

fn rewrite_fk(fk: &mut ForeignKey, renames: &RenameMap) {
    if let Some(new_name) = renames.table_rename(&fk.table) {
        let new_name = new_name.to_string();
        if let Some(col_map) = renames.column_map(&fk.table) {
            for key in &mut fk.key {
                if let Some(n) = lookup_ci(col_map, key) {
                    *key = n.clone();
                }
            }
        }
        fk.table = new_name;
    }
}

fn rewrite_table_constraint(tc: &mut TableConstraint, table: &str, renames: &RenameMap) {
    let col_map = renames.column_map(table);
    let rewrite_cols = |cols: &mut Vec<String>| {
        if let Some(m) = col_map {
            for c in cols {
                if let Some(n) = lookup_ci(m, c) {
                    *c = n.clone();
                }
            }
        }
    };
    let rewrite_indexed = |cols: &mut Vec<IndexedColumn>| {
        if let Some(m) = col_map {
            for c in cols {
                if let Some(n) = lookup_ci(m, &c.name) {
                    c.name = n.clone();
                }
            }
        }
    };
    match tc {
        TableConstraint::PrimaryKey { key, .. } => rewrite_indexed(key),
        TableConstraint::Unique { key, .. } => rewrite_indexed(key),
        TableConstraint::ForeignKey { columns, table: fk_table, key, .. } => {
            rewrite_cols(columns);
            if let Some(new_name) = renames.table_rename(fk_table) {
                let new_name = new_name.to_string();
                if let Some(m) = renames.column_map(fk_table) {
                    for k in key.iter_mut() {
                        if let Some(n) = lookup_ci(m, k) {
                            *k = n.clone();
                        }
                    }
                }
                *fk_table = new_name;
            }
        }
        TableConstraint::Check { check, .. } => {
            *check = rewrite_raw(check, table, renames);
        }
    }
}

/// Token-level identifier substitution over a raw SQL fragment. Used both
/// for the expression spans the parser keeps as text, and directly on a
/// whole `sqlite_master.sql` value for objects the grammar does not model
/// (the "schema" pseudo-category covers this path via [`transform_raw_sql`]).
fn rewrite_raw(raw: &str, table: &str, renames: &RenameMap) -> String {
    let Ok(toks) = Lexer::tokenize(raw) else {
        return raw.to_string();
    };
    let col_map = renames.column_map(table);
    let new_table = renames.table_rename(table);
    let mut out = String::with_capacity(raw.len());
    let mut last_end = 0;
    for tok in &toks {
        if tok.kind == TokenKind::Eof {
            break;
        }
        out.push_str(&raw[last_end..tok.start]);
        let is_protected_alias = tok.ieq("OLD") || tok.ieq("NEW");
        let replacement = if tok.is_ident_like() && !is_protected_alias {
            let value = tok.value();
            if let Some(new_col) = col_map.and_then(|m| lookup_ci(m, &value)) {
                Some(quote(new_col, tok.kind == TokenKind::QuotedIdent))
            } else if new_table.is_some() && value.eq_ignore_ascii_case(table) {
                new_table.map(|n| quote(n, tok.kind == TokenKind::QuotedIdent))
            } else {
                None
            }
        } else {
            None
        };
        match replacement {
            Some(s) => out.push_str(&s),
            None => out.push_str(&raw[tok.start..tok.end]),
        }
        last_end = tok.end;
    }
    out.push_str(&raw[last_end..]);
    out
}

/// Applies the same token-level substitution directly to a raw SQL
/// string, bypassing the AST entirely. This is how a `sqlite_master.sql`
/// row is patched in place when rewriting it through the grammar isn't
/// possible (internal autoindexes, opaque virtual table arguments).
pub fn transform_raw_sql(sql: &str, table: &str, renames: &RenameMap) -> String {
    rewrite_raw(sql, table, renames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::parser::parse;

    #[test]
    fn renames_table_and_column_in_create_table() {
        let stmt = parse("CREATE TABLE t (a INT, b INT CHECK (a > 0))", None).unwrap();
        let renames = RenameSpec::new("t").rename_table("t2").rename_column("a", "a2").into_map();
        let out = transform(&stmt, "t", &renames);
        let Stmt::CreateTable(ct) = out else { panic!() };
        assert_eq!(ct.name, "t2");
        assert_eq!(ct.columns[0].name, "a2");
        assert_eq!(ct.columns[1].check.as_deref(), Some("a2 > 0"));
    }

    #[test]
    fn rewrites_index_table_reference() {
        let stmt = parse("CREATE INDEX ix ON t (a)", None).unwrap();
        let renames = RenameSpec::new("t").rename_table("t2").rename_column("a", "a2").into_map();
        let out = transform(&stmt, "t", &renames);
        let Stmt::CreateIndex(ci) = out else { panic!() };
        assert_eq!(ci.table, "t2");
        assert_eq!(ci.columns[0].name.as_deref(), Some("a2"));
    }

    #[test]
    fn trigger_body_preserves_old_new_aliases() {
        let sql = "CREATE TRIGGER tr AFTER UPDATE ON t FOR EACH ROW BEGIN SELECT NEW.a, OLD.a; END";
        let stmt = parse(sql, None).unwrap();
        let renames = RenameSpec::new("t").rename_column("a", "a2").into_map();
        let out = transform(&stmt, "t", &renames);
        let Stmt::CreateTrigger(tr) = out else { panic!() };
        assert!(tr.body.contains("NEW.a2"));
        assert!(tr.body.contains("OLD.a2"));
        assert!(!tr.body.contains("NEW2") && tr.body.contains("NEW."));
    }

    #[test]
    fn view_select_rewrites_table_reference() {
        let stmt = parse("CREATE VIEW v AS SELECT a FROM t", None).unwrap();
        let renames = RenameSpec::new("t").rename_table("t2").into_map();
        let out = transform(&stmt, "t", &renames);
        let Stmt::CreateView(v) = out else { panic!() };
        assert_eq!(v.select, "SELECT a FROM t2");
    }

    #[test]
    fn raw_sql_patch_matches_ast_path() {
        let renames = RenameSpec::new("t").rename_table("t2").into_map();
        assert_eq!(transform_raw_sql("SELECT * FROM t", "t", &renames), "SELECT * FROM t2");
    }

    #[test]
    fn schema_rename_touches_only_the_qualifier() {
        let stmt = parse("CREATE TABLE main.t (a INT, b INT REFERENCES main(a))", None).unwrap();
        let mut renames = RenameSpec::new("t").into_map();
        renames.set_schema("temp");
        let out = transform(&stmt, "t", &renames);
        let Stmt::CreateTable(ct) = out else { panic!() };
        assert_eq!(ct.schema.as_deref(), Some("temp"));
        // A column literally named "main" elsewhere in the statement is
        // untouched -- only the top-level qualifier changes.
        assert_eq!(ct.columns[1].fk.as_ref().unwrap().table, "main");
    }
}
