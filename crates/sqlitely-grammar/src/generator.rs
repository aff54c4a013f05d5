//! Renders AST nodes back into SQL text.
//!
//! Two modes are supported: [`GenerateOptions::indented`] (the default),
//! which lays columns and constraints one per line with their names
//! padded to a common width, and a compact single-line mode used when
//! embedding statements (e.g. into a diff preview).

use crate::ast::*;
use crate::ident::quote;

#[derive(Debug, Clone, Copy)]
pub struct GenerateOptions {
    pub indent: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        GenerateOptions { indent: true }
    }
}

impl GenerateOptions {
    pub fn compact() -> Self {
        GenerateOptions { indent: false }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("cannot generate {category} statement without a name")]
    MissingName { category: Category },
}

pub fn generate(stmt: &Stmt, opts: GenerateOptions) -> Result<String, GenerateError> {
    if stmt.name().is_empty() {
        return Err(GenerateError::MissingName { category: stmt.category() });
    }
    Ok(match stmt {
        Stmt::CreateTable(t) => generate_table(t, opts),
        Stmt::CreateIndex(i) => generate_index(i, opts),
        Stmt::CreateTrigger(t) => generate_trigger(t, opts),
        Stmt::CreateView(v) => generate_view(v, opts),
        Stmt::CreateVirtualTable(v) => generate_virtual_table(v),
    })
}

fn qname(schema: Option<&str>, name: &str) -> String {
    match schema {
        Some(s) => format!("{}.{}", quote(s, false), quote(name, false)),
        None => quote(name, false),
    }
}

fn exists_clause(exists: bool) -> &'static str {
    if exists {
        "IF NOT EXISTS "
    } else {
        ""
    }
}

fn conflict_suffix(c: Option<ConflictClause>) -> String {
    match c {
        Some(ConflictClause::Rollback) => " ON CONFLICT ROLLBACK".into(),
        Some(ConflictClause::Abort) => " ON CONFLICT ABORT".into(),
        Some(ConflictClause::Fail) => " ON CONFLICT FAIL".into(),
        Some(ConflictClause::Ignore) => " ON CONFLICT IGNORE".into(),
        Some(ConflictClause::Replace) => " ON CONFLICT REPLACE".into(),
        None => String::new(),
    }
}

fn direction_suffix(d: Option<Direction>) -> &'static str {
    match d {
        Some(Direction::Asc) => " ASC",
        Some(Direction::Desc) => " DESC",
        None => "",
    }
}

fn defer_suffix(d: &Option<DeferClause>) -> String {
    let Some(d) = d else { return String::new() };
    let mut s = String::new();
    if d.not {
        s.push_str(" NOT");
    }
    s.push_str(" DEFERRABLE");
    match d.initial {
        Some(InitialMode::Deferred) => s.push_str(" INITIALLY DEFERRED"),
        Some(InitialMode::Immediate) => s.push_str(" INITIALLY IMMEDIATE"),
        None => {}
    }
    s
}

fn fk_action_word(a: FkAction) -> &'static str {
    match a {
        FkAction::SetNull => "SET NULL",
        FkAction::SetDefault => "SET DEFAULT",
        FkAction::Cascade => "CASCADE",
        FkAction::Restrict => "RESTRICT",
        FkAction::NoAction => "NO ACTION",
    }
}

fn fk_suffix(fk: &ForeignKey) -> String {
    let mut s = format!(" REFERENCES {}", quote(&fk.table, false));
    if !fk.key.is_empty() {
        s.push_str(&format!(
            " ({})",
            fk.key.iter().map(|c| quote(c, false)).collect::<Vec<_>>().join(", ")
        ));
    }
    if let Some(action) = fk.action.get(&FkEvent::Update) {
        s.push_str(&format!(" ON UPDATE {}", fk_action_word(*action)));
    }
    if let Some(action) = fk.action.get(&FkEvent::Delete) {
        s.push_str(&format!(" ON DELETE {}", fk_action_word(*action)));
    }
    if let Some(m) = &fk.r#match {
        s.push_str(&format!(" MATCH {}", quote(m, false)));
    }
    s.push_str(&defer_suffix(&fk.defer));
    s
}

/// Renders a single column definition, as used for `ALTER TABLE ... ADD
/// COLUMN` by the alter planner.
pub fn column_sql(col: &Column) -> String {
    let (name, ty, rest) = column_parts(col);
    let mut parts = vec![name];
    if !ty.is_empty() {
        parts.push(ty);
    }
    if !rest.is_empty() {
        parts.push(rest);
    }
    parts.join(" ")
}

/// Splits a column definition into its three alignment columns: the
/// (quoted) name, the declared type, and everything from the first
/// constraint keyword on, already joined with single spaces. Either of
/// the latter two may be empty.
fn column_parts(col: &Column) -> (String, String, String) {
    let name = quote(&col.name, false);
    let ty = col.r#type.clone().unwrap_or_default();
    let mut rest = Vec::new();
    if let Some(pk) = &col.pk {
        let mut s = "PRIMARY KEY".to_string();
        s.push_str(direction_suffix(pk.direction));
        s.push_str(&conflict_suffix(pk.conflict));
        if pk.autoincrement {
            s.push_str(" AUTOINCREMENT");
        }
        rest.push(s);
    }
    if let Some(nn) = &col.notnull {
        rest.push(format!("NOT NULL{}", conflict_suffix(nn.conflict)));
    }
    if let Some(u) = &col.unique {
        rest.push(format!("UNIQUE{}", conflict_suffix(u.conflict)));
    }
    if let Some(d) = &col.default {
        let needs_parens = !d.starts_with('(') && d.parse::<f64>().is_err() && !is_bare_default_keyword(d);
        if needs_parens {
            rest.push(format!("DEFAULT ({d})"));
        } else {
            rest.push(format!("DEFAULT {d}"));
        }
    }
    if let Some(c) = &col.check {
        rest.push(format!("CHECK ({c})"));
    }
    if let Some(c) = &col.collate {
        rest.push(format!("COLLATE {c}"));
    }
    if let Some(fk) = &col.fk {
        rest.push(fk_suffix(fk).trim_start().to_string());
    }
    (name, ty, rest.join(" "))
}

fn is_bare_default_keyword(s: &str) -> bool {
    matches!(
        s.to_ascii_uppercase().as_str(),
        "CURRENT_TIME" | "CURRENT_DATE" | "CURRENT_TIMESTAMP" | "NULL" | "TRUE" | "FALSE"
    ) || s.starts_with('\'')
        || s.starts_with('+')
        || s.starts_with('-')
        || s.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn indexed_column_sql(c: &IndexedColumn) -> String {
    let mut s = quote(&c.name, false);
    if let Some(col) = &c.collate {
        s.push_str(&format!(" COLLATE {col}"));
    }
    s.push_str(direction_suffix(c.direction));
    s
}

fn table_constraint_sql(tc: &TableConstraint) -> String {
    let name_prefix = |n: &Option<String>| {
        n.as_ref()
            .map(|n| format!("CONSTRAINT {} ", quote(n, false)))
            .unwrap_or_default()
    };
    match tc {
        TableConstraint::PrimaryKey { name, key, conflict } => format!(
            "{}PRIMARY KEY ({}){}",
            name_prefix(name),
            key.iter().map(indexed_column_sql).collect::<Vec<_>>().join(", "),
            conflict_suffix(*conflict)
        ),
        TableConstraint::Unique { name, key, conflict } => format!(
            "{}UNIQUE ({}){}",
            name_prefix(name),
            key.iter().map(indexed_column_sql).collect::<Vec<_>>().join(", "),
            conflict_suffix(*conflict)
        ),
        TableConstraint::ForeignKey { name, columns, table, key, defer, action, r#match } => {
            let fk = ForeignKey {
                table: table.clone(),
                key: key.clone(),
                defer: defer.clone(),
                action: action.clone(),
                r#match: r#match.clone(),
            };
            format!(
                "{}FOREIGN KEY ({}){}",
                name_prefix(name),
                columns.iter().map(|c| quote(c, false)).collect::<Vec<_>>().join(", "),
                fk_suffix(&fk)
            )
        }
        TableConstraint::Check { name, check } => {
            format!("{}CHECK ({check})", name_prefix(name))
        }
    }
}

fn generate_table(t: &CreateTable, opts: GenerateOptions) -> String {
    let mut head = "CREATE ".to_string();
    if t.temporary {
        head.push_str("TEMP ");
    }
    head.push_str("TABLE ");
    head.push_str(exists_clause(t.exists));
    head.push_str(&qname(t.schema.as_deref(), &t.name));

    let col_lines: Vec<String> = t.columns.iter().map(column_sql).collect();
    let constraint_lines: Vec<String> = t.constraints.iter().map(table_constraint_sql).collect();
    let mut body_items = col_lines;
    body_items.extend(constraint_lines);

    let mut out = String::new();
    out.push_str(&head);
    if opts.indent {
        out.push_str(" (\n");
        let parts: Vec<(String, String, String)> = t.columns.iter().map(column_parts).collect();
        let name_width = parts.iter().map(|(n, _, _)| n.chars().count()).max().unwrap_or(0);
        let type_width = parts.iter().map(|(_, ty, _)| ty.chars().count()).max().unwrap_or(0);
        for (i, (name, ty, rest)) in parts.iter().enumerate() {
            let mut line = format!("  {name:<name_width$}");
            if type_width > 0 {
                line.push(' ');
                line.push_str(&format!("{ty:<type_width$}"));
            }
            if !rest.is_empty() {
                line.push(' ');
                line.push_str(rest);
            }
            out.push_str(line.trim_end());
            if i + 1 < t.columns.len() || !t.constraints.is_empty() {
                out.push(',');
            }
            out.push('\n');
        }
        for (i, c) in t.constraints.iter().enumerate() {
            out.push_str(&format!("  {}", table_constraint_sql(c)));
            if i + 1 < t.constraints.len() {
                out.push(',');
            }
            out.push('\n');
        }
        out.push(')');
    } else {
        out.push_str(&format!(" ({})", body_items.join(", ")));
    }
    if t.without_rowid {
        out.push_str(" WITHOUT ROWID");
    }
    out
}

fn generate_index(i: &CreateIndex, _opts: GenerateOptions) -> String {
    let mut out = "CREATE ".to_string();
    if i.unique {
        out.push_str("UNIQUE ");
    }
    out.push_str("INDEX ");
    out.push_str(exists_clause(i.exists));
    out.push_str(&qname(i.schema.as_deref(), &i.name));
    out.push_str(" ON ");
    out.push_str(&quote(&i.table, false));
    out.push_str(" (");
    out.push_str(
        &i.columns
            .iter()
            .map(|c| {
                let base = match (&c.name, &c.expr) {
                    (Some(n), _) => quote(n, false),
                    (None, Some(e)) => e.clone(),
                    (None, None) => String::new(),
                };
                let mut s = base;
                if let Some(col) = &c.collate {
                    s.push_str(&format!(" COLLATE {col}"));
                }
                s.push_str(direction_suffix(c.direction));
                s
            })
            .collect::<Vec<_>>()
            .join(", "),
    );
    out.push(')');
    if let Some(w) = &i.r#where {
        out.push_str(" WHERE ");
        out.push_str(w);
    }
    out
}

fn generate_trigger(t: &CreateTrigger, _opts: GenerateOptions) -> String {
    let mut out = "CREATE ".to_string();
    if t.temporary {
        out.push_str("TEMP ");
    }
    out.push_str("TRIGGER ");
    out.push_str(exists_clause(t.exists));
    out.push_str(&qname(t.schema.as_deref(), &t.name));
    out.push(' ');
    out.push_str(match t.upon {
        TriggerUpon::Before => "BEFORE",
        TriggerUpon::After => "AFTER",
        TriggerUpon::InsteadOf => "INSTEAD OF",
    });
    out.push(' ');
    out.push_str(match t.action {
        TriggerAction::Delete => "DELETE",
        TriggerAction::Insert => "INSERT",
        TriggerAction::Update => "UPDATE",
    });
    if t.action == TriggerAction::Update && !t.columns.is_empty() {
        out.push_str(" OF ");
        out.push_str(&t.columns.iter().map(|c| quote(c, false)).collect::<Vec<_>>().join(", "));
    }
    out.push_str(" ON ");
    out.push_str(&quote(&t.table, false));
    if t.for_each_row {
        out.push_str(" FOR EACH ROW");
    }
    if let Some(when) = &t.when {
        out.push_str(" WHEN ");
        out.push_str(when);
    }
    out.push_str("\nBEGIN\n");
    let body = t.body.trim();
    out.push_str(body);
    if !body.ends_with(';') {
        out.push(';');
    }
    out.push_str("\nEND");
    out
}

fn generate_view(v: &CreateView, _opts: GenerateOptions) -> String {
    let mut out = "CREATE ".to_string();
    if v.temporary {
        out.push_str("TEMP ");
    }
    out.push_str("VIEW ");
    out.push_str(exists_clause(v.exists));
    out.push_str(&qname(v.schema.as_deref(), &v.name));
    if let Some(cols) = &v.columns {
        out.push_str(" (");
        out.push_str(&cols.iter().map(|c| quote(c, false)).collect::<Vec<_>>().join(", "));
        out.push(')');
    }
    out.push_str(" AS\n");
    out.push_str(v.select.trim());
    out
}

fn generate_virtual_table(v: &CreateVirtualTable) -> String {
    let mut out = "CREATE VIRTUAL TABLE ".to_string();
    out.push_str(exists_clause(v.exists));
    out.push_str(&qname(v.schema.as_deref(), &v.name));
    out.push_str(" USING ");
    out.push_str(&v.module.name);
    if !v.module.arguments.is_empty() {
        out.push('(');
        out.push_str(&v.module.arguments.join(", "));
        out.push(')');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn generates_simple_table_indented() {
        let stmt = parse("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT NOT NULL)", None).unwrap();
        let sql = generate(&stmt, GenerateOptions::default()).unwrap();
        assert!(sql.starts_with("CREATE TABLE t (\n"));
        assert!(sql.contains("id   INTEGER PRIMARY KEY"));
        assert!(sql.contains("name TEXT"));
        assert!(sql.contains("NOT NULL"));
        assert!(sql.ends_with(')'));
    }

    #[test]
    fn indented_columns_align_name_type_and_constraint_start() {
        // "long_name" (9 chars) and "INTEGER" (7 chars) are the widest
        // name/type in this table, so every line's type token must start
        // at column 2 (indent) + 9 (name) + 1 (separator) = 12, and
        // "NOT NULL" on the `long_name` line must start at column
        // 12 + 7 (type) + 1 (separator) = 20, matching where a
        // constraint would start on any other line.
        let stmt = parse("CREATE TABLE t (a INT, long_name INTEGER NOT NULL, z BLOB)", None).unwrap();
        let sql = generate(&stmt, GenerateOptions::default()).unwrap();
        let lines: Vec<&str> =
            sql.lines().filter(|l| l.trim_start().starts_with(['a', 'l', 'z'])).collect();
        assert_eq!(lines.len(), 3);

        let type_col = 2 + "long_name".len() + 1;
        for line in &lines {
            assert_ne!(line.as_bytes()[type_col] as char, ' ', "type column not aligned in {line:?}");
        }

        let not_null_line = lines.iter().find(|l| l.contains("NOT NULL")).unwrap();
        let constraint_start = not_null_line.find("NOT NULL").unwrap();
        assert_eq!(constraint_start, type_col + "INTEGER".len() + 1);
    }

    #[test]
    fn generates_compact_table() {
        let stmt = parse("CREATE TABLE t (id INTEGER, name TEXT)", None).unwrap();
        let sql = generate(&stmt, GenerateOptions::compact()).unwrap();
        assert_eq!(sql, "CREATE TABLE t (id INTEGER, name TEXT)");
    }

    #[test]
    fn generates_index_with_where() {
        let stmt = parse("CREATE UNIQUE INDEX ix ON t (a DESC) WHERE a IS NOT NULL", None).unwrap();
        let sql = generate(&stmt, GenerateOptions::default()).unwrap();
        assert_eq!(sql, "CREATE UNIQUE INDEX ix ON t (a DESC) WHERE a IS NOT NULL");
    }

    #[test]
    fn generates_trigger_roundtrip() {
        let sql_in = "CREATE TRIGGER tr AFTER INSERT ON t FOR EACH ROW BEGIN SELECT 1; END";
        let stmt = parse(sql_in, None).unwrap();
        let sql = generate(&stmt, GenerateOptions::default()).unwrap();
        assert!(sql.contains("BEGIN\nSELECT 1;\nEND"));
    }

    #[test]
    fn missing_name_is_an_error() {
        let stmt = Stmt::CreateTable(CreateTable::default());
        assert!(generate(&stmt, GenerateOptions::default()).is_err());
    }
}
