//! AST node shapes for the SQLite DDL subset.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// The `type` column of `sqlite_master`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Table,
    Index,
    Trigger,
    View,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Table => "table",
            Category::Index => "index",
            Category::Trigger => "trigger",
            Category::View => "view",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(Category::Table),
            "index" => Ok(Category::Index),
            "trigger" => Ok(Category::Trigger),
            "view" => Ok(Category::View),
            _ => Err(()),
        }
    }
}

/// Top-level tagged AST, discriminated by `__type__` via serde's internal
/// tagging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__type__")]
pub enum Stmt {
    #[serde(rename = "CREATE TABLE")]
    CreateTable(CreateTable),
    #[serde(rename = "CREATE INDEX")]
    CreateIndex(CreateIndex),
    #[serde(rename = "CREATE TRIGGER")]
    CreateTrigger(CreateTrigger),
    #[serde(rename = "CREATE VIEW")]
    CreateView(CreateView),
    #[serde(rename = "CREATE VIRTUAL TABLE")]
    CreateVirtualTable(CreateVirtualTable),
}

impl Stmt {
    pub fn category(&self) -> Category {
        match self {
            Stmt::CreateTable(_) | Stmt::CreateVirtualTable(_) => Category::Table,
            Stmt::CreateIndex(_) => Category::Index,
            Stmt::CreateTrigger(_) => Category::Trigger,
            Stmt::CreateView(_) => Category::View,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Stmt::CreateTable(t) => &t.name,
            Stmt::CreateIndex(i) => &i.name,
            Stmt::CreateTrigger(t) => &t.name,
            Stmt::CreateView(v) => &v.name,
            Stmt::CreateVirtualTable(v) => &v.name,
        }
    }

    pub fn name_mut(&mut self) -> &mut String {
        match self {
            Stmt::CreateTable(t) => &mut t.name,
            Stmt::CreateIndex(i) => &mut i.name,
            Stmt::CreateTrigger(t) => &mut t.name,
            Stmt::CreateView(v) => &mut v.name,
            Stmt::CreateVirtualTable(v) => &mut v.name,
        }
    }

    pub fn schema(&self) -> Option<&str> {
        match self {
            Stmt::CreateTable(t) => t.schema.as_deref(),
            Stmt::CreateIndex(i) => i.schema.as_deref(),
            Stmt::CreateTrigger(t) => t.schema.as_deref(),
            Stmt::CreateView(v) => v.schema.as_deref(),
            Stmt::CreateVirtualTable(v) => v.schema.as_deref(),
        }
    }

    pub fn schema_mut(&mut self) -> &mut Option<String> {
        match self {
            Stmt::CreateTable(t) => &mut t.schema,
            Stmt::CreateIndex(i) => &mut i.schema,
            Stmt::CreateTrigger(t) => &mut t.schema,
            Stmt::CreateView(v) => &mut v.schema,
            Stmt::CreateVirtualTable(v) => &mut v.schema,
        }
    }

    /// Flat set of table/view names this statement's body refers to,
    /// used by the schema catalog to build dependency edges.
    pub fn referenced_tables(&self) -> HashSet<String> {
        let mut out = HashSet::new();
        match self {
            Stmt::CreateTable(t) => {
                for col in &t.columns {
                    if let Some(fk) = &col.fk {
                        out.insert(fk.table.clone());
                    }
                }
                for c in &t.constraints {
                    if let TableConstraint::ForeignKey { table, .. } = c {
                        out.insert(table.clone());
                    }
                }
            }
            Stmt::CreateIndex(i) => {
                out.insert(i.table.clone());
            }
            Stmt::CreateTrigger(t) => {
                out.insert(t.table.clone());
                out.extend(scan_referenced_identifiers(&t.body));
                if let Some(when) = &t.when {
                    out.extend(scan_referenced_identifiers(when));
                }
            }
            Stmt::CreateView(v) => {
                out.extend(scan_referenced_identifiers(&v.select));
            }
            Stmt::CreateVirtualTable(_) => {}
        }
        out
    }
}

/// Scans raw SQL text for identifiers following FROM/JOIN/INTO/UPDATE,
/// a pragmatic stand-in for a full SELECT-statement parser (see
/// DESIGN.md). Good enough to build dependency edges for well-formed DDL.
pub fn scan_referenced_identifiers(raw: &str) -> HashSet<String> {
    let tokens = crate::lexer::Lexer::tokenize(raw).unwrap_or_default();
    let mut out = HashSet::new();
    let mut expect_name = false;
    for tok in &tokens {
        use crate::lexer::TokenKind;
        if tok.kind == crate::lexer::TokenKind::Ident
            && (tok.ieq("FROM") || tok.ieq("JOIN") || tok.ieq("INTO") || tok.ieq("UPDATE"))
        {
            expect_name = true;
            continue;
        }
        if expect_name && tok.is_ident_like() {
            out.insert(tok.value());
            expect_name = false;
        } else if tok.kind != TokenKind::Dot {
            expect_name = false;
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConflictClause {
    Rollback,
    Abort,
    Fail,
    Ignore,
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitialMode {
    Deferred,
    Immediate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeferClause {
    pub not: bool,
    pub initial: Option<InitialMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum FkEvent {
    Delete,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FkAction {
    SetNull,
    SetDefault,
    Cascade,
    Restrict,
    NoAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ForeignKey {
    pub table: String,
    pub key: Vec<String>,
    pub defer: Option<DeferClause>,
    #[serde(default)]
    pub action: HashMap<FkEvent, FkAction>,
    #[serde(rename = "match")]
    pub r#match: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PrimaryKeyColumn {
    pub autoincrement: bool,
    pub direction: Option<Direction>,
    pub conflict: Option<ConflictClause>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NotNullConstraint {
    pub conflict: Option<ConflictClause>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UniqueConstraint {
    pub conflict: Option<ConflictClause>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Column {
    pub name: String,
    pub r#type: Option<String>,
    pub pk: Option<PrimaryKeyColumn>,
    pub notnull: Option<NotNullConstraint>,
    pub unique: Option<UniqueConstraint>,
    /// Raw default expression text, as written.
    pub default: Option<String>,
    /// Raw CHECK expression text, as written.
    pub check: Option<String>,
    pub collate: Option<String>,
    pub fk: Option<ForeignKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedColumn {
    pub name: String,
    pub collate: Option<String>,
    pub direction: Option<Direction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TableConstraint {
    #[serde(rename = "PRIMARY KEY")]
    PrimaryKey {
        name: Option<String>,
        key: Vec<IndexedColumn>,
        conflict: Option<ConflictClause>,
    },
    #[serde(rename = "UNIQUE")]
    Unique {
        name: Option<String>,
        key: Vec<IndexedColumn>,
        conflict: Option<ConflictClause>,
    },
    #[serde(rename = "FOREIGN KEY")]
    ForeignKey {
        name: Option<String>,
        columns: Vec<String>,
        table: String,
        key: Vec<String>,
        defer: Option<DeferClause>,
        #[serde(default)]
        action: HashMap<FkEvent, FkAction>,
        #[serde(rename = "match")]
        r#match: Option<String>,
    },
    #[serde(rename = "CHECK")]
    Check {
        name: Option<String>,
        /// Raw CHECK expression text, as written.
        check: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CreateTable {
    pub name: String,
    pub schema: Option<String>,
    pub temporary: bool,
    pub exists: bool,
    pub without_rowid: bool,
    pub columns: Vec<Column>,
    pub constraints: Vec<TableConstraint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexKeyColumn {
    pub name: Option<String>,
    /// Raw expression text when the key element is not a bare column.
    pub expr: Option<String>,
    pub collate: Option<String>,
    pub direction: Option<Direction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIndex {
    pub name: String,
    pub table: String,
    pub schema: Option<String>,
    pub unique: bool,
    pub exists: bool,
    pub columns: Vec<IndexKeyColumn>,
    /// Raw WHERE expression text (partial index), as written.
    pub r#where: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerUpon {
    Before,
    After,
    #[serde(rename = "INSTEAD OF")]
    InsteadOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerAction {
    Delete,
    Insert,
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTrigger {
    pub name: String,
    pub schema: Option<String>,
    pub temporary: bool,
    pub exists: bool,
    pub upon: TriggerUpon,
    pub action: TriggerAction,
    /// Populated only for `UPDATE OF col, ...` triggers.
    pub columns: Vec<String>,
    pub table: String,
    pub for_each_row: bool,
    /// Raw WHEN expression text, as written.
    pub when: Option<String>,
    /// Raw trigger body text (one or more statements), as written.
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateView {
    pub name: String,
    pub schema: Option<String>,
    pub temporary: bool,
    pub exists: bool,
    pub columns: Option<Vec<String>>,
    /// Raw SELECT text, as written.
    pub select: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleClause {
    pub name: String,
    pub arguments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVirtualTable {
    pub name: String,
    pub schema: Option<String>,
    pub exists: bool,
    pub module: ModuleClause,
}
