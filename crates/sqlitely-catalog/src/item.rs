//! Process-local identity for schema objects.
//!
//! `sqlite_master` rows have no identity beyond `(type, name)`, but a grid
//! seeking into the schema list needs something that survives a
//! `populate()` rerun even if rows are reordered or the connection is
//! re-queried. `ItemId` is a monotonic counter scoped to a single
//! [`crate::Catalog`] instance, handed out as the catalog is built and
//! never reused -- see the "Row identity across snapshots" design note.

use sqlitely_grammar::{Category, Stmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub(crate) u64);

impl ItemId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// One column as reported by `PRAGMA table_info`/`PRAGMA index_info`,
/// independent of whether the item's SQL parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub decl_type: String,
    pub notnull: bool,
    pub pk: bool,
}

/// One parsed row out of `sqlite_master`, plus the identity and raw text
/// needed to look it up again or patch it in place.
///
/// `sql0` is the raw text as stored in `sqlite_master`; `sql` is the
/// canonical, possibly reformatted, form produced by
/// [`sqlitely_grammar::generate`] when the row parses. `meta` is the AST
/// when the row parsed, `None` otherwise.
#[derive(Debug, Clone)]
pub struct SchemaItem {
    pub id: ItemId,
    pub category: Category,
    pub name: String,
    /// `sqlite_master.tbl_name`: the table an index, trigger, or the
    /// table itself belongs to.
    pub tbl_name: String,
    /// `sqlite_master.rootpage`.
    pub rootpage: i64,
    pub sql0: String,
    pub sql: String,
    pub meta: Option<Stmt>,
    pub columns: Option<Vec<ColumnMeta>>,
    pub count: Option<i64>,
    pub size: Option<i64>,
    pub size_index: Option<i64>,
    pub size_total: Option<i64>,
    /// True once this item's SQL has been fully parsed; false when only the light refresh ran.
    pub parsed: bool,
    /// True for internal `sqlite_autoindex_*` rows, which have no `sql`
    /// text to parse.
    pub internal: bool,
    pub locked: Option<String>,
}

impl SchemaItem {
    pub(crate) fn new(
        id: ItemId,
        category: Category,
        name: String,
        tbl_name: String,
        rootpage: i64,
        sql0: String,
    ) -> Self {
        let internal = sql0.is_empty();
        SchemaItem {
            id,
            category,
            name,
            tbl_name,
            rootpage,
            sql: sql0.clone(),
            sql0,
            meta: None,
            columns: None,
            count: None,
            size: None,
            size_index: None,
            size_total: None,
            parsed: false,
            internal,
            locked: None,
        }
    }
}
