//! In-memory mirror of `sqlite_master`: parsed schema objects, stable
//! process-local identity for each, a dependency graph between them, and
//! a cooperative lock used while an alter is in flight.

pub mod error;
mod graph;
mod item;

use std::collections::HashMap;

use rusqlite::Connection;
use sqlitely_grammar::ast::TableConstraint;
use sqlitely_grammar::transform::{RenameSpec, transform};
use sqlitely_grammar::{Category, GenerateOptions, Stmt, generate};
use tracing::{debug, warn};

pub use error::CatalogError;
pub use graph::{DependencyEdge, EdgeKind};
pub use item::{ColumnMeta, ItemId, SchemaItem};

/// Controls how much work [`Catalog::populate`] does.
#[derive(Debug, Clone, Default)]
pub struct PopulateFilter {
    /// Restrict the refresh to one category; `None` refreshes everything.
    pub category: Option<Category>,
    /// Restrict the refresh to one name; `None` refreshes every item in
    /// `category` (or the whole schema, if `category` is also `None`).
    pub name: Option<String>,
    /// Fully parse each item's SQL and store its canonical formatted text.
    /// When `false`, only the `PRAGMA table_info`/`PRAGMA index_info`
    /// column list is refreshed and any previously parsed AST is reused
    /// as long as `sql0` hasn't changed.
    pub parse: bool,
    /// Also fetch `COUNT(*)` for table items.
    pub count: bool,
}

impl PopulateFilter {
    pub fn all_parsed() -> Self {
        PopulateFilter { parse: true, ..Default::default() }
    }
}

/// One entry of the two lists returned by [`Catalog::get_keys`]: a tuple
/// of column names, together with the foreign table (and its columns)
/// the tuple points at, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRef {
    pub name: Vec<String>,
    pub table: HashMap<String, Vec<String>>,
}

/// Rows reported as failing by `PRAGMA integrity_check`.
#[derive(Debug, Clone)]
pub struct IntegrityReport(pub Vec<String>);

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parsed, queryable view of a database's schema.
#[derive(Debug, Default)]
pub struct Catalog {
    items: Vec<SchemaItem>,
    graph: graph::Graph,
    next_id: u64,
}

impl Catalog {
    /// Builds a catalog from scratch with every item fully parsed, the
    /// common case for a freshly opened connection.
    pub fn populate_all(conn: &Connection) -> Result<Self, CatalogError> {
        let mut cat = Catalog::default();
        cat.populate(conn, &PopulateFilter::all_parsed())?;
        Ok(cat)
    }

    /// Rebuilds or refreshes the entry set per `filter`. Items whose
    /// `sql0` is unchanged since the last populate keep their [`ItemId`]
    /// and, when `filter.parse` is false, their previously parsed `meta`.
    pub fn populate(&mut self, conn: &Connection, filter: &PopulateFilter) -> Result<(), CatalogError> {
        let mut query = String::from(
            "SELECT type, name, tbl_name, rootpage, COALESCE(sql, '') FROM sqlite_master",
        );
        let mut clauses = Vec::new();
        if let Some(cat) = filter.category {
            clauses.push(format!("type = '{}'", cat.as_str()));
        }
        if let Some(name) = &filter.name {
            clauses.push(format!("name = '{}'", name.replace('\'', "''")));
        }
        if !clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&clauses.join(" AND "));
        }
        query.push_str(" ORDER BY rowid");
        debug!(sql = %query, operation = "catalog.populate", "querying sqlite_master");

        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut fresh = Vec::new();
        for row in rows {
            let (type_, name, tbl_name, rootpage, sql0) = row?;
            let Some(category): Option<Category> = type_.parse().ok() else {
                // sqlite_sequence and similar internal bookkeeping rows
                // surface with an unrecognised type; skip rather than guess.
                continue;
            };
            fresh.push((category, name, tbl_name, rootpage, sql0));
        }

        // Items outside the filter's scope are untouched.
        let touched_names: std::collections::HashSet<(Category, String)> = fresh
            .iter()
            .map(|(c, n, ..)| (*c, n.to_ascii_lowercase()))
            .collect();
        self.items.retain(|it| {
            let key = (it.category, it.name.to_ascii_lowercase());
            !((filter.category.is_none_or(|c| c == it.category))
                && (filter.name.is_none() || filter.name.as_deref() == Some(it.name.as_str())))
                || touched_names.contains(&key)
        });

        for (category, name, tbl_name, rootpage, sql0) in fresh {
            let existing_idx =
                self.items.iter().position(|it| it.category == category && it.name.eq_ignore_ascii_case(&name));
            let reuse_unchanged = existing_idx.is_some_and(|i| self.items[i].sql0 == sql0);

            let idx = match existing_idx {
                Some(i) if reuse_unchanged => i,
                Some(i) => {
                    // sql0 changed: same slot, fresh parse state, same id.
                    let it = &mut self.items[i];
                    it.sql0 = sql0.clone();
                    it.sql = sql0.clone();
                    it.meta = None;
                    it.columns = None;
                    it.parsed = false;
                    it.tbl_name = tbl_name.clone();
                    it.rootpage = rootpage;
                    i
                }
                None => {
                    self.next_id += 1;
                    let id = ItemId(self.next_id);
                    self.items.push(SchemaItem::new(
                        id,
                        category,
                        name.clone(),
                        tbl_name.clone(),
                        rootpage,
                        sql0.clone(),
                    ));
                    self.items.len() - 1
                }
            };
            let item = &mut self.items[idx];

            if filter.parse && !item.parsed {
                if item.sql0.is_empty() {
                    item.parsed = true;
                } else {
                    match sqlitely_grammar::parse(&item.sql0, Some(category)) {
                        Ok(parsed_stmt) => {
                            item.sql = generate(&parsed_stmt, GenerateOptions::default())
                                .unwrap_or_else(|_| item.sql0.clone());
                            item.meta = Some(parsed_stmt);
                            item.parsed = true;
                        }
                        Err(e) => {
                            warn!(object = %name, category = %type_str(category), error = %e, "schema object did not parse");
                        }
                    }
                }
            }

            if !item.sql0.is_empty() {
                item.columns = Some(read_columns(conn, category, &item.name, &item.tbl_name)?);
            }

            if filter.count && category == Category::Table {
                item.count = conn
                    .query_row(
                        &format!("SELECT COUNT(*) FROM \"{}\"", item.name.replace('"', "\"\"")),
                        [],
                        |r| r.get(0),
                    )
                    .ok();
            }
        }

        let resolver: HashMap<(Category, String), ItemId> = self
            .items
            .iter()
            .map(|it| ((it.category, it.name.to_ascii_lowercase()), it.id))
            .collect();
        // Tables referenced in a view/trigger/FK may resolve to any
        // category since SQLite allows a view where a table is expected;
        // prefer Table, then View.
        let resolve = |name: &str| -> Option<ItemId> {
            let key = name.to_ascii_lowercase();
            resolver
                .get(&(Category::Table, key.clone()))
                .or_else(|| resolver.get(&(Category::View, key)))
                .copied()
        };

        let mut edges = Vec::new();
        for item in &self.items {
            if let Some(stmt) = &item.meta {
                edges.extend(graph::edges_for(item.id, item.category, stmt, resolve));
            }
        }
        self.graph = graph::Graph::new(edges);

        Ok(())
    }

    pub fn items(&self) -> &[SchemaItem] {
        &self.items
    }

    fn find(&self, category: Category, name: &str) -> Option<&SchemaItem> {
        self.items.iter().find(|i| i.category == category && i.name.eq_ignore_ascii_case(name))
    }

    fn find_any(&self, name: &str) -> Option<&SchemaItem> {
        self.items.iter().find(|i| i.name.eq_ignore_ascii_case(name))
    }

    fn find_mut_any(&mut self, name: &str) -> Option<&mut SchemaItem> {
        self.items.iter_mut().find(|i| i.name.eq_ignore_ascii_case(name))
    }

    pub fn get_category(&self, name: &str) -> Option<Category> {
        self.find_any(name).map(|i| i.category)
    }

    /// Returns a deep copy of every item in `category`, optionally
    /// narrowed to `name`, keyed case-insensitively.
    pub fn get_category_items(&self, category: Category, name: Option<&str>) -> Vec<SchemaItem> {
        self.items
            .iter()
            .filter(|i| i.category == category)
            .filter(|i| name.is_none_or(|n| i.name.eq_ignore_ascii_case(n)))
            .cloned()
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&SchemaItem> {
        self.find_any(name)
    }

    pub fn by_id(&self, id: ItemId) -> Option<&SchemaItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Dependents of `(category, name)`. `own=true` restricts to direct
    /// ownership edges; `own=false` restricts to reference edges in
    /// either direction; `data=true` additionally follows only
    /// view-to-table/view edges, recursing through the whole view
    /// dependency closure.
    pub fn get_related(&self, category: Category, name: &str, own: bool, data: bool) -> Vec<&SchemaItem> {
        let Some(item) = self.find(category, name) else { return Vec::new() };
        let ids: std::collections::HashSet<ItemId> = if data {
            self.graph.reference_closure(item.id, |id| {
                self.by_id(id).is_some_and(|i| matches!(i.category, Category::Table | Category::View))
            })
        } else if own {
            self.graph.owned(item.id)
        } else {
            self.graph.referenced(item.id)
        };
        self.items.iter().filter(|i| ids.contains(&i.id)).collect()
    }

    /// `(local_keys, foreign_keys)` for `table`. `local_keys` are this table's primary key (if any)
    /// plus, unless `pks_only`, every column tuple another table's
    /// foreign key points at. `foreign_keys` are this table's own
    /// outgoing foreign keys.
    pub fn get_keys(&self, table: &str, pks_only: bool) -> (Vec<KeyRef>, Vec<KeyRef>) {
        let mut local = Vec::new();
        let mut foreign = Vec::new();

        if let Some(SchemaItem { meta: Some(Stmt::CreateTable(t)), .. }) = self.find(Category::Table, table) {
            if let Some(pk) = primary_key_columns(t) {
                local.push(KeyRef { name: pk, table: HashMap::new() });
            }
            for col in &t.columns {
                if let Some(fk) = &col.fk {
                    let mut tbl = HashMap::new();
                    tbl.insert(fk.table.clone(), fk.key.clone());
                    foreign.push(KeyRef { name: vec![col.name.clone()], table: tbl });
                }
            }
            for c in &t.constraints {
                if let TableConstraint::ForeignKey { columns, table: ftable, key, .. } = c {
                    let mut tbl = HashMap::new();
                    tbl.insert(ftable.clone(), key.clone());
                    foreign.push(KeyRef { name: columns.clone(), table: tbl });
                }
            }
        }

        if !pks_only {
            for other in &self.items {
                let Some(Stmt::CreateTable(t)) = &other.meta else { continue };
                for col in &t.columns {
                    if let Some(fk) = &col.fk {
                        if fk.table.eq_ignore_ascii_case(table) {
                            let mut tbl = HashMap::new();
                            tbl.insert(other.name.clone(), vec![col.name.clone()]);
                            local.push(KeyRef { name: fk.key.clone(), table: tbl });
                        }
                    }
                }
                for c in &t.constraints {
                    if let TableConstraint::ForeignKey { columns, table: ftable, key, .. } = c {
                        if ftable.eq_ignore_ascii_case(table) {
                            let mut tbl = HashMap::new();
                            tbl.insert(other.name.clone(), columns.clone());
                            local.push(KeyRef { name: key.clone(), table: tbl });
                        }
                    }
                }
            }
        }

        (local, foreign)
    }

    /// The effective rowid alias for `table`: `None` for `WITHOUT ROWID`
    /// tables or when `rowid`/`_rowid_`/`oid` are all shadowed by user
    /// columns; otherwise the single-column `INTEGER PRIMARY KEY` name if
    /// one exists, else the first unshadowed standard alias.
    pub fn get_rowid(&self, table: &str) -> Option<String> {
        let Some(SchemaItem { meta: Some(Stmt::CreateTable(t)), .. }) = self.find(Category::Table, table) else {
            return None;
        };
        if t.without_rowid {
            return None;
        }
        if let Some(keys) = primary_key_columns(t) {
            if keys.len() == 1 {
                if let Some(col) = t.columns.iter().find(|c| c.name.eq_ignore_ascii_case(&keys[0])) {
                    if col.r#type.as_deref().is_some_and(|ty| ty.eq_ignore_ascii_case("INTEGER")) {
                        return Some(col.name.clone());
                    }
                }
            }
        }
        ["rowid", "_rowid_", "oid"]
            .into_iter()
            .find(|alias| !t.columns.iter().any(|c| c.name.eq_ignore_ascii_case(alias)))
            .map(str::to_string)
    }

    /// Triggers and views whose SQL text references any of `columns` on
    /// `table`, detected by renaming the candidate columns to fresh
    /// unique names and checking whether the regenerated SQL changed.
    /// `UPDATE OF` triggers are
    /// only reported when every column in their column list is in
    /// `columns`.
    pub fn get_column_dependents(&self, table: &str, columns: &[&str]) -> Vec<&SchemaItem> {
        let mut spec = RenameSpec::new(table);
        for (i, col) in columns.iter().enumerate() {
            spec = spec.rename_column(*col, format!("__probe_col_{i}__"));
        }
        let map = spec.into_map();

        self.get_related(Category::Table, table, false, false)
            .into_iter()
            .filter(|item| match (&item.meta, item.category) {
                (Some(stmt), Category::Trigger) => {
                    let Stmt::CreateTrigger(tr) = stmt else { return false };
                    if !tr.columns.is_empty() {
                        return tr.columns.iter().all(|c| columns.iter().any(|x| x.eq_ignore_ascii_case(c)));
                    }
                    let rewritten = transform(stmt, table, &map);
                    generate(&rewritten, GenerateOptions::compact()).ok()
                        != generate(stmt, GenerateOptions::compact()).ok()
                }
                (Some(stmt), Category::View) => {
                    let rewritten = transform(stmt, table, &map);
                    generate(&rewritten, GenerateOptions::compact()).ok()
                        != generate(stmt, GenerateOptions::compact()).ok()
                }
                _ => false,
            })
            .collect()
    }

    /// Registers a lock on `(category, name)` and cascades it to
    /// dependent views/tables/triggers. Fails if any item in the cascade
    /// set is already locked.
    pub fn lock(&mut self, category: Category, name: &str, reason: &str) -> Result<(), CatalogError> {
        let Some(item) = self.find(category, name) else {
            return Err(CatalogError::NotFound { entity: category.to_string(), name: name.to_string() });
        };
        let id = item.id;
        let mut targets = self.lock_cascade_targets(category, id);
        targets.insert(id);

        for &t in &targets {
            if let Some(existing) = self.by_id(t).and_then(|i| i.locked.clone()) {
                return Err(CatalogError::Locked { name: name.to_string(), reason: existing });
            }
        }
        for t in targets {
            if let Some(it) = self.items.iter_mut().find(|i| i.id == t) {
                it.locked = Some(reason.to_string());
            }
        }
        Ok(())
    }

    /// Reverses [`Catalog::lock`]'s cascade.
    pub fn unlock(&mut self, category: Category, name: &str) {
        let Some(id) = self.find(category, name).map(|i| i.id) else { return };
        let mut targets = self.lock_cascade_targets(category, id);
        targets.insert(id);
        for it in self.items.iter_mut() {
            if targets.contains(&it.id) {
                it.locked = None;
            }
        }
    }

    /// A human-readable lock label if `(category, name)` (or, when
    /// `skip` is given, any other item) is locked.
    pub fn get_lock(&self, category: Category, name: &str, skip: Option<&[(Category, &str)]>) -> Option<&str> {
        let item = self.find(category, name)?;
        if let Some(skip) = skip {
            if skip.iter().any(|(c, n)| *c == category && n.eq_ignore_ascii_case(name)) {
                return None;
            }
        }
        item.locked.as_deref()
    }

    fn lock_cascade_targets(&self, category: Category, id: ItemId) -> std::collections::HashSet<ItemId> {
        let is_table_or_view = |i: ItemId| {
            self.by_id(i).is_some_and(|it| matches!(it.category, Category::Table | Category::View))
        };
        let mut out = match category {
            Category::Table => self.graph.reference_closure_reverse(id, is_table_or_view),
            Category::View => self.graph.reference_closure(id, is_table_or_view),
            _ => Default::default(),
        };
        // Triggers owned by anything now in scope (plus the item itself).
        let mut scope = out.clone();
        scope.insert(id);
        for s in scope {
            for e in self.graph.edges() {
                if e.kind == EdgeKind::Owns && e.to == s {
                    if self.by_id(e.from).is_some_and(|i| i.category == Category::Trigger) {
                        out.insert(e.from);
                    }
                }
            }
        }
        out
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        self.graph.edges()
    }

    /// Runs `PRAGMA integrity_check` and collects every row whose value
    /// isn't the literal string `ok`.
    pub fn integrity_check(conn: &Connection) -> Result<IntegrityReport, CatalogError> {
        let mut stmt = conn.prepare("PRAGMA integrity_check")?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        let mut messages = Vec::new();
        for row in rows {
            let msg = row?;
            if msg != "ok" {
                messages.push(msg);
            }
        }
        Ok(IntegrityReport(messages))
    }
}

fn type_str(c: Category) -> &'static str {
    c.as_str()
}

fn primary_key_columns(t: &sqlitely_grammar::ast::CreateTable) -> Option<Vec<String>> {
    for col in &t.columns {
        if col.pk.is_some() {
            return Some(vec![col.name.clone()]);
        }
    }
    for c in &t.constraints {
        if let TableConstraint::PrimaryKey { key, .. } = c {
            return Some(key.iter().map(|k| k.name.clone()).collect());
        }
    }
    None
}

fn read_columns(
    conn: &Connection,
    category: Category,
    name: &str,
    tbl_name: &str,
) -> Result<Vec<ColumnMeta>, CatalogError> {
    match category {
        Category::Table => {
            let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", name.replace('"', "\"\"")))?;
            let rows = stmt.query_map([], |r| {
                Ok(ColumnMeta {
                    name: r.get(1)?,
                    decl_type: r.get(2)?,
                    notnull: r.get::<_, i64>(3)? != 0,
                    pk: r.get::<_, i64>(5)? != 0,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(CatalogError::from)
        }
        Category::Index => {
            let mut stmt = conn.prepare(&format!("PRAGMA index_info(\"{}\")", name.replace('"', "\"\"")))?;
            let rows = stmt.query_map([], |r| {
                Ok(ColumnMeta { name: r.get(2)?, decl_type: String::new(), notnull: false, pk: false })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(CatalogError::from)
        }
        _ => {
            let _ = tbl_name;
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn catalog_from_sql(stmts: &[&str]) -> Catalog {
        let conn = Connection::open_in_memory().unwrap();
        for s in stmts {
            conn.execute(s, []).unwrap();
        }
        Catalog::populate_all(&conn).unwrap()
    }

    #[test]
    fn populates_table_and_index() {
        let cat = catalog_from_sql(&[
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)",
            "CREATE INDEX ix_name ON t (name)",
        ]);
        assert_eq!(cat.get_category("t"), Some(Category::Table));
        assert_eq!(cat.get_category("ix_name"), Some(Category::Index));
        let (local, _) = cat.get_keys("t", true);
        assert_eq!(local[0].name, vec!["id".to_string()]);
        assert_eq!(cat.get_rowid("t"), Some("id".to_string()));
    }

    #[test]
    fn get_related_finds_dependent_view_and_index() {
        let cat = catalog_from_sql(&[
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)",
            "CREATE INDEX ix_name ON t (name)",
            "CREATE VIEW v AS SELECT name FROM t",
        ]);
        let related: Vec<&str> =
            cat.get_related(Category::Table, "t", false, false).iter().map(|i| i.name.as_str()).collect();
        assert!(related.contains(&"v"));
        let owned: Vec<&str> =
            cat.get_related(Category::Table, "t", true, false).iter().map(|i| i.name.as_str()).collect();
        assert!(owned.contains(&"ix_name"));
    }

    #[test]
    fn view_dependency_closure_is_transitive() {
        let cat = catalog_from_sql(&[
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)",
            "CREATE VIEW v1 AS SELECT name FROM t",
            "CREATE VIEW v2 AS SELECT name FROM v1",
        ]);
        let closure: Vec<&str> =
            cat.get_related(Category::View, "v2", false, true).iter().map(|i| i.name.as_str()).collect();
        assert!(closure.contains(&"v1"));
        assert!(closure.contains(&"t"));
    }

    #[test]
    fn without_rowid_table_has_no_rowid_alias() {
        let cat = catalog_from_sql(&["CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT) WITHOUT ROWID"]);
        assert_eq!(cat.get_rowid("t"), None);
        let (local, _) = cat.get_keys("t", true);
        assert_eq!(local[0].name, vec!["id".to_string()]);
    }

    #[test]
    fn lock_cascades_to_dependent_view() {
        let mut cat = catalog_from_sql(&[
            "CREATE TABLE t (id INTEGER PRIMARY KEY)",
            "CREATE VIEW v AS SELECT id FROM t",
        ]);
        cat.lock(Category::Table, "t", "altering").unwrap();
        assert!(cat.get_lock(Category::View, "v", None).is_some());
        let err = cat.lock(Category::View, "v", "altering again").unwrap_err();
        assert!(matches!(err, CatalogError::Locked { .. }));
        cat.unlock(Category::Table, "t");
        assert!(cat.get_lock(Category::View, "v", None).is_none());
    }

    #[test]
    fn column_dependents_finds_view_using_column() {
        let cat = catalog_from_sql(&[
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)",
            "CREATE VIEW v AS SELECT name FROM t",
        ]);
        let deps = cat.get_column_dependents("t", &["name"]);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "v");
    }

    #[test]
    fn foreign_keys_listed_both_directions() {
        let cat = catalog_from_sql(&[
            "CREATE TABLE p (id INTEGER PRIMARY KEY)",
            "CREATE TABLE c (pid INTEGER REFERENCES p(id))",
        ]);
        let (_, foreign) = cat.get_keys("c", false);
        assert_eq!(foreign.len(), 1);
        assert_eq!(foreign[0].name, vec!["pid".to_string()]);
        let (local, _) = cat.get_keys("p", false);
        assert!(local.iter().any(|k| k.table.contains_key("c")));
    }

    #[test]
    fn integrity_check_reports_ok_database_as_empty() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (id INTEGER)", []).unwrap();
        let report = Catalog::integrity_check(&conn).unwrap();
        assert!(report.is_ok());
    }
}
