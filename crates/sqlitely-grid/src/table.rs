//! [`GridTable`]: the buffered, editable view over a table/view or a raw
//! query.

use std::collections::{HashMap, HashSet};

use rusqlite::Connection;
use sqlitely_catalog::Catalog;
use sqlitely_grammar::ast::Category;
use sqlitely_grammar::ident::quote;
use tracing::debug;

use crate::error::{GridError, Result};
use crate::row::{GridRow, RowFlags, RowId};
use crate::value::{Affinity, CellValue};

/// How many rows [`GridTable::seek_ahead`] fetches per call.
const SEEK_CHUNK_LENGTH: usize = 100;

/// Below this estimated row count, the constructor follows up an
/// estimated `MAX(rowid)` with an exact `COUNT(*)`.
const EXACT_COUNT_THRESHOLD: i64 = 1000;

fn log_query(op: &str, sql: &str) {
    debug!(operation = op, sql, "executing statement");
}

/// One column of a grid, independent of whether it came from the catalog
/// (table/view) or a raw query's cursor description.
#[derive(Debug, Clone)]
pub struct GridColumn {
    pub name: String,
    pub decl_type: String,
    pub affinity: Affinity,
    pub pk: bool,
}

/// What a [`GridTable`] is backed by.
#[derive(Debug, Clone)]
pub enum GridSource {
    Table { category: Category, name: String },
    Query(String),
}

/// A column filter: equality for numeric affinities, substring match for
/// everything else.
#[derive(Debug, Clone)]
pub enum FilterValue {
    Equals(CellValue),
    Like(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

pub struct GridTable {
    source: GridSource,
    is_query: bool,
    read_only: bool,
    columns: Vec<GridColumn>,
    base_sql: String,
    rowid_name: Option<String>,
    single_pk: Option<String>,
    next_id: u64,
    /// Unfiltered, unsorted display order: cursor-advanced rows in
    /// arrival order, with newly inserted rows prepended.
    order: Vec<RowId>,
    rows: HashMap<RowId, GridRow>,
    rowids: HashMap<RowId, i64>,
    changed_set: HashSet<RowId>,
    backup_map: HashMap<RowId, GridRow>,
    new_list: Vec<RowId>,
    deleted_map: HashMap<RowId, GridRow>,
    filters: HashMap<String, FilterValue>,
    sort: Option<(String, SortDirection)>,
    visible: Vec<RowId>,
    fetched: usize,
    exhausted: bool,
    row_count: usize,
    row_count_estimated: bool,
}

impl GridTable {
    /// Opens a grid over `source`. `catalog` must be `Some` for
    /// [`GridSource::Table`] (its column list and rowid alias come
    /// from there); a raw [`GridSource::Query`] never needs one.
    pub fn open(conn: &Connection, source: GridSource, catalog: Option<&Catalog>) -> Result<Self> {
        Self::open_with_size_hint(conn, source, catalog, None, 0)
    }

    /// Like [`GridTable::open`], but also switches to an exact
    /// `COUNT(*)` whenever `file_size_bytes` is below `size_threshold_bytes`,
    /// in addition to the existing small-estimate fallback.
    pub fn open_with_size_hint(
        conn: &Connection,
        source: GridSource,
        catalog: Option<&Catalog>,
        file_size_bytes: Option<u64>,
        size_threshold_bytes: u64,
    ) -> Result<Self> {
        let prefer_exact = file_size_bytes.is_some_and(|sz| sz < size_threshold_bytes);
        match &source {
            GridSource::Table { category, name } => Self::open_table(conn, *category, name, catalog, prefer_exact),
            GridSource::Query(sql) => Self::open_query(conn, sql.clone()),
        }
    }

    fn open_table(
        conn: &Connection,
        category: Category,
        name: &str,
        catalog: Option<&Catalog>,
        prefer_exact_count: bool,
    ) -> Result<Self> {
        let catalog = catalog.ok_or_else(|| GridError::NotFound {
            entity: category.to_string(),
            name: name.to_string(),
        })?;
        let item = catalog.get(name).ok_or_else(|| GridError::NotFound {
            entity: category.to_string(),
            name: name.to_string(),
        })?;
        let read_only = category != Category::Table;
        let rowid_name = if category == Category::Table { catalog.get_rowid(name) } else { None };

        let column_meta = item.columns.clone().unwrap_or_default();
        let pk_cols = catalog.get_keys(name, true).0;
        let single_pk = match pk_cols.as_slice() {
            [one] if one.name.len() == 1 => Some(one.name[0].clone()),
            _ => None,
        };
        let columns: Vec<GridColumn> = column_meta
            .iter()
            .map(|c| GridColumn {
                name: c.name.clone(),
                decl_type: c.decl_type.clone(),
                affinity: Affinity::from_decl_type(&c.decl_type),
                pk: c.pk,
            })
            .collect();

        let quoted = quote(name, false);
        let base_sql = match &rowid_name {
            Some(rowid) => format!("SELECT {}, * FROM {}", quote(rowid, false), quoted),
            None => format!("SELECT * FROM {quoted}"),
        };

        let mut grid = GridTable {
            source: GridSource::Table { category, name: name.to_string() },
            is_query: false,
            read_only,
            columns,
            base_sql,
            rowid_name,
            single_pk,
            next_id: 0,
            order: Vec::new(),
            rows: HashMap::new(),
            rowids: HashMap::new(),
            changed_set: HashSet::new(),
            backup_map: HashMap::new(),
            new_list: Vec::new(),
            deleted_map: HashMap::new(),
            filters: HashMap::new(),
            sort: None,
            visible: Vec::new(),
            fetched: 0,
            exhausted: false,
            row_count: 0,
            row_count_estimated: false,
        };

        grid.estimate_row_count(conn, prefer_exact_count)?;
        grid.seek_to(conn, SEEK_CHUNK_LENGTH.saturating_sub(1))?;
        Ok(grid)
    }

    fn open_query(conn: &Connection, sql: String) -> Result<Self> {
        let column_names: Vec<String> = {
            let stmt = conn.prepare(&sql)?;
            stmt.column_names().into_iter().map(str::to_string).collect()
        };
        let columns = column_names
            .into_iter()
            .map(|name| GridColumn { name, decl_type: "TEXT".to_string(), affinity: Affinity::Text, pk: false })
            .collect();

        let mut grid = GridTable {
            source: GridSource::Query(sql.clone()),
            is_query: true,
            read_only: true,
            columns,
            base_sql: sql,
            rowid_name: None,
            single_pk: None,
            next_id: 0,
            order: Vec::new(),
            rows: HashMap::new(),
            rowids: HashMap::new(),
            changed_set: HashSet::new(),
            backup_map: HashMap::new(),
            new_list: Vec::new(),
            deleted_map: HashMap::new(),
            filters: HashMap::new(),
            sort: None,
            visible: Vec::new(),
            fetched: 0,
            exhausted: false,
            row_count: 0,
            row_count_estimated: true,
        };

        grid.seek_to(conn, SEEK_CHUNK_LENGTH.saturating_sub(1))?;
        // Refine column affinities from the first materialized row's
        // actual value types.
        if let Some(&first) = grid.order.first() {
            if let Some(row) = grid.rows.get(&first) {
                for col in &mut grid.columns {
                    if let Some(v) = row.values.get(&col.name) {
                        col.affinity = match v {
                            CellValue::Integer(_) => Affinity::Integer,
                            CellValue::Real(_) => Affinity::Real,
                            _ => col.affinity,
                        };
                    }
                }
            }
        }
        Ok(grid)
    }

    fn estimate_row_count(&mut self, conn: &Connection, prefer_exact_count: bool) -> Result<()> {
        let GridSource::Table { name, .. } = &self.source else { unreachable!() };
        let quoted = quote(name, false);
        if let Some(rowid) = &self.rowid_name {
            let sql = format!("SELECT MAX({}) FROM {}", quote(rowid, false), quoted);
            log_query("COUNT", &sql);
            let max_rowid: Option<i64> = conn.query_row(&sql, [], |r| r.get(0))?;
            let estimate = max_rowid.unwrap_or(0);
            if prefer_exact_count || estimate < EXACT_COUNT_THRESHOLD {
                let sql = format!("SELECT COUNT(*) FROM {quoted}");
                log_query("COUNT", &sql);
                let exact: i64 = conn.query_row(&sql, [], |r| r.get(0))?;
                self.row_count = exact as usize;
                self.row_count_estimated = false;
            } else {
                self.row_count = (((estimate + 99) / 100) * 100) as usize;
                self.row_count_estimated = true;
            }
        } else {
            let sql = format!("SELECT COUNT(*) FROM {quoted}");
            log_query("COUNT", &sql);
            let exact: i64 = conn.query_row(&sql, [], |r| r.get(0))?;
            self.row_count = exact as usize;
            self.row_count_estimated = false;
        }
        Ok(())
    }

    pub fn columns(&self) -> &[GridColumn] {
        &self.columns
    }

    pub fn is_query(&self) -> bool {
        self.is_query
    }

    pub fn is_complete(&self) -> bool {
        self.exhausted
    }

    /// Number of rows: currently filtered/visible count when a filter is
    /// active, else the (possibly estimated) total.
    pub fn row_count(&self) -> usize {
        if self.filters.is_empty() { self.row_count } else { self.visible.len() }
    }

    pub fn visible_row_count(&self) -> usize {
        self.visible.len()
    }

    fn next_id(&mut self) -> RowId {
        let id = RowId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Fetches from the cursor until `row` is materialized or the cursor
    /// is exhausted.
    pub fn seek_to(&mut self, conn: &Connection, row: usize) -> Result<()> {
        while !self.exhausted && row >= self.order.len() {
            let remaining = row + 1 - self.order.len();
            let chunk = self.fetch_chunk(conn, remaining)?;
            if chunk.is_empty() {
                self.exhausted = true;
                break;
            }
            let fetched_now = chunk.len();
            for (rowid, values) in chunk {
                let id = self.next_id();
                if let Some(r) = rowid {
                    self.rowids.insert(id, r);
                }
                let grid_row = GridRow { id, values, flags: RowFlags::default() };
                self.rows.insert(id, grid_row);
                self.order.push(id);
            }
            self.fetched += fetched_now;
            if fetched_now < remaining {
                self.exhausted = true;
            }
        }
        if self.is_query && self.row_count < self.order.len() {
            self.row_count = self.order.len();
        }
        self.recompute_visible();
        Ok(())
    }

    pub fn seek_ahead(&mut self, conn: &Connection) -> Result<()> {
        let target = self.order.len() + SEEK_CHUNK_LENGTH - 1;
        self.seek_to(conn, target)
    }

    pub fn seek_end(&mut self, conn: &Connection) -> Result<()> {
        while !self.exhausted {
            self.seek_ahead(conn)?;
        }
        Ok(())
    }

    fn fetch_chunk(&self, conn: &Connection, limit: usize) -> Result<Vec<(Option<i64>, HashMap<String, CellValue>)>> {
        let sql = format!("{} LIMIT {} OFFSET {}", self.base_sql, limit, self.fetched);
        log_query("SELECT", &sql);
        let mut stmt = conn.prepare(&sql).map_err(|e| GridError::Execution { sql: sql.clone(), source: e })?;
        let col_names: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
        let has_rowid = self.rowid_name.is_some();
        let mut rows = stmt.query([]).map_err(|e| GridError::Execution { sql: sql.clone(), source: e })?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| GridError::Execution { sql: sql.clone(), source: e })? {
            let mut rowid_val = None;
            let mut values = HashMap::new();
            for (i, name) in col_names.iter().enumerate() {
                let v: CellValue = row.get(i)?;
                if has_rowid && i == 0 {
                    rowid_val = match &v {
                        CellValue::Integer(n) => Some(*n),
                        _ => None,
                    };
                    continue;
                }
                values.insert(name.clone(), v);
            }
            out.push((rowid_val, values));
        }
        Ok(out)
    }

    /// Returns the visible row at `row`, seeking further if needed.
    pub fn row(&mut self, conn: &Connection, row: usize) -> Result<Option<&GridRow>> {
        if row >= self.visible.len() && !self.exhausted {
            self.seek_to(conn, row)?;
        }
        Ok(self.visible.get(row).and_then(|id| self.rows.get(id)))
    }

    pub fn value(&mut self, conn: &Connection, row: usize, column: &str) -> Result<Option<&CellValue>> {
        Ok(self.row(conn, row)?.and_then(|r| r.get(column)))
    }

    /// Coerces `raw` per the column's affinity and applies it, tracking
    /// the pre-edit backup the first time a row is touched.
    pub fn set_value(&mut self, row: usize, column: &str, raw: &str) -> Result<()> {
        if self.read_only {
            return Err(GridError::ReadOnly(self.display_name()));
        }
        let Some(&id) = self.visible.get(row) else {
            return Err(GridError::RowNotSeeked(row));
        };
        let affinity = self
            .columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.affinity)
            .unwrap_or(Affinity::Text);
        let value = CellValue::coerce(raw, affinity);

        let is_new = self.rows.get(&id).is_some_and(|r| r.flags.new);
        if !is_new && !self.backup_map.contains_key(&id) {
            if let Some(existing) = self.rows.get(&id) {
                self.backup_map.insert(id, existing.clone());
            }
        }
        if let Some(r) = self.rows.get_mut(&id) {
            r.values.insert(column.to_string(), value);
            if !is_new {
                r.flags.changed = true;
                self.changed_set.insert(id);
            }
        }
        Ok(())
    }

    /// Prepends an all-NULL row, visible immediately.
    pub fn insert(&mut self) -> Result<RowId> {
        if self.read_only {
            return Err(GridError::ReadOnly(self.display_name()));
        }
        let id = self.next_id();
        let values = self.columns.iter().map(|c| (c.name.clone(), CellValue::Null)).collect();
        let row = GridRow { id, values, flags: RowFlags { new: true, ..Default::default() } };
        self.rows.insert(id, row);
        self.order.insert(0, id);
        self.new_list.push(id);
        self.row_count += 1;
        self.recompute_visible();
        Ok(id)
    }

    /// Deletes the visible row at `row`: drops it outright if it was a
    /// new, uncommitted insert, otherwise moves it to `deleted_map`,
    /// carrying over any pending backup so rollback restores pre-edit
    /// values.
    pub fn delete(&mut self, row: usize) -> Result<()> {
        if self.read_only {
            return Err(GridError::ReadOnly(self.display_name()));
        }
        let Some(&id) = self.visible.get(row) else {
            return Err(GridError::RowNotSeeked(row));
        };
        let is_new = self.rows.get(&id).is_some_and(|r| r.flags.new);
        self.order.retain(|&x| x != id);
        if is_new {
            self.rows.remove(&id);
            self.new_list.retain(|&x| x != id);
            self.rowids.remove(&id);
        } else {
            let mut data = self.backup_map.remove(&id).unwrap_or_else(|| self.rows.get(&id).cloned().unwrap());
            self.changed_set.remove(&id);
            data.flags = RowFlags { deleted: true, ..Default::default() };
            self.rows.remove(&id);
            self.deleted_map.insert(id, data);
        }
        self.row_count = self.row_count.saturating_sub(1);
        self.recompute_visible();
        Ok(())
    }

    /// Deletes the row at `row` together with every row in other tables
    /// whose foreign key points at it, transitively, committing the whole
    /// cascade in one transaction. A new,
    /// uncommitted row is simply discarded like [`GridTable::delete`].
    ///
    /// Only follows foreign keys that reference a table's own primary key
    /// (what [`Catalog::get_keys`] reports) -- a foreign key pointing at a
    /// non-PK unique column is not traced, see DESIGN.md.
    pub fn delete_cascade(&mut self, conn: &Connection, catalog: &Catalog, row: usize) -> Result<()> {
        if self.read_only {
            return Err(GridError::ReadOnly(self.display_name()));
        }
        let GridSource::Table { name, .. } = &self.source else {
            return Err(GridError::ReadOnly(self.display_name()));
        };
        let root_table = name.clone();
        let Some(&id) = self.visible.get(row) else {
            return Err(GridError::RowNotSeeked(row));
        };
        if self.rows.get(&id).is_some_and(|r| r.flags.new) {
            return self.delete(row);
        }
        let grid_row = self.rows.get(&id).cloned().expect("visible row must be materialized");
        let root_keys = self.key_columns_and_args(&grid_row);
        if root_keys.is_empty() {
            return Err(GridError::NoRowIdentity(root_table));
        }

        // No method on this crate holds a `&mut Connection`, so an
        // explicit transaction has to come from `unchecked_transaction`
        // rather than `Connection::transaction`.
        let tx = conn.unchecked_transaction().map_err(|e| GridError::Execution { sql: "BEGIN".into(), source: e })?;

        const MAX_DEPTH: usize = 64;
        let mut discovered: Vec<(String, Vec<(String, CellValue)>)> = Vec::new();
        let mut queue: std::collections::VecDeque<(String, Vec<(String, CellValue)>, usize)> = std::collections::VecDeque::new();
        queue.push_back((root_table.clone(), root_keys, 0));

        while let Some((table, keys, depth)) = queue.pop_front() {
            if let Some(reason) = catalog.get_lock(Category::Table, &table, None) {
                return Err(GridError::Locked { name: table, reason: reason.to_string() });
            }
            if depth < MAX_DEPTH {
                let (dependents, _) = catalog.get_keys(&table, false);
                let where_sql =
                    keys.iter().map(|(n, _)| format!("{} IS ?", quote(n, false))).collect::<Vec<_>>().join(" AND ");
                for dep in dependents.iter().filter(|d| !d.table.is_empty()) {
                    let select_cols = dep.name.iter().map(|c| quote(c, false)).collect::<Vec<_>>().join(", ");
                    let select_sql = format!("SELECT {select_cols} FROM {} WHERE {where_sql}", quote(&table, false));
                    let args: Vec<CellValue> = keys.iter().map(|(_, v)| v.clone()).collect();
                    let arg_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
                    log_query("SELECT", &select_sql);
                    let mut stmt =
                        tx.prepare(&select_sql).map_err(|e| GridError::Execution { sql: select_sql.clone(), source: e })?;
                    let mut found =
                        stmt.query(arg_refs.as_slice()).map_err(|e| GridError::Execution { sql: select_sql.clone(), source: e })?;
                    let mut child_rows: Vec<Vec<CellValue>> = Vec::new();
                    while let Some(r) = found.next().map_err(|e| GridError::Execution { sql: select_sql.clone(), source: e })? {
                        let vals: rusqlite::Result<Vec<CellValue>> = (0..dep.name.len()).map(|i| r.get(i)).collect();
                        child_rows.push(vals?);
                    }
                    drop(found);
                    drop(stmt);
                    for (other_table, other_cols) in &dep.table {
                        for child_vals in &child_rows {
                            let pairs: Vec<(String, CellValue)> =
                                other_cols.iter().cloned().zip(child_vals.iter().cloned()).collect();
                            queue.push_back((other_table.clone(), pairs, depth + 1));
                        }
                    }
                }
            }
            discovered.push((table, keys));
        }

        // Group by (table, key-column-set) in first-discovery order, then
        // execute groups in reverse so dependents are gone before their
        // parent row, satisfying any enforced foreign key. Each group is
        // chunked so no single statement carries more than 1000 bind
        // parameters.
        const MAX_PARAMS: usize = 1000;
        let mut group_order: Vec<(String, Vec<String>)> = Vec::new();
        let mut groups: HashMap<(String, Vec<String>), Vec<Vec<CellValue>>> = HashMap::new();
        for (table, keys) in &discovered {
            let cols: Vec<String> = keys.iter().map(|(n, _)| n.clone()).collect();
            let group_key = (table.clone(), cols);
            groups.entry(group_key.clone()).or_insert_with(|| {
                group_order.push(group_key.clone());
                Vec::new()
            });
            groups.get_mut(&group_key).unwrap().push(keys.iter().map(|(_, v)| v.clone()).collect());
        }

        for (table, cols) in group_order.iter().rev() {
            let rows = &groups[&(table.clone(), cols.clone())];
            let chunk_len = (MAX_PARAMS / cols.len().max(1)).max(1);
            for chunk in rows.chunks(chunk_len) {
                let sql = if cols.len() == 1 {
                    let placeholders = vec!["?"; chunk.len()].join(", ");
                    format!("DELETE FROM {} WHERE {} IN ({placeholders})", quote(table, false), quote(&cols[0], false))
                } else {
                    let tuple = format!("({})", vec!["?"; cols.len()].join(", "));
                    let placeholders = vec![tuple; chunk.len()].join(", ");
                    let col_list = cols.iter().map(|c| quote(c, false)).collect::<Vec<_>>().join(", ");
                    format!("DELETE FROM {} WHERE ({col_list}) IN ({placeholders})", quote(table, false))
                };
                let args: Vec<CellValue> = chunk.iter().flat_map(|row| row.iter().cloned()).collect();
                let arg_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
                log_query("DELETE", &sql);
                tx.execute(&sql, arg_refs.as_slice()).map_err(|e| GridError::Execution { sql, source: e })?;
            }
        }

        tx.commit().map_err(|e| GridError::Execution { sql: "COMMIT".into(), source: e })?;

        self.order.retain(|&x| x != id);
        self.rows.remove(&id);
        self.rowids.remove(&id);
        self.backup_map.remove(&id);
        self.changed_set.remove(&id);
        self.row_count = self.row_count.saturating_sub(1);
        self.recompute_visible();
        Ok(())
    }

    pub fn set_filter(&mut self, column: &str, raw: &str) {
        let affinity = self.columns.iter().find(|c| c.name == column).map(|c| c.affinity).unwrap_or(Affinity::Text);
        let value = match affinity {
            Affinity::Integer | Affinity::Real | Affinity::Numeric => {
                FilterValue::Equals(CellValue::coerce(raw, affinity))
            }
            Affinity::Text | Affinity::Blob => FilterValue::Like(raw.to_string()),
        };
        self.filters.insert(column.to_string(), value);
        self.recompute_visible();
    }

    pub fn clear_filter(&mut self, column: &str) {
        self.filters.remove(column);
        self.recompute_visible();
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.recompute_visible();
    }

    /// Cycles ascending -> descending -> unsorted on `column`, draining
    /// the cursor first since sorting needs every row materialized.
    pub fn toggle_sort(&mut self, conn: &Connection, column: &str) -> Result<()> {
        self.seek_end(conn)?;
        self.sort = match &self.sort {
            Some((c, SortDirection::Ascending)) if c == column => {
                Some((column.to_string(), SortDirection::Descending))
            }
            Some((c, SortDirection::Descending)) if c == column => None,
            _ => Some((column.to_string(), SortDirection::Ascending)),
        };
        self.recompute_visible();
        Ok(())
    }

    fn is_row_filtered(&self, row: &GridRow) -> bool {
        self.filters.iter().any(|(col, filter)| {
            let value = row.values.get(col);
            match filter {
                FilterValue::Equals(want) => value != Some(want),
                FilterValue::Like(needle) => {
                    let text = value.map(|v| v.to_string()).unwrap_or_default();
                    !text.to_lowercase().contains(&needle.to_lowercase())
                }
            }
        })
    }

    fn recompute_visible(&mut self) {
        let mut visible: Vec<RowId> =
            self.order.iter().filter(|id| self.rows.get(id).is_some_and(|r| !self.is_row_filtered(r))).copied().collect();
        if let Some((col, dir)) = &self.sort {
            visible.sort_by(|a, b| {
                let va = self.rows.get(a).and_then(|r| r.values.get(col));
                let vb = self.rows.get(b).and_then(|r| r.values.get(col));
                let ord = compare_cells(va, vb);
                if *dir == SortDirection::Descending { ord.reverse() } else { ord }
            });
        }
        self.visible = visible;
    }

    fn display_name(&self) -> String {
        match &self.source {
            GridSource::Table { name, .. } => name.clone(),
            GridSource::Query(_) => "query".to_string(),
        }
    }

    /// Writes every pending change to the database: UPDATEs for
    /// `changed_set`, INSERTs for `new_list`, DELETEs for `deleted_map`,
    /// in that order. A failure aborts the
    /// remaining batch; rows already committed are retired from their
    /// sets, failed ones stay pending.
    pub fn commit(&mut self, conn: &Connection) -> Result<()> {
        let GridSource::Table { name, .. } = &self.source else {
            return Err(GridError::ReadOnly(self.display_name()));
        };
        let name = name.clone();

        for id in self.changed_set.clone() {
            let row = self.rows.get(&id).cloned().expect("changed row must be materialized");
            let backup = self.backup_map.get(&id).cloned().expect("changed row must have a backup");
            self.update_row(conn, &name, &row, &backup)?;
            self.changed_set.remove(&id);
            self.backup_map.remove(&id);
            if let Some(r) = self.rows.get_mut(&id) {
                r.flags.changed = false;
            }
        }

        for id in self.new_list.clone() {
            let row = self.rows.get(&id).cloned().expect("new row must be materialized");
            let last_rowid = self.insert_row(conn, &name, &row)?;
            if let Some(pk) = &self.single_pk {
                let pk_affinity = self.columns.iter().find(|c| &c.name == pk).map(|c| c.affinity);
                if pk_affinity == Some(Affinity::Integer) && row.values.get(pk).is_none_or(CellValue::is_null) {
                    if let Some(r) = self.rows.get_mut(&id) {
                        r.values.insert(pk.clone(), CellValue::Integer(last_rowid));
                    }
                }
            } else {
                self.rowids.insert(id, last_rowid);
            }
            if let Some(r) = self.rows.get_mut(&id) {
                r.flags.new = false;
            }
            self.new_list.retain(|&x| x != id);
        }

        for id in self.deleted_map.keys().copied().collect::<Vec<_>>() {
            let row = self.deleted_map.get(&id).cloned().unwrap();
            self.delete_row(conn, &name, &row, self.rowids.get(&id).copied())?;
            self.deleted_map.remove(&id);
            self.rowids.remove(&id);
        }
        Ok(())
    }

    fn key_columns_and_args(&self, row: &GridRow) -> Vec<(String, CellValue)> {
        if let Some(pk) = &self.single_pk {
            if let Some(v) = row.values.get(pk) {
                return vec![(pk.clone(), v.clone())];
            }
        }
        self.columns.iter().filter_map(|c| row.values.get(&c.name).map(|v| (c.name.clone(), v.clone()))).collect()
    }

    fn update_row(&self, conn: &Connection, table: &str, row: &GridRow, backup: &GridRow) -> Result<()> {
        let changed_cols: Vec<&str> =
            self.columns.iter().map(|c| c.name.as_str()).filter(|n| row.values.get(*n) != backup.values.get(*n)).collect();
        if changed_cols.is_empty() {
            return Ok(());
        }
        let set_sql = changed_cols.iter().map(|c| format!("{} = ?", quote(c, false))).collect::<Vec<_>>().join(", ");
        let mut params: Vec<&dyn rusqlite::ToSql> = changed_cols.iter().map(|c| row.values.get(*c).unwrap() as &dyn rusqlite::ToSql).collect();

        let (where_sql, key_vals) = if let Some(rowid) = self.rowids.get(&row.id) {
            ("_rowid_ IS ?".to_string(), vec![CellValue::Integer(*rowid)])
        } else {
            let keys = self.key_columns_and_args(backup);
            let where_sql = keys.iter().map(|(n, _)| format!("{} IS ?", quote(n, false))).collect::<Vec<_>>().join(" AND ");
            (where_sql, keys.into_iter().map(|(_, v)| v.clone()).collect())
        };
        params.extend(key_vals.iter().map(|v| v as &dyn rusqlite::ToSql));

        let sql = format!("UPDATE {} SET {} WHERE {}", quote(table, false), set_sql, where_sql);
        log_query("UPDATE", &sql);
        conn.execute(&sql, params.as_slice()).map_err(|e| GridError::Execution { sql, source: e })?;
        Ok(())
    }

    fn insert_row(&self, conn: &Connection, table: &str, row: &GridRow) -> Result<i64> {
        let cols: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        let sql = if cols.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote(table, false))
        } else {
            let col_list = cols.iter().map(|c| quote(c, false)).collect::<Vec<_>>().join(", ");
            let placeholders = vec!["?"; cols.len()].join(", ");
            format!("INSERT INTO {} ({}) VALUES ({})", quote(table, false), col_list, placeholders)
        };
        log_query("INSERT", &sql);
        let params: Vec<&dyn rusqlite::ToSql> =
            cols.iter().map(|c| row.values.get(*c).unwrap_or(&CellValue::Null) as &dyn rusqlite::ToSql).collect();
        conn.execute(&sql, params.as_slice()).map_err(|e| GridError::Execution { sql, source: e })?;
        Ok(conn.last_insert_rowid())
    }

    fn delete_row(&self, conn: &Connection, table: &str, row: &GridRow, rowid: Option<i64>) -> Result<()> {
        let (where_sql, params): (String, Vec<CellValue>) = if let Some(rowid) = rowid {
            ("_rowid_ IS ?".to_string(), vec![CellValue::Integer(rowid)])
        } else {
            let keys = self.key_columns_and_args(row);
            let where_sql = keys.iter().map(|(n, _)| format!("{} IS ?", quote(n, false))).collect::<Vec<_>>().join(" AND ");
            (where_sql, keys.into_iter().map(|(_, v)| v.clone()).collect())
        };
        let sql = format!("DELETE FROM {} WHERE {}", quote(table, false), where_sql);
        log_query("DELETE", &sql);
        let args: Vec<&dyn rusqlite::ToSql> = params.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
        conn.execute(&sql, args.as_slice()).map_err(|e| GridError::Execution { sql, source: e })?;
        Ok(())
    }

    /// Restores the pre-edit visible state: changed rows from
    /// `backup_map`, discards uncommitted inserts, and restores deleted
    /// rows.
    pub fn rollback(&mut self) {
        for (id, backup) in self.backup_map.drain() {
            self.rows.insert(id, backup);
            self.changed_set.remove(&id);
        }
        for id in self.new_list.drain(..) {
            self.rows.remove(&id);
            self.order.retain(|&x| x != id);
            self.rowids.remove(&id);
        }
        for (id, mut row) in self.deleted_map.drain() {
            row.flags = RowFlags::default();
            self.rows.insert(id, row);
            self.order.push(id);
        }
        self.row_count = self.order.len().max(self.row_count);
        self.recompute_visible();
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.changed_set.is_empty() || !self.new_list.is_empty() || !self.deleted_map.is_empty()
    }
}

/// String comparison is case-insensitive, numeric values compare
/// numerically.
fn compare_cells(a: Option<&CellValue>, b: Option<&CellValue>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    use CellValue::*;

    fn as_f64(v: &CellValue) -> Option<f64> {
        match v {
            Integer(i) => Some(*i as f64),
            Real(r) => Some(*r),
            _ => None,
        }
    }

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => match (as_f64(x), as_f64(y)) {
            (Some(fx), Some(fy)) => fx.partial_cmp(&fy).unwrap_or(Ordering::Equal),
            _ => x.to_string().to_lowercase().cmp(&y.to_string().to_lowercase()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlitely_catalog::Catalog;

    fn setup() -> (Connection, Catalog) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, age INTEGER);
             INSERT INTO t (name, age) VALUES ('alice', 30), ('bob', 40);",
        )
        .unwrap();
        let catalog = Catalog::populate_all(&conn).unwrap();
        (conn, catalog)
    }

    #[test]
    fn seeks_and_reads_values() {
        let (conn, catalog) = setup();
        let mut grid =
            GridTable::open(&conn, GridSource::Table { category: Category::Table, name: "t".into() }, Some(&catalog)).unwrap();
        assert_eq!(grid.row_count(), 2);
        let v = grid.value(&conn, 0, "name").unwrap().unwrap();
        assert_eq!(v, &CellValue::Text("alice".into()));
    }

    #[test]
    fn edit_then_commit_updates_database() {
        let (conn, catalog) = setup();
        let mut grid =
            GridTable::open(&conn, GridSource::Table { category: Category::Table, name: "t".into() }, Some(&catalog)).unwrap();
        grid.set_value(0, "age", "31").unwrap();
        assert!(grid.has_pending_changes());
        grid.commit(&conn).unwrap();
        assert!(!grid.has_pending_changes());
        let age: i64 = conn.query_row("SELECT age FROM t WHERE name = 'alice'", [], |r| r.get(0)).unwrap();
        assert_eq!(age, 31);
    }

    #[test]
    fn edit_then_rollback_restores_value() {
        let (conn, catalog) = setup();
        let mut grid =
            GridTable::open(&conn, GridSource::Table { category: Category::Table, name: "t".into() }, Some(&catalog)).unwrap();
        let before = grid.value(&conn, 0, "age").unwrap().cloned();
        grid.set_value(0, "age", "99").unwrap();
        grid.rollback();
        assert!(!grid.has_pending_changes());
        let after = grid.value(&conn, 0, "age").unwrap().cloned();
        assert_eq!(before, after);
    }

    #[test]
    fn insert_then_commit_adds_row() {
        let (conn, catalog) = setup();
        let mut grid =
            GridTable::open(&conn, GridSource::Table { category: Category::Table, name: "t".into() }, Some(&catalog)).unwrap();
        grid.insert().unwrap();
        grid.set_value(0, "name", "carol").unwrap();
        grid.set_value(0, "age", "20").unwrap();
        grid.commit(&conn).unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn delete_then_commit_removes_row() {
        let (conn, catalog) = setup();
        let mut grid =
            GridTable::open(&conn, GridSource::Table { category: Category::Table, name: "t".into() }, Some(&catalog)).unwrap();
        grid.delete(0).unwrap();
        grid.commit(&conn).unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn filter_retains_only_matching_rows() {
        let (conn, catalog) = setup();
        let mut grid =
            GridTable::open(&conn, GridSource::Table { category: Category::Table, name: "t".into() }, Some(&catalog)).unwrap();
        grid.set_filter("name", "ali");
        assert_eq!(grid.visible_row_count(), 1);
    }

    #[test]
    fn delete_cascade_removes_dependent_rows() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE parent (id INTEGER PRIMARY KEY, name TEXT);
             CREATE TABLE child (id INTEGER PRIMARY KEY, parent_id INTEGER REFERENCES parent(id), note TEXT);
             INSERT INTO parent (id, name) VALUES (1, 'alice'), (2, 'bob');
             INSERT INTO child (parent_id, note) VALUES (1, 'a1'), (1, 'a2'), (2, 'b1');",
        )
        .unwrap();
        let catalog = Catalog::populate_all(&conn).unwrap();
        let mut grid =
            GridTable::open(&conn, GridSource::Table { category: Category::Table, name: "parent".into() }, Some(&catalog))
                .unwrap();
        let row = (0..grid.visible_row_count())
            .find(|&i| grid.value(&conn, i, "name").unwrap() == Some(&CellValue::Text("alice".into())))
            .unwrap();
        grid.delete_cascade(&conn, &catalog, row).unwrap();

        let parents: i64 = conn.query_row("SELECT COUNT(*) FROM parent", [], |r| r.get(0)).unwrap();
        let children: i64 = conn.query_row("SELECT COUNT(*) FROM child", [], |r| r.get(0)).unwrap();
        assert_eq!(parents, 1);
        assert_eq!(children, 1);
    }
}
