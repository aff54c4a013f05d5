//! A random-access, editable, filterable, sortable view over either a
//! known table/view or an arbitrary `SELECT`, built on top of a
//! forward-only cursor.
//!
//! [`GridTable`] never holds a live `rusqlite::Statement`: every crate in
//! this workspace takes `&Connection` per call rather than owning one
//! (see `sqlitely-catalog::Catalog::populate`, `sqlitely-alter`'s
//! `AlterPlanner::execute`), so seeking further into the cursor re-issues
//! a `LIMIT ... OFFSET ...` query against the same base `SELECT` rather
//! than keeping a borrowed `Rows` alive across calls -- see DESIGN.md.

pub mod error;
pub mod row;
pub mod table;
pub mod value;

pub use error::GridError;
pub use row::{GridRow, RowFlags, RowId};
pub use table::{FilterValue, GridColumn, GridSource, GridTable, SortDirection};
pub use value::{Affinity, CellValue};
