//! Compiles a parsed search query into a parameterised `WHERE` fragment
//! plus its bind values.

use std::collections::HashMap;

use rusqlite::types::Value;
use sqlitely_catalog::{ColumnMeta, SchemaItem};
use sqlitely_grammar::ident::quote;

use crate::error::Result;
use crate::parser::{Node, Parser};

/// Result of [`SearchCompiler::compile`]: the SQL fragment (or, when
/// `target` was given, a full `SELECT`), its bind parameters, the flat
/// word/phrase list (for metadata matching against stored CREATE SQL,
/// "Search worker"), and the global keyword map.
#[derive(Debug, Clone, Default)]
pub struct CompiledSearch {
    /// Empty when `target` was given but excluded by a `table:`/`view:`
    /// keyword.
    pub sql: String,
    pub params: Vec<(String, Value)>,
    pub words: Vec<String>,
    pub keywords: HashMap<String, Vec<String>>,
}

pub struct SearchCompiler;

impl SearchCompiler {
    /// Compiles `query`. With `target` set, returns a full
    /// `SELECT * FROM <item> WHERE ...` ready to run; without it, only
    /// `words`/`keywords` are populated, for matching against schema
    /// metadata text directly.
    pub fn compile(query: &str, target: Option<&SchemaItem>) -> Result<CompiledSearch> {
        let mut parser = Parser::new(query);
        let tree = parser.parse()?;
        let keywords = parser.keywords;
        let mut words = Vec::new();
        collect_words(tree.as_ref(), &mut words);

        let columns: Vec<ColumnMeta> = target.and_then(|t| t.columns.clone()).unwrap_or_default();

        if let Some(item) = target {
            if item_excluded(item, &keywords) {
                return Ok(CompiledSearch { sql: String::new(), params: Vec::new(), words, keywords });
            }
        }

        let text_columns: Vec<&ColumnMeta> =
            columns.iter().filter(|c| is_text_affinity(&c.decl_type)).filter(|c| column_allowed(c, &keywords)).collect();

        let mut params = Vec::new();
        let fragment = tree.as_ref().map(|n| render(n, &text_columns, &mut params)).unwrap_or_default();
        let kw_sql = render_keywords(&keywords, &columns, &mut params);
        let body = and_join(&[fragment, kw_sql]);

        let sql = match target {
            None => String::new(),
            Some(item) => {
                let where_clause = if body.is_empty() { "1 = 1".to_string() } else { body };
                let mut sql = format!("SELECT * FROM {} WHERE {}", quote(&item.name, false), where_clause);
                let pk_cols: Vec<&ColumnMeta> = columns.iter().filter(|c| c.pk).collect();
                if !pk_cols.is_empty() {
                    let order =
                        pk_cols.iter().map(|c| format!("{} ASC", quote(&c.name, false))).collect::<Vec<_>>().join(", ");
                    sql.push_str(&format!(" ORDER BY {order}"));
                }
                sql
            }
        };

        tracing::debug!(query, sql = %sql, "compiled search query");
        Ok(CompiledSearch { sql, params, words, keywords })
    }
}

fn collect_words(node: Option<&Node>, out: &mut Vec<String>) {
    match node {
        None => {}
        Some(Node::Word(w)) => out.push(w.clone()),
        Some(Node::Phrase(p)) => out.push(p.clone()),
        Some(Node::Not(_)) => {} // negated atoms don't contribute display words, matching the original
        Some(Node::And(items) | Node::Or(items)) => {
            for i in items {
                collect_words(Some(i), out);
            }
        }
    }
}

/// `true` if `decl_type` is one SQLite would give TEXT affinity to;
/// bare-word matches skip everything else.
fn is_text_affinity(decl_type: &str) -> bool {
    let up = decl_type.to_ascii_uppercase();
    decl_type.is_empty() || up.contains("CHAR") || up.contains("CLOB") || up.contains("TEXT") || up.contains("BLOB")
}

/// `true` when `decl_type` is one of the two date-ish declared types the
/// original recognises for `date:` matching.
fn is_date_affinity(decl_type: &str) -> bool {
    let up = decl_type.trim().to_ascii_uppercase();
    up == "DATE" || up == "DATETIME"
}

fn column_allowed(col: &ColumnMeta, keywords: &HashMap<String, Vec<String>>) -> bool {
    matches_keyword_filter(&col.name, keywords, "column")
}

fn matches_keyword_filter(name: &str, keywords: &HashMap<String, Vec<String>>, key: &str) -> bool {
    let lower = name.to_lowercase();
    if let Some(vals) = keywords.get(key) {
        if !vals.iter().any(|v| lower.contains(v.as_str())) {
            return false;
        }
    }
    if let Some(vals) = keywords.get(&format!("-{key}")) {
        if vals.iter().any(|v| lower.contains(v.as_str())) {
            return false;
        }
    }
    true
}

fn item_excluded(item: &SchemaItem, keywords: &HashMap<String, Vec<String>>) -> bool {
    let kind = item.category.to_string().to_lowercase();
    for (key, vals) in keywords {
        let (negated, bare) = key.strip_prefix('-').map(|b| (true, b)).unwrap_or((false, key.as_str()));
        if bare != "table" && bare != "view" {
            continue;
        }
        if bare != kind {
            continue;
        }
        let lower = item.name.to_lowercase();
        let matched = vals.iter().any(|v| lower.contains(v.as_str()));
        if negated && matched {
            return true;
        }
        if !negated && !matched {
            return true;
        }
    }
    false
}

fn next_param(params: &[(String, Value)]) -> String {
    format!(":p{}", params.len())
}

/// Escapes `_`/`%` for a safe `LIKE` match; when `wildcard` is set, a
/// literal `*` is turned into SQL's `%`. Returns
/// whether any `_`/`%` escaping was applied, which is when `ESCAPE '\'`
/// needs declaring.
fn escape_value(raw: &str, wildcard: bool) -> (String, bool) {
    let mut out = String::with_capacity(raw.len());
    let mut used_escape = false;
    for c in raw.chars() {
        match c {
            '%' => {
                out.push('\\');
                out.push('%');
                used_escape = true;
            }
            '_' => {
                out.push('\\');
                out.push('_');
                used_escape = true;
            }
            '*' if wildcard => out.push('%'),
            other => out.push(other),
        }
    }
    (out, used_escape)
}

fn render_word(raw: &str, wildcard: bool, columns: &[&ColumnMeta], params: &mut Vec<(String, Value)>) -> String {
    if columns.is_empty() {
        return "1 = 0".to_string();
    }
    let (escaped, used_escape) = escape_value(raw, wildcard);
    let name = next_param(params);
    params.push((name.clone(), Value::Text(format!("%{escaped}%"))));
    let clauses: Vec<String> = columns
        .iter()
        .map(|c| {
            let mut clause = format!("{} LIKE {name}", quote(&c.name, false));
            if used_escape {
                clause.push_str(" ESCAPE '\\'");
            }
            clause
        })
        .collect();
    if clauses.len() > 1 {
        format!("({})", clauses.join(" OR "))
    } else {
        clauses.into_iter().next().unwrap_or_else(|| "1 = 0".to_string())
    }
}

fn render(node: &Node, columns: &[&ColumnMeta], params: &mut Vec<(String, Value)>) -> String {
    match node {
        Node::Word(w) => render_word(w, true, columns, params),
        Node::Phrase(p) => render_word(p, false, columns, params),
        Node::Not(inner) => format!("NOT {}", wrap(render(inner, columns, params))),
        Node::And(items) => join(items, " AND ", columns, params),
        Node::Or(items) => join(items, " OR ", columns, params),
    }
}

fn join(items: &[Node], glue: &str, columns: &[&ColumnMeta], params: &mut Vec<(String, Value)>) -> String {
    let rendered: Vec<String> = items.iter().map(|n| render(n, columns, params)).filter(|s| !s.is_empty()).collect();
    if rendered.len() > 1 {
        format!("({})", rendered.join(glue))
    } else {
        rendered.into_iter().next().unwrap_or_default()
    }
}

fn wrap(s: String) -> String {
    if s.starts_with('(') && s.ends_with(')') { s } else { format!("({s})") }
}

fn and_join(parts: &[String]) -> String {
    parts.iter().filter(|s| !s.is_empty()).cloned().collect::<Vec<_>>().join(" AND ")
}

/// Renders the `date:`/`-date:` keyword clauses. A single `YYYY[-MM[-DD]]` spec matches with `STRFTIME`; a
/// `[from]..[to]` range matches with `>=`/`<=` comparisons against a
/// zero-padded `YYYY-MM-DD` bound, clamping out-of-range components
/// (month to 1..12, day to the month's legal range) rather than rejecting
/// them, per the original.
fn render_keywords(keywords: &HashMap<String, Vec<String>>, columns: &[ColumnMeta], params: &mut Vec<(String, Value)>) -> String {
    let mut clauses = Vec::new();
    for (key, values) in keywords {
        let bare = key.strip_prefix('-').unwrap_or(key.as_str());
        if bare != "date" {
            continue;
        }
        let negated = key.starts_with('-');
        let datecols: Vec<&ColumnMeta> =
            columns.iter().filter(|c| is_date_affinity(&c.decl_type)).filter(|c| column_allowed(c, keywords)).collect();

        let mut or_parts = Vec::new();
        for value in values {
            if datecols.is_empty() {
                or_parts.push("1 = 0".to_string());
                continue;
            }
            or_parts.push(render_date_spec(value, &datecols, params));
        }
        let joined = or_parts.into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" OR ");
        if joined.is_empty() {
            continue;
        }
        let joined = if negated { format!("NOT ({joined})") } else { joined };
        clauses.push(joined);
    }
    and_join(&clauses)
}

fn render_date_spec(spec: &str, datecols: &[&ColumnMeta], params: &mut Vec<(String, Value)>) -> String {
    if let Some((from, to)) = spec.split_once("..") {
        let mut bounds = Vec::new();
        if let Some(d) = clamp_date(from, false) {
            let name = next_param(params);
            params.push((name.clone(), Value::Text(d)));
            let cols: Vec<String> = datecols.iter().map(|c| format!("{} >= {name}", quote(&c.name, false))).collect();
            bounds.push(if cols.len() > 1 { format!("({})", cols.join(" OR ")) } else { cols.join("") });
        }
        if let Some(d) = clamp_date(to, true) {
            let name = next_param(params);
            params.push((name.clone(), Value::Text(d)));
            let cols: Vec<String> = datecols.iter().map(|c| format!("{} <= {name}", quote(&c.name, false))).collect();
            bounds.push(if cols.len() > 1 { format!("({})", cols.join(" OR ")) } else { cols.join("") });
        }
        bounds.join(" AND ")
    } else {
        let parts: Vec<&str> = spec.split('-').take(3).filter(|s| !s.is_empty()).collect();
        if parts.is_empty() || parts[0].parse::<i64>().is_err() {
            return String::new();
        }
        let mut format = String::new();
        let mut value = String::new();
        for (i, (frm, part)) in ["%Y", "%m", "%d"].iter().zip(parts.iter()).enumerate() {
            let Ok(n) = part.parse::<i64>() else { continue };
            format.push_str(frm);
            if i > 0 {
                value.push('-');
            }
            value.push_str(&if i == 0 { format!("{n:04}") } else { format!("{n:02}") });
        }
        let name = next_param(params);
        params.push((name.clone(), Value::Text(value)));
        let cols: Vec<String> =
            datecols.iter().map(|c| format!("STRFTIME('{format}', {}) = {name}", quote(&c.name, false))).collect();
        if cols.len() > 1 { format!("({})", cols.join(" OR ")) } else { cols.join("") }
    }
}

/// Parses and clamps a (possibly partial) `YYYY[-MM[-DD]]` string into a
/// zero-padded `YYYY-MM-DD`, defaulting the missing month/day to the first
/// (lower bound) or last (upper bound) legal value, per the original's
/// range-bound handling.
fn clamp_date(part: &str, upper: bool) -> Option<String> {
    let comps: Vec<&str> = part.split('-').take(3).filter(|s| !s.is_empty()).collect();
    if comps.is_empty() {
        return None;
    }
    let year = comps.first()?.parse::<i64>().ok()?.clamp(1, 9999);
    let month = match comps.get(1).and_then(|m| m.parse::<u32>().ok()) {
        Some(m) => m.clamp(1, 12),
        None => if upper { 12 } else { 1 },
    };
    let day_max = days_in_month(year, month);
    let day = match comps.get(2).and_then(|d| d.parse::<u32>().ok()) {
        Some(d) => d.clamp(1, day_max),
        None => if upper { day_max } else { 1 },
    };
    Some(format!("{year:04}-{month:02}-{day:02}"))
}

fn days_in_month(year: i64, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 30,
    }
}

fn is_leap_year(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use sqlitely_catalog::Catalog;

    use super::*;

    fn table(conn: &Connection, ddl: &str, name: &str) -> SchemaItem {
        conn.execute_batch(ddl).unwrap();
        let catalog = Catalog::populate_all(conn).unwrap();
        catalog.get(name).unwrap().clone()
    }

    #[test]
    fn bare_words_like_every_text_column() {
        let conn = Connection::open_in_memory().unwrap();
        let target = table(&conn, "CREATE TABLE t (name TEXT PRIMARY KEY, age INTEGER);", "t");
        let compiled = SearchCompiler::compile("alice", Some(&target)).unwrap();
        assert!(compiled.sql.contains("name"));
        assert!(!compiled.sql.contains("\"age\""));
        assert_eq!(compiled.params.len(), 1);
    }

    #[test]
    fn date_range_and_column_exclusion_scenario() {
        let conn = Connection::open_in_memory().unwrap();
        let target =
            table(&conn, "CREATE TABLE t (created DATE, name TEXT, secret TEXT);", "t");
        let compiled = SearchCompiler::compile("date:2020..2021 -column:secret foo bar", Some(&target)).unwrap();
        assert!(compiled.sql.contains("created"));
        assert!(compiled.sql.contains("STRFTIME") || compiled.sql.contains(">="));
        assert!(!compiled.sql.contains("\"secret\""));
        assert!(compiled.sql.contains("name"));
        assert_eq!(compiled.words, vec!["foo".to_string(), "bar".to_string()]);
    }

    #[test]
    fn table_keyword_excludes_non_matching_item() {
        let conn = Connection::open_in_memory().unwrap();
        let target = table(&conn, "CREATE TABLE t (name TEXT);", "t");
        let compiled = SearchCompiler::compile("table:other foo", Some(&target)).unwrap();
        assert!(compiled.sql.is_empty());
    }
}
