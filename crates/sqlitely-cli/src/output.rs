//! Output formatting helpers: a plain text table and a JSON passthrough,
//! splitting human and machine-readable rendering.

use serde::Serialize;

/// Prints `rows` (each a list of already-stringified cells) as a padded
/// text table with `headers`, or as a JSON array of objects when `json`
/// is set.
pub fn print_rows(headers: &[String], rows: &[Vec<String>], json: bool) {
    if json {
        print_json_rows(headers, rows);
        return;
    }
    println!("{}", format_table(headers, rows));
}

/// Renders `headers`/`rows` as a padded text table, or `"(no rows)"` when
/// empty. Split out from [`print_rows`] so formatting can be asserted on
/// directly in tests.
fn format_table(headers: &[String], rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return "(no rows)".to_string();
    }
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.len());
            }
        }
    }
    let mut lines = vec![format_row(headers, &widths), widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-")];
    lines.extend(rows.iter().map(|row| format_row(row, &widths)));
    lines.join("\n")
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    cells.iter().enumerate().map(|(i, c)| format!("{:width$}", c, width = widths.get(i).copied().unwrap_or(0))).collect::<Vec<_>>().join(" | ")
}

fn print_json_rows(headers: &[String], rows: &[Vec<String>]) {
    let objs: Vec<serde_json::Map<String, serde_json::Value>> = rows
        .iter()
        .map(|row| {
            let mut map = serde_json::Map::new();
            for (i, h) in headers.iter().enumerate() {
                map.insert(h.clone(), serde_json::Value::String(row.get(i).cloned().unwrap_or_default()));
            }
            map
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&objs).unwrap_or_default());
}

/// Prints any serializable value as pretty JSON, or falls back to
/// `Debug` formatting in text mode (used for one-off structured results
/// like an alter plan preview that has no natural tabular shape).
pub fn print_value<T: Serialize + std::fmt::Debug>(value: &T, json: bool) {
    if json {
        match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{s}"),
            Err(_) => println!("{value:?}"),
        }
    } else {
        println!("{value:#?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_output_pads_columns_to_the_widest_cell() {
        let headers = vec!["name".to_string(), "type".to_string()];
        let rows = vec![vec!["widgets".to_string(), "table".to_string()], vec!["ix".to_string(), "index".to_string()]];
        let text = format_table(&headers, &rows);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "name    | type ");
        assert_eq!(lines[2], "widgets | table");
        assert_eq!(lines[3], "ix      | index");
    }

    #[test]
    fn empty_rows_render_placeholder() {
        assert_eq!(format_table(&["a".to_string()], &[]), "(no rows)");
    }
}
