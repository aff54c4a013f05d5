//! `sqlitely schema` -- list catalog items.

use anyhow::{anyhow, Result};
use rusqlite::Connection;
use sqlitely_catalog::Catalog;
use sqlitely_grammar::{generate, Category, GenerateOptions};

use crate::cli::SchemaArgs;
use crate::config::RuntimeConfig;
use crate::output::print_rows;

pub fn run(conn: &Connection, args: &SchemaArgs, config: &RuntimeConfig, json: bool) -> Result<()> {
    let catalog = Catalog::populate_all(conn)?;

    let category = args.category.as_deref().map(parse_category).transpose()?;
    let opts = if config.indent.is_empty() { GenerateOptions::compact() } else { GenerateOptions::default() };

    let headers =
        vec!["category".to_string(), "name".to_string(), "table".to_string(), "parsed".to_string(), "sql".to_string()];
    let rows: Vec<Vec<String>> = catalog
        .items()
        .iter()
        .filter(|item| category.map(|c| item.category == c).unwrap_or(true))
        .filter(|item| args.name.as_deref().map(|n| item.name.eq_ignore_ascii_case(n)).unwrap_or(true))
        .map(|item| {
            let sql = item.meta.as_ref().and_then(|stmt| generate(stmt, opts).ok()).unwrap_or_else(|| item.sql.clone());
            vec![item.category.as_str().to_string(), item.name.clone(), item.tbl_name.clone(), item.parsed.to_string(), sql]
        })
        .collect();

    print_rows(&headers, &rows, json);
    Ok(())
}

fn parse_category(s: &str) -> Result<Category> {
    match s.to_ascii_lowercase().as_str() {
        "table" => Ok(Category::Table),
        "index" => Ok(Category::Index),
        "trigger" => Ok(Category::Trigger),
        "view" => Ok(Category::View),
        other => Err(anyhow!("unknown category `{other}` (expected table, index, trigger, or view)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_category() {
        assert!(parse_category("bogus").is_err());
    }

    #[test]
    fn accepts_known_categories_case_insensitively() {
        assert_eq!(parse_category("TABLE").unwrap(), Category::Table);
        assert_eq!(parse_category("View").unwrap(), Category::View);
    }
}
