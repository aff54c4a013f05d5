//! Identifier quoting and unquoting.

/// Returns `val` quoted with double quotes (inner quotes doubled) if it
/// contains a non-word character, or unconditionally when `force` is set.
pub fn quote(val: &str, force: bool) -> String {
    if force || needs_quoting(val) {
        format!("\"{}\"", val.replace('"', "\"\""))
    } else {
        val.to_string()
    }
}

fn needs_quoting(val: &str) -> bool {
    val.is_empty() || val.chars().any(|c| !(c.is_alphanumeric() || c == '_'))
}

/// Strips one layer of quoting (double quotes, single quotes, or brackets)
/// and unescapes doubled quote characters. Values without recognised
/// quoting are returned unchanged.
pub fn unquote(val: &str) -> String {
    let chars: Vec<char> = val.chars().collect();
    if chars.len() < 2 {
        return val.to_string();
    }
    let first = chars[0];
    let last = *chars.last().unwrap();
    let (open, close) = (first, last);
    let is_wrapped = matches!((open, close), ('"', '"') | ('\'', '\'') | ('[', ']'));
    if !is_wrapped {
        return val.to_string();
    }
    let inner: String = chars[1..chars.len() - 1].iter().collect();
    if open == '[' {
        inner
    } else {
        inner.replace(&format!("{open}{open}"), &open.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_when_needed() {
        assert_eq!(quote("plain", false), "plain");
        assert_eq!(quote("has space", false), "\"has space\"");
        assert_eq!(quote("plain", true), "\"plain\"");
    }

    #[test]
    fn quote_escapes_inner_quotes() {
        assert_eq!(quote("a\"b", false), "\"a\"\"b\"");
    }

    #[test]
    fn unquote_roundtrips_all_forms() {
        assert_eq!(unquote("\"a b\""), "a b");
        assert_eq!(unquote("'a b'"), "a b");
        assert_eq!(unquote("[a b]"), "a b");
        assert_eq!(unquote("plain"), "plain");
    }

    #[test]
    fn unquote_unescapes_doubled_quotes() {
        assert_eq!(unquote("\"a\"\"b\""), "a\"b");
    }
}
