//! Cell values and the SQLite type-affinity rules used to coerce raw
//! user input into them.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

/// One of SQLite's five type affinities, derived from a column's declared
/// type the way SQLite itself does (substring rules on `INT`/`CHAR`,
/// `CLOB`, `TEXT`/`BLOB`/`REAL`, `FLOA`, `DOUB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Text,
    Blob,
    Real,
    Numeric,
}

impl Affinity {
    /// <https://www.sqlite.org/datatype3.html#determination_of_column_affinity>
    pub fn from_decl_type(decl: &str) -> Affinity {
        let up = decl.to_ascii_uppercase();
        if up.contains("INT") {
            Affinity::Integer
        } else if up.contains("CHAR") || up.contains("CLOB") || up.contains("TEXT") {
            Affinity::Text
        } else if up.contains("BLOB") || up.is_empty() {
            Affinity::Blob
        } else if up.contains("REAL") || up.contains("FLOA") || up.contains("DOUB") {
            Affinity::Real
        } else {
            Affinity::Numeric
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl CellValue {
    pub fn from_row_value(v: ValueRef<'_>) -> CellValue {
        match v {
            ValueRef::Null => CellValue::Null,
            ValueRef::Integer(i) => CellValue::Integer(i),
            ValueRef::Real(r) => CellValue::Real(r),
            ValueRef::Text(t) => CellValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => CellValue::Blob(b.to_vec()),
        }
    }

    /// Coerces `raw` text input into a cell value per `affinity`, the
    /// rules `set_value` applies: empty string becomes
    /// NULL for INTEGER/REAL/NUMERIC, `,` is accepted as a decimal
    /// separator, TEXT passes through untouched, and BLOB round-trips
    /// through the same unicode-escape encoding `Display` renders it as.
    pub fn coerce(raw: &str, affinity: Affinity) -> CellValue {
        match affinity {
            Affinity::Integer | Affinity::Real | Affinity::Numeric => {
                if raw.trim().is_empty() {
                    return CellValue::Null;
                }
                let normalized = raw.trim().replace(',', ".");
                if affinity != Affinity::Real {
                    if let Ok(i) = normalized.parse::<i64>() {
                        return CellValue::Integer(i);
                    }
                }
                if let Ok(f) = normalized.parse::<f64>() {
                    return CellValue::Real(f);
                }
                CellValue::Text(raw.to_string())
            }
            Affinity::Blob => CellValue::Blob(decode_blob_display(raw)),
            Affinity::Text => CellValue::Text(raw.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl ToSql for CellValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            CellValue::Null => ToSqlOutput::from(rusqlite::types::Null),
            CellValue::Integer(i) => ToSqlOutput::from(*i),
            CellValue::Real(r) => ToSqlOutput::from(*r),
            CellValue::Text(t) => ToSqlOutput::from(t.as_str()),
            CellValue::Blob(b) => ToSqlOutput::from(b.as_slice()),
        })
    }
}

impl FromSql for CellValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(CellValue::from_row_value(value))
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Null => write!(f, ""),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Real(r) => write!(f, "{r}"),
            CellValue::Text(t) => write!(f, "{t}"),
            CellValue::Blob(b) => write!(f, "{}", encode_blob_display(b)),
        }
    }
}

/// Never produced by `column_result`; present so `ValueRef` conversions
/// compile uniformly if a caller round-trips through `rusqlite::Error`.
#[allow(dead_code)]
fn _unused(e: FromSqlError) -> FromSqlError {
    e
}

/// Reverses the `unicode-escape`-style rendering `Display` uses for BLOB
/// cells: `\xHH` and `\uHHHH` escapes decode back to their byte/codepoint,
/// everything else passes through as UTF-8 bytes. Malformed escapes are
/// kept literally rather than rejected, since a BLOB editor round-trips
/// whatever the user typed.
fn decode_blob_display(raw: &str) -> Vec<u8> {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            match chars[i + 1] {
                'x' if i + 3 < chars.len() => {
                    let hex: String = chars[i + 2..i + 4].iter().collect();
                    if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                        out.push(byte);
                        i += 4;
                        continue;
                    }
                }
                'u' if i + 5 < chars.len() => {
                    let hex: String = chars[i + 2..i + 6].iter().collect();
                    if let Ok(code) = u32::from_str_radix(&hex, 16) {
                        if let Some(c) = char::from_u32(code) {
                            let mut buf = [0u8; 4];
                            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                            i += 6;
                            continue;
                        }
                    }
                }
                '\\' => {
                    out.push(b'\\');
                    i += 2;
                    continue;
                }
                _ => {}
            }
        }
        let mut buf = [0u8; 4];
        out.extend_from_slice(chars[i].encode_utf8(&mut buf).as_bytes());
        i += 1;
    }
    out
}

/// Renders a BLOB for display the way a text editor control round-trips
/// binary data: printable bytes pass through, everything else becomes a
/// `\xHH` escape so control characters and null bytes never reach the
/// widget raw.
fn encode_blob_display(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if b == b'\\' {
            out.push_str("\\\\");
        } else if (0x20..0x7f).contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("\\x{b:02x}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_display_roundtrips_through_coerce() {
        let bytes = vec![0u8, 1, 2, b'a', 0xff];
        let rendered = CellValue::Blob(bytes.clone()).to_string();
        let coerced = CellValue::coerce(&rendered, Affinity::Blob);
        assert_eq!(coerced, CellValue::Blob(bytes));
    }

    #[test]
    fn affinity_from_common_decl_types() {
        assert_eq!(Affinity::from_decl_type("INTEGER"), Affinity::Integer);
        assert_eq!(Affinity::from_decl_type("VARCHAR(30)"), Affinity::Text);
        assert_eq!(Affinity::from_decl_type("BLOB"), Affinity::Blob);
        assert_eq!(Affinity::from_decl_type(""), Affinity::Blob);
        assert_eq!(Affinity::from_decl_type("DOUBLE"), Affinity::Real);
        assert_eq!(Affinity::from_decl_type("DECIMAL(10,2)"), Affinity::Numeric);
    }

    #[test]
    fn coerces_empty_numeric_to_null() {
        assert_eq!(CellValue::coerce("", Affinity::Integer), CellValue::Null);
        assert_eq!(CellValue::coerce("  ", Affinity::Real), CellValue::Null);
        assert_eq!(CellValue::coerce("", Affinity::Text), CellValue::Text(String::new()));
    }

    #[test]
    fn coerces_comma_decimal_separator() {
        assert_eq!(CellValue::coerce("3,14", Affinity::Real), CellValue::Real(3.14));
        assert_eq!(CellValue::coerce("42", Affinity::Integer), CellValue::Integer(42));
    }
}
