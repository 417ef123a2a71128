//! Renders [`SqlValue`] as literal T-SQL text.
//!
//! The DML executors and the filter encoder both need to embed values
//! directly into generated SQL text (multi-row `VALUES` lists, pushed-down
//! predicates) rather than bind them as parameters, so this module owns the
//! one place that turns a value into something safe to splice into a
//! statement.

use mssql_types::SqlValue;

/// A value that can't be represented as a SQL literal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SerializeError {
    /// Floating point values that have no SQL literal representation.
    #[error("{0} has no SQL literal representation")]
    NonFinite(&'static str),
}

/// Render `value` as literal T-SQL text, e.g. `N'hello'`, `0x0102`, `42`.
///
/// Returns [`SerializeError::NonFinite`] for NaN/Infinity floats, which have
/// no literal form in T-SQL.
pub fn serialize_literal(value: &SqlValue) -> Result<String, SerializeError> {
    match value {
        SqlValue::Null => Ok("NULL".to_string()),
        SqlValue::Bool(b) => Ok(if *b { "1".to_string() } else { "0".to_string() }),
        SqlValue::TinyInt(v) => Ok(v.to_string()),
        SqlValue::SmallInt(v) => Ok(v.to_string()),
        SqlValue::Int(v) => Ok(v.to_string()),
        SqlValue::BigInt(v) => Ok(v.to_string()),
        SqlValue::Float(v) => serialize_float(*v as f64, "REAL"),
        SqlValue::Double(v) => serialize_float(*v, "FLOAT"),
        SqlValue::String(s) => Ok(quote_nstring(s)),
        SqlValue::Xml(s) => Ok(quote_nstring(s)),
        SqlValue::Binary(bytes) => Ok(quote_binary(bytes)),
        #[cfg(feature = "decimal")]
        SqlValue::Decimal(d) => Ok(d.to_string()),
        #[cfg(feature = "uuid")]
        SqlValue::Uuid(u) => Ok(format!("'{u}'")),
        #[cfg(feature = "chrono")]
        SqlValue::Date(d) => Ok(format!("CAST('{}' AS DATE)", d.format("%Y-%m-%d"))),
        #[cfg(feature = "chrono")]
        SqlValue::Time(t) => Ok(format!("CAST('{}' AS TIME(7))", t.format("%H:%M:%S%.7f"))),
        #[cfg(feature = "chrono")]
        SqlValue::DateTime(dt) => Ok(format!(
            "CAST('{}' AS DATETIME2(7))",
            dt.format("%Y-%m-%dT%H:%M:%S%.7f")
        )),
        #[cfg(feature = "chrono")]
        SqlValue::DateTimeOffset(dt) => Ok(format!(
            "CAST('{}' AS DATETIMEOFFSET(7))",
            dt.format("%Y-%m-%dT%H:%M:%S%.7f%:z")
        )),
        #[cfg(feature = "json")]
        SqlValue::Json(v) => Ok(quote_nstring(&v.to_string())),
    }
}

fn serialize_float(v: f64, type_name: &'static str) -> Result<String, SerializeError> {
    if v.is_nan() || v.is_infinite() {
        return Err(SerializeError::NonFinite(type_name));
    }
    Ok(v.to_string())
}

fn quote_nstring(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 3);
    out.push_str("N'");
    for ch in s.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

fn quote_binary(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + 2);
    out.push_str("0x");
    for byte in bytes {
        out.push_str(&format!("{byte:02X}"));
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn null_is_literal_null() {
        assert_eq!(serialize_literal(&SqlValue::Null).unwrap(), "NULL");
    }

    #[test]
    fn strings_quote_and_escape() {
        let s = SqlValue::String("O'Brien".to_string());
        assert_eq!(serialize_literal(&s).unwrap(), "N'O''Brien'");
    }

    #[test]
    fn binary_renders_hex() {
        let b = SqlValue::Binary(bytes::Bytes::from_static(&[0x0a, 0xff]));
        assert_eq!(serialize_literal(&b).unwrap(), "0x0AFF");
    }

    #[test]
    fn nan_float_is_rejected() {
        let v = SqlValue::Double(f64::NAN);
        assert!(matches!(serialize_literal(&v), Err(SerializeError::NonFinite(_))));
    }

    #[test]
    fn integers_render_plainly() {
        assert_eq!(serialize_literal(&SqlValue::Int(-7)).unwrap(), "-7");
        assert_eq!(serialize_literal(&SqlValue::BigInt(9_000_000_000)).unwrap(), "9000000000");
    }

    #[test]
    fn bool_renders_as_bit_literal() {
        assert_eq!(serialize_literal(&SqlValue::Bool(true)).unwrap(), "1");
        assert_eq!(serialize_literal(&SqlValue::Bool(false)).unwrap(), "0");
    }
}
