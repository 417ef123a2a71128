//! Extracts a row's identity from its primary key columns.
//!
//! A scalar primary key's rowid is the key value itself; a composite
//! primary key's rowid carries each key column's value in declared key
//! order, to be unpacked again by the filter encoder when pushing down
//! rowid-equality predicates.

use mssql_types::SqlValue;

use crate::bridge::PkInfo;
use crate::row::Row;

/// The error returned when a rowid cannot be extracted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowIdError {
    /// The table has no primary key to extract a rowid from.
    #[error("table has no primary key")]
    NoPrimaryKey,
    /// A primary key column named in `PkInfo` wasn't found in the row.
    #[error("primary key column {0:?} not found in row")]
    MissingColumn(String),
}

/// A row's identity: a single scalar value for a scalar primary key, or an
/// ordered list of values for a composite one.
#[derive(Debug, Clone, PartialEq)]
pub enum RowId {
    /// Identity for a single-column primary key.
    Scalar(SqlValue),
    /// Identity for a multi-column primary key, in key-column order.
    Composite(Vec<SqlValue>),
}

impl RowId {
    /// The identity as a single value, if it's scalar.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&SqlValue> {
        match self {
            Self::Scalar(v) => Some(v),
            Self::Composite(_) => None,
        }
    }

    /// The identity's component values, in key-column order, regardless of
    /// whether it's scalar or composite.
    #[must_use]
    pub fn values(&self) -> Vec<&SqlValue> {
        match self {
            Self::Scalar(v) => vec![v],
            Self::Composite(values) => values.iter().collect(),
        }
    }
}

/// Extract the rowid of `row` given `pk` and the column names of the
/// result set `row` came from (in the same order `row`'s values are in).
///
/// Mirrors the source system's "extract first, then dispatch on arity"
/// shape: every primary key column's value is read out before deciding
/// whether the result is scalar or composite.
pub fn extract_rowid(row: &Row, columns: &[String], pk: &PkInfo) -> Result<RowId, RowIdError> {
    if pk.is_empty() {
        return Err(RowIdError::NoPrimaryKey);
    }

    let mut values = Vec::with_capacity(pk.columns.len());
    for pk_column in &pk.columns {
        let index = columns
            .iter()
            .position(|name| name == pk_column)
            .ok_or_else(|| RowIdError::MissingColumn(pk_column.clone()))?;
        let value = row.get_raw(index).unwrap_or(SqlValue::Null);
        values.push(value);
    }

    if pk.is_composite() {
        Ok(RowId::Composite(values))
    } else {
        Ok(RowId::Scalar(values.into_iter().next().unwrap_or(SqlValue::Null)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn no_primary_key_errors() {
        let pk = PkInfo::new(vec![]);
        let columns = vec!["id".to_string()];
        let row = Row::from_values(vec![], vec![]);
        assert_eq!(extract_rowid(&row, &columns, &pk), Err(RowIdError::NoPrimaryKey));
    }

    #[test]
    fn missing_column_errors() {
        let pk = PkInfo::new(vec!["id".to_string()]);
        let columns = vec!["name".to_string()];
        let row = Row::from_values(vec![], vec![]);
        assert!(matches!(
            extract_rowid(&row, &columns, &pk),
            Err(RowIdError::MissingColumn(ref c)) if c == "id"
        ));
    }

    #[test]
    fn rowid_values_flatten_for_both_shapes() {
        let scalar = RowId::Scalar(SqlValue::Int(1));
        assert_eq!(scalar.values(), vec![&SqlValue::Int(1)]);

        let composite = RowId::Composite(vec![SqlValue::Int(1), SqlValue::Int(2)]);
        assert_eq!(composite.values(), vec![&SqlValue::Int(1), &SqlValue::Int(2)]);
    }
}
