//! Batched `UPDATE` executor.
//!
//! SQL Server has no multi-row positional `UPDATE ... VALUES` shorthand, so
//! each batch is expressed as an `UPDATE ... FROM` joined against a
//! `VALUES` table constructor keyed by the primary key columns.

use mssql_types::SqlValue;

use crate::client::Client;
use crate::state::Ready;
use crate::value_serializer::serialize_literal;

use super::{DmlError, DmlExecutor, DmlOperation, DmlOutcome, effective_batch_size};

/// Accumulates `(primary key, new values)` pairs and flushes them as
/// join-based batch `UPDATE` statements.
pub struct UpdateExecutor {
    table: String,
    pk_columns: Vec<String>,
    set_columns: Vec<String>,
    batch_size: usize,
    rows: Vec<(Vec<SqlValue>, Vec<SqlValue>)>,
}

impl UpdateExecutor {
    /// Create an executor updating `set_columns` on `table`, matching rows
    /// by `pk_columns`.
    pub fn new(
        table: impl Into<String>,
        pk_columns: Vec<String>,
        set_columns: Vec<String>,
        configured_batch_size: usize,
    ) -> Result<Self, DmlError> {
        if pk_columns.is_empty() {
            return Err(DmlError::MissingPrimaryKey { operation: DmlOperation::Update });
        }
        if set_columns.is_empty() {
            return Err(DmlError::NoColumns { operation: DmlOperation::Update });
        }
        let slots_per_row = pk_columns.len() + set_columns.len();
        let batch_size = effective_batch_size(configured_batch_size, slots_per_row);
        Ok(Self { table: table.into(), pk_columns, set_columns, batch_size, rows: Vec::new() })
    }

    /// Buffer one row: the primary key values identifying the row, and the
    /// new values for `set_columns`, in matching order.
    pub fn accumulate(&mut self, pk_values: Vec<SqlValue>, set_values: Vec<SqlValue>) {
        self.rows.push((pk_values, set_values));
    }

    /// Number of rows currently buffered, not yet sent to the server.
    #[must_use]
    pub fn pending_rows(&self) -> usize {
        self.rows.len()
    }

    fn build_sql(&self, batch: &[(Vec<SqlValue>, Vec<SqlValue>)]) -> Result<String, DmlError> {
        let value_columns: Vec<&str> = self
            .pk_columns
            .iter()
            .chain(self.set_columns.iter())
            .map(String::as_str)
            .collect();
        let value_columns_sql = value_columns
            .iter()
            .map(|c| format!("[{c}]"))
            .collect::<Vec<_>>()
            .join(", ");

        let mut value_rows = Vec::with_capacity(batch.len());
        for (pk, set) in batch {
            let mut literals = Vec::with_capacity(pk.len() + set.len());
            for value in pk.iter().chain(set.iter()) {
                literals.push(serialize_literal(value)?);
            }
            value_rows.push(format!("({})", literals.join(", ")));
        }

        let join_predicate = self
            .pk_columns
            .iter()
            .map(|c| format!("t.[{c}] = v.[{c}]"))
            .collect::<Vec<_>>()
            .join(" AND ");
        let set_clause = self
            .set_columns
            .iter()
            .map(|c| format!("t.[{c}] = v.[{c}]"))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!(
            "UPDATE t SET {set_clause} FROM {} AS t INNER JOIN (VALUES {}) AS v({value_columns_sql}) ON {join_predicate}",
            self.table,
            value_rows.join(", ")
        ))
    }
}

impl DmlExecutor for UpdateExecutor {
    async fn finalize(&mut self, client: &mut Client<Ready>) -> Result<DmlOutcome, DmlError> {
        if self.rows.is_empty() {
            return Ok(DmlOutcome { rows_affected: 0, batches_executed: 0 });
        }

        let rows = std::mem::take(&mut self.rows);
        let batches: Vec<&[(Vec<SqlValue>, Vec<SqlValue>)]> = rows.chunks(self.batch_size).collect();
        let total = batches.len();
        let mut rows_affected = 0u64;

        for (i, batch) in batches.iter().enumerate() {
            let sql = self.build_sql(batch)?;
            let affected = client.execute(&sql, &[]).await.map_err(|e| DmlError::BatchFailed {
                operation: DmlOperation::Update,
                batch: i + 1,
                total,
                message: e.to_string(),
            })?;
            rows_affected += affected;
        }

        Ok(DmlOutcome { rows_affected, batches_executed: total })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn requires_a_primary_key() {
        let result = UpdateExecutor::new("dbo.Users", vec![], vec!["name".into()], 100);
        assert!(matches!(result, Err(DmlError::MissingPrimaryKey { operation: DmlOperation::Update })));
    }

    #[test]
    fn builds_join_based_update() {
        let executor =
            UpdateExecutor::new("dbo.Users", vec!["id".into()], vec!["name".into()], 100).unwrap();
        let sql = executor
            .build_sql(&[(vec![SqlValue::Int(1)], vec![SqlValue::String("Ada".into())])])
            .unwrap();
        assert_eq!(
            sql,
            "UPDATE t SET t.[name] = v.[name] FROM dbo.Users AS t INNER JOIN (VALUES (1, N'Ada')) AS v([id], [name]) ON t.[id] = v.[id]"
        );
    }
}
