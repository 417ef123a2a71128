//! Batched `DELETE` executor.
//!
//! Matches rows by primary key via a `VALUES` table constructor, same
//! shape as [`super::update::UpdateExecutor`] without a `SET` clause.

use mssql_types::SqlValue;

use crate::client::Client;
use crate::state::Ready;
use crate::value_serializer::serialize_literal;

use super::{DmlError, DmlExecutor, DmlOperation, DmlOutcome, effective_batch_size};

/// Accumulates primary key values and flushes them as join-based batch
/// `DELETE` statements.
pub struct DeleteExecutor {
    table: String,
    pk_columns: Vec<String>,
    batch_size: usize,
    rows: Vec<Vec<SqlValue>>,
}

impl DeleteExecutor {
    /// Create an executor deleting from `table`, matching rows by `pk_columns`.
    pub fn new(
        table: impl Into<String>,
        pk_columns: Vec<String>,
        configured_batch_size: usize,
    ) -> Result<Self, DmlError> {
        if pk_columns.is_empty() {
            return Err(DmlError::MissingPrimaryKey { operation: DmlOperation::Delete });
        }
        let batch_size = effective_batch_size(configured_batch_size, pk_columns.len());
        Ok(Self { table: table.into(), pk_columns, batch_size, rows: Vec::new() })
    }

    /// Buffer the primary key of one row to delete.
    pub fn accumulate(&mut self, pk_values: Vec<SqlValue>) {
        self.rows.push(pk_values);
    }

    /// Number of rows currently buffered, not yet sent to the server.
    #[must_use]
    pub fn pending_rows(&self) -> usize {
        self.rows.len()
    }

    fn build_sql(&self, batch: &[Vec<SqlValue>]) -> Result<String, DmlError> {
        let pk_columns_sql = self
            .pk_columns
            .iter()
            .map(|c| format!("[{c}]"))
            .collect::<Vec<_>>()
            .join(", ");

        let mut value_rows = Vec::with_capacity(batch.len());
        for pk in batch {
            let mut literals = Vec::with_capacity(pk.len());
            for value in pk {
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

        Ok(format!(
            "DELETE t FROM {} AS t INNER JOIN (VALUES {}) AS v({pk_columns_sql}) ON {join_predicate}",
            self.table,
            value_rows.join(", ")
        ))
    }
}

impl DmlExecutor for DeleteExecutor {
    async fn finalize(&mut self, client: &mut Client<Ready>) -> Result<DmlOutcome, DmlError> {
        if self.rows.is_empty() {
            return Ok(DmlOutcome { rows_affected: 0, batches_executed: 0 });
        }

        let rows = std::mem::take(&mut self.rows);
        let batches: Vec<&[Vec<SqlValue>]> = rows.chunks(self.batch_size).collect();
        let total = batches.len();
        let mut rows_affected = 0u64;

        for (i, batch) in batches.iter().enumerate() {
            let sql = self.build_sql(batch)?;
            let affected = client.execute(&sql, &[]).await.map_err(|e| DmlError::BatchFailed {
                operation: DmlOperation::Delete,
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
        let result = DeleteExecutor::new("dbo.Users", vec![], 100);
        assert!(matches!(result, Err(DmlError::MissingPrimaryKey { operation: DmlOperation::Delete })));
    }

    #[test]
    fn builds_join_based_delete() {
        let executor = DeleteExecutor::new("dbo.Users", vec!["id".into()], 100).unwrap();
        let sql = executor.build_sql(&[vec![SqlValue::Int(1)], vec![SqlValue::Int(2)]]).unwrap();
        assert_eq!(
            sql,
            "DELETE t FROM dbo.Users AS t INNER JOIN (VALUES (1), (2)) AS v([id]) ON t.[id] = v.[id]"
        );
    }
}
