//! Batched `INSERT` executor.

use mssql_types::SqlValue;

use crate::client::Client;
use crate::state::Ready;
use crate::value_serializer::serialize_literal;

use super::{DmlError, DmlExecutor, DmlOperation, DmlOutcome, effective_batch_size};

/// Accumulates rows and flushes them as multi-row `INSERT` statements.
pub struct InsertExecutor {
    table: String,
    columns: Vec<String>,
    batch_size: usize,
    rows: Vec<Vec<SqlValue>>,
}

impl InsertExecutor {
    /// Create an executor inserting into `table`'s `columns`.
    ///
    /// `configured_batch_size` is capped to however many rows fit within
    /// the server's parameter ceiling given the column count.
    pub fn new(
        table: impl Into<String>,
        columns: Vec<String>,
        configured_batch_size: usize,
    ) -> Result<Self, DmlError> {
        if columns.is_empty() {
            return Err(DmlError::NoColumns { operation: DmlOperation::Insert });
        }
        let batch_size = effective_batch_size(configured_batch_size, columns.len());
        Ok(Self { table: table.into(), columns, batch_size, rows: Vec::new() })
    }

    /// Buffer one row for a future flush. Values must align with the
    /// column list passed to [`InsertExecutor::new`].
    pub fn accumulate(&mut self, row: Vec<SqlValue>) {
        self.rows.push(row);
    }

    /// Number of rows currently buffered, not yet sent to the server.
    #[must_use]
    pub fn pending_rows(&self) -> usize {
        self.rows.len()
    }

    fn build_sql(&self, batch: &[Vec<SqlValue>]) -> Result<String, DmlError> {
        let columns_sql = self
            .columns
            .iter()
            .map(|c| format!("[{c}]"))
            .collect::<Vec<_>>()
            .join(", ");

        let mut value_rows = Vec::with_capacity(batch.len());
        for row in batch {
            let mut literals = Vec::with_capacity(row.len());
            for value in row {
                literals.push(serialize_literal(value)?);
            }
            value_rows.push(format!("({})", literals.join(", ")));
        }

        Ok(format!(
            "INSERT INTO {} ({columns_sql}) VALUES {}",
            self.table,
            value_rows.join(", ")
        ))
    }
}

impl DmlExecutor for InsertExecutor {
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
                operation: DmlOperation::Insert,
                batch: i + 1,
                total,
                message: e.to_string(),
            })?;
            rows_affected += affected;
        }

        Ok(DmlOutcome { rows_affected, batches_executed: total })
    }
}
