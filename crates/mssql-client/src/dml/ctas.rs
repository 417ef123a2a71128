//! Emulated `CREATE TABLE ... AS SELECT` executor.
//!
//! T-SQL has no `CTAS` statement, so this splits into two phases: an
//! optional `DROP TABLE` when replacing an existing table, a `CREATE TABLE`
//! DDL statement, and then delegating row materialization to an
//! [`InsertExecutor`]. If the insert phase fails, the created table is
//! dropped on a best-effort basis so a partially-materialized table isn't
//! left behind — but that cleanup failure never masks the original error.

use mssql_types::SqlValue;

use crate::client::Client;
use crate::state::Ready;

use super::{DmlError, DmlExecutor, DmlOperation, DmlOutcome, InsertExecutor};

/// A column definition for the table a [`CtasExecutor`] creates.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// T-SQL type, e.g. `"INT"`, `"NVARCHAR(100)"`.
    pub sql_type: String,
}

impl ColumnDef {
    /// Construct a column definition.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self { name: name.into(), sql_type: sql_type.into() }
    }
}

/// Creates `table` and materializes accumulated rows into it.
pub struct CtasExecutor {
    table: String,
    columns: Vec<ColumnDef>,
    or_replace: bool,
    insert: InsertExecutor,
}

impl CtasExecutor {
    /// Create an executor that creates `table` with `columns` and
    /// materializes rows batched at `configured_batch_size`.
    ///
    /// When `or_replace` is set, an existing table of the same name is
    /// dropped first; otherwise `CREATE TABLE` fails if the table exists.
    pub fn new(
        table: impl Into<String>,
        columns: Vec<ColumnDef>,
        or_replace: bool,
        configured_batch_size: usize,
    ) -> Result<Self, DmlError> {
        if columns.is_empty() {
            return Err(DmlError::NoColumns { operation: DmlOperation::Ctas });
        }
        let table = table.into();
        let column_names = columns.iter().map(|c| c.name.clone()).collect();
        let insert = InsertExecutor::new(table.clone(), column_names, configured_batch_size)?;
        Ok(Self { table, columns, or_replace, insert })
    }

    /// Buffer one row to insert into the newly created table.
    pub fn accumulate(&mut self, row: Vec<SqlValue>) {
        self.insert.accumulate(row);
    }

    fn build_create_sql(&self) -> String {
        let columns_sql = self
            .columns
            .iter()
            .map(|c| format!("[{}] {}", c.name, c.sql_type))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {} ({columns_sql})", self.table)
    }

    fn build_drop_sql(&self) -> String {
        format!("IF OBJECT_ID(N'{0}', N'U') IS NOT NULL DROP TABLE {0}", self.table)
    }

    async fn run_ddl(&self, client: &mut Client<Ready>, sql: &str) -> Result<(), DmlError> {
        client
            .execute(sql, &[])
            .await
            .map(|_| ())
            .map_err(|e| DmlError::BatchFailed {
                operation: DmlOperation::Ctas,
                batch: 0,
                total: 1,
                message: e.to_string(),
            })
    }
}

impl DmlExecutor for CtasExecutor {
    async fn finalize(&mut self, client: &mut Client<Ready>) -> Result<DmlOutcome, DmlError> {
        if self.or_replace {
            let drop_sql = self.build_drop_sql();
            self.run_ddl(client, &drop_sql).await?;
        }

        let create_sql = self.build_create_sql();
        self.run_ddl(client, &create_sql).await?;

        match self.insert.finalize(client).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let drop_sql = format!("DROP TABLE {}", self.table);
                let _ = client.execute(&drop_sql, &[]).await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn requires_at_least_one_column() {
        let result = CtasExecutor::new("dbo.Snapshot", vec![], false, 100);
        assert!(matches!(result, Err(DmlError::NoColumns { operation: DmlOperation::Ctas })));
    }

    #[test]
    fn create_sql_lists_columns_with_types() {
        let executor = CtasExecutor::new(
            "dbo.Snapshot",
            vec![ColumnDef::new("id", "INT"), ColumnDef::new("name", "NVARCHAR(100)")],
            false,
            100,
        )
        .unwrap();
        assert_eq!(
            executor.build_create_sql(),
            "CREATE TABLE dbo.Snapshot ([id] INT, [name] NVARCHAR(100))"
        );
    }

    #[test]
    fn or_replace_drop_checks_object_id_first() {
        let executor =
            CtasExecutor::new("dbo.Snapshot", vec![ColumnDef::new("id", "INT")], true, 100).unwrap();
        assert_eq!(
            executor.build_drop_sql(),
            "IF OBJECT_ID(N'dbo.Snapshot', N'U') IS NOT NULL DROP TABLE dbo.Snapshot"
        );
    }
}
