//! Batched DML executors (INSERT/UPDATE/DELETE/CTAS).
//!
//! Each executor accumulates rows in memory, then flushes them as one or
//! more multi-row statements at `finalize()`. All of them execute through
//! [`crate::client::Client::execute`] — the token-parsing loop that method
//! runs on top of already handles the server round-trip, so these executors
//! only need to build the SQL text and chunk the rows.

pub mod ctas;
pub mod delete;
pub mod insert;
pub mod update;

pub use ctas::CtasExecutor;
pub use delete::DeleteExecutor;
pub use insert::InsertExecutor;
pub use update::UpdateExecutor;

use std::fmt;

use crate::client::Client;
use crate::state::Ready;

/// The maximum number of parameter slots a single SQL Server batch
/// statement can address. Even though these executors embed values as
/// literals rather than bound parameters, this is used as the same
/// conservative row-per-statement ceiling SQL Server's own OLE DB/ODBC
/// drivers use for multi-row `VALUES` lists.
pub const MAX_PARAMETERS: usize = 2100;

/// Which DML operation an error or outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmlOperation {
    /// `INSERT`
    Insert,
    /// `UPDATE`
    Update,
    /// `DELETE`
    Delete,
    /// `CREATE TABLE ... AS SELECT` (emulated via `CREATE TABLE` + `INSERT`).
    Ctas,
}

impl fmt::Display for DmlOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Ctas => "CTAS",
        };
        f.write_str(name)
    }
}

/// Errors from a DML executor.
#[derive(Debug, thiserror::Error)]
pub enum DmlError {
    /// One batch in a multi-batch operation failed; earlier batches, if
    /// any, already committed.
    #[error("MSSQL {operation} failed: batch {batch} of {total}: {message}")]
    BatchFailed {
        /// The operation being performed.
        operation: DmlOperation,
        /// 1-based index of the batch that failed.
        batch: usize,
        /// Total number of batches the operation was split into.
        total: usize,
        /// The underlying error's message.
        message: String,
    },

    /// No columns were given to an operation that requires at least one.
    #[error("{operation} requires at least one column")]
    NoColumns {
        /// The operation being performed.
        operation: DmlOperation,
    },

    /// The operation needs a primary key but the table has none configured.
    #[error("{operation} requires a primary key but the table has none configured")]
    MissingPrimaryKey {
        /// The operation being performed.
        operation: DmlOperation,
    },

    /// A value couldn't be rendered as a SQL literal.
    #[error(transparent)]
    Serialize(#[from] crate::value_serializer::SerializeError),
}

/// The result of a completed DML operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmlOutcome {
    /// Total rows affected across all batches.
    pub rows_affected: u64,
    /// Number of batches executed.
    pub batches_executed: usize,
}

/// Flushes accumulated rows to the server and reports what happened.
#[allow(async_fn_in_trait)]
pub trait DmlExecutor {
    /// Execute all accumulated batches, returning the combined outcome.
    async fn finalize(&mut self, client: &mut Client<Ready>) -> Result<DmlOutcome, DmlError>;
}

/// Compute how many rows fit in one batch given the server's parameter
/// ceiling and how many value slots each row occupies.
///
/// Never returns less than 1: a row that alone exceeds the parameter
/// ceiling still gets its own batch rather than being silently dropped.
#[must_use]
pub fn effective_batch_size(configured_batch_size: usize, slots_per_row: usize) -> usize {
    let configured = configured_batch_size.max(1);
    if slots_per_row == 0 {
        return configured;
    }
    let max_rows_by_parameter_limit = (MAX_PARAMETERS / slots_per_row).max(1);
    configured.min(max_rows_by_parameter_limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_is_capped_by_parameter_limit() {
        assert_eq!(effective_batch_size(10_000, 10), 210);
    }

    #[test]
    fn batch_size_never_goes_below_one() {
        assert_eq!(effective_batch_size(5, 5000), 1);
    }

    #[test]
    fn batch_size_uses_configured_value_when_it_fits() {
        assert_eq!(effective_batch_size(50, 3), 50);
    }
}
