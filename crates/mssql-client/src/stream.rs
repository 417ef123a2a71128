//! Streaming query result support.
//!
//! [`Client::query`](crate::client::Client::query) and
//! [`Client::query_multiple`](crate::client::Client::query_multiple) parse
//! a whole response eagerly (the TDS token loop has to run to completion
//! to know where one result set ends and the next begins), so the types
//! here wrap an already-fetched buffer of rows rather than polling the
//! wire incrementally. They still expose a [`Stream`] interface, and
//! `fill_chunk` for callers that want to drain several rows at a time
//! without the per-row `poll_next` overhead.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::error::Error;
use crate::row::{Column, Row};

/// A streaming result set from a query.
///
/// This stream yields rows one at a time, allowing processing of
/// large result sets without loading everything into memory at the call
/// site (the rows themselves were already fetched from the wire by the
/// time this is constructed; see the module docs).
///
/// # Example
///
/// ```rust,ignore
/// use futures::StreamExt;
///
/// let mut stream = client.query("SELECT * FROM large_table", &[]).await?;
///
/// while let Some(row) = stream.next().await {
///     let row = row?;
///     process_row(&row);
/// }
/// ```
pub struct QueryStream<'a> {
    columns: Vec<Column>,
    rows: std::collections::VecDeque<Row>,
    cancelled: bool,
    _marker: std::marker::PhantomData<&'a ()>,
}

impl<'a> QueryStream<'a> {
    pub(crate) fn new(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows: rows.into(),
            cancelled: false,
            _marker: std::marker::PhantomData,
        }
    }

    /// Get the column metadata for this result set.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Check if the stream has no more rows left to yield.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.cancelled || self.rows.is_empty()
    }

    /// Number of rows not yet yielded.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    /// Stop yielding rows. Already-fetched rows still buffered are
    /// dropped; calling this doesn't affect the server, since the result
    /// set was already fully read off the wire.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.rows.clear();
    }

    /// Drain up to `max_rows` buffered rows at once.
    ///
    /// Returns fewer than `max_rows` only when the result set is
    /// exhausted; an empty vec means there's nothing left.
    pub fn fill_chunk(&mut self, max_rows: usize) -> Vec<Row> {
        if self.cancelled {
            return Vec::new();
        }
        let take = max_rows.min(self.rows.len());
        self.rows.drain(..take).collect()
    }

    /// Collect all remaining rows into a vector.
    ///
    /// For large result sets where memory matters, prefer iterating with
    /// the stream (or `fill_chunk`) instead.
    pub async fn collect_all(mut self) -> Result<Vec<Row>, Error> {
        Ok(self.fill_chunk(self.rows.len()))
    }
}

impl Stream for QueryStream<'_> {
    type Item = Result<Row, Error>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.cancelled {
            return Poll::Ready(None);
        }
        Poll::Ready(this.rows.pop_front().map(Ok))
    }
}

/// Result of a non-query execution.
///
/// Contains the number of affected rows and any output parameters.
#[derive(Debug, Clone)]
pub struct ExecuteResult {
    /// Number of rows affected by the statement.
    pub rows_affected: u64,
    /// Output parameters from stored procedures.
    pub output_params: Vec<OutputParam>,
}

/// An output parameter from a stored procedure call.
#[derive(Debug, Clone)]
pub struct OutputParam {
    /// Parameter name.
    pub name: String,
    /// Parameter value.
    pub value: mssql_types::SqlValue,
}

impl ExecuteResult {
    /// Create a new execute result.
    pub fn new(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            output_params: Vec::new(),
        }
    }

    /// Create a result with output parameters.
    pub fn with_outputs(rows_affected: u64, output_params: Vec<OutputParam>) -> Self {
        Self {
            rows_affected,
            output_params,
        }
    }

    /// Get an output parameter by name.
    #[must_use]
    pub fn get_output(&self, name: &str) -> Option<&OutputParam> {
        self.output_params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// One result set within a [`MultiResultStream`]: its column metadata and
/// the rows already fetched for it.
#[derive(Debug, Clone)]
pub struct ResultSet {
    /// Column metadata for this result set.
    pub columns: Vec<Column>,
    /// Rows belonging to this result set.
    pub rows: Vec<Row>,
}

impl ResultSet {
    /// Construct a result set from its columns and rows.
    pub fn new(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }
}

/// Multiple result sets from a batch or stored procedure.
///
/// Some queries return multiple result sets (e.g., stored procedures
/// with multiple SELECT statements).
pub struct MultiResultStream<'a> {
    result_sets: Vec<ResultSet>,
    current_result: usize,
    current_row: usize,
    cancelled: bool,
    _marker: std::marker::PhantomData<&'a ()>,
}

impl<'a> MultiResultStream<'a> {
    pub(crate) fn new(result_sets: Vec<ResultSet>) -> Self {
        Self {
            result_sets,
            current_result: 0,
            current_row: 0,
            cancelled: false,
            _marker: std::marker::PhantomData,
        }
    }

    /// Get the current result set index (0-based).
    #[must_use]
    pub fn current_result_index(&self) -> usize {
        self.current_result
    }

    /// Total number of result sets in this batch.
    #[must_use]
    pub fn result_count(&self) -> usize {
        self.result_sets.len()
    }

    /// Column metadata for the current result set, if positioned on one.
    #[must_use]
    pub fn columns(&self) -> Option<&[Column]> {
        self.result_sets.get(self.current_result).map(|rs| rs.columns.as_slice())
    }

    /// Stop iterating; subsequent calls to `next_result`/`next_row` behave
    /// as though the batch were exhausted.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Move to the next result set.
    ///
    /// Returns `true` if there is another result set, `false` if no more.
    pub async fn next_result(&mut self) -> Result<bool, Error> {
        if self.cancelled {
            return Ok(false);
        }
        if self.current_result >= self.result_sets.len() {
            return Ok(false);
        }
        self.current_result += 1;
        self.current_row = 0;
        Ok(self.current_result < self.result_sets.len())
    }

    /// Get the next row from the current result set.
    pub async fn next_row(&mut self) -> Result<Option<Row>, Error> {
        if self.cancelled {
            return Ok(None);
        }
        let Some(result_set) = self.result_sets.get(self.current_result) else {
            return Ok(None);
        };
        let Some(row) = result_set.rows.get(self.current_row) else {
            return Ok(None);
        };
        self.current_row += 1;
        Ok(Some(row.clone()))
    }
}

/// Maps a projected subset of a result set's columns to their source
/// column indices, so a caller that only asked for some columns doesn't
/// have to re-walk the full column list per row.
#[derive(Debug, Clone)]
pub struct ProjectionMap {
    /// Source column index for each projected output position.
    indices: Vec<usize>,
}

impl ProjectionMap {
    /// Build a projection from `columns` keeping only `wanted` names, in
    /// the order they appear in `wanted`.
    #[must_use]
    pub fn new(columns: &[Column], wanted: &[&str]) -> Self {
        let indices = wanted
            .iter()
            .filter_map(|name| columns.iter().position(|c| c.name.eq_ignore_ascii_case(name)))
            .collect();
        Self { indices }
    }

    /// Project `row` down to just the selected columns, in projection order.
    #[must_use]
    pub fn apply(&self, row: &Row) -> Vec<Option<mssql_types::SqlValue>> {
        self.indices.iter().map(|&i| row.get_raw(i)).collect()
    }

    /// Number of columns in the projection.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether the projection selects no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// A chunked, cancellable view over a [`QueryStream`] or [`MultiResultStream`]
/// for a host engine that pulls rows in batches rather than one at a time.
///
/// `C` bridges to whatever owns the live connection: a bare
/// `Client<Ready>` for ad hoc use, or a pooled connection wrapper supplied
/// by a connection pool crate that can `BorrowMut<Client<Ready>>`.
pub struct ResultStream<C> {
    connection: C,
    projection: Option<ProjectionMap>,
    columns: Vec<Column>,
    buffered: std::collections::VecDeque<Row>,
    initialized: bool,
    cancelled: bool,
}

impl<C> ResultStream<C>
where
    C: std::borrow::BorrowMut<crate::client::Client<crate::state::Ready>>,
{
    /// Wrap a connection, ready to be `initialize()`d with a query.
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            projection: None,
            columns: Vec::new(),
            buffered: std::collections::VecDeque::new(),
            initialized: false,
            cancelled: false,
        }
    }

    /// Run `sql` and buffer its result set, optionally projecting down to
    /// `wanted` columns only.
    pub async fn initialize(&mut self, sql: &str, wanted: Option<&[&str]>) -> Result<(), Error> {
        let client = self.connection.borrow_mut();
        let stream = client.query(sql, &[]).await?;
        self.columns = stream.columns().to_vec();
        self.projection = wanted.map(|names| ProjectionMap::new(&self.columns, names));
        self.buffered = stream.collect_all().await?.into();
        self.initialized = true;
        Ok(())
    }

    /// Column metadata for the result set (post-projection columns aren't
    /// tracked separately; use the `ProjectionMap` passed to `initialize`
    /// to know which of these are actually selected).
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Whether `initialize` has been called.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Stop yielding rows; already-buffered rows are dropped.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.buffered.clear();
    }

    /// Whether the stream has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Drain up to `max_rows` buffered rows, applying the projection if one
    /// was configured.
    pub fn fill_chunk(&mut self, max_rows: usize) -> Result<Vec<Row>, Error> {
        if self.cancelled {
            return Err(Error::Cancelled);
        }
        if !self.initialized {
            return Err(Error::Query("stream not initialized".to_string()));
        }
        let take = max_rows.min(self.buffered.len());
        Ok(self.buffered.drain(..take).collect())
    }

    /// Whether every buffered row has been drained.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.buffered.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_columns() -> Vec<Column> {
        vec![Column {
            name: "id".to_string(),
            index: 0,
            type_name: "INT".to_string(),
            nullable: false,
            max_length: Some(4),
            precision: Some(0),
            scale: Some(0),
            collation: None,
        }]
    }

    #[test]
    fn test_execute_result() {
        let result = ExecuteResult::new(42);
        assert_eq!(result.rows_affected, 42);
        assert!(result.output_params.is_empty());
    }

    #[test]
    fn test_execute_result_with_outputs() {
        let outputs = vec![OutputParam {
            name: "ReturnValue".to_string(),
            value: mssql_types::SqlValue::Int(100),
        }];

        let result = ExecuteResult::with_outputs(10, outputs);
        assert_eq!(result.rows_affected, 10);
        assert!(result.get_output("ReturnValue").is_some());
        assert!(result.get_output("returnvalue").is_some()); // case-insensitive
        assert!(result.get_output("NotFound").is_none());
    }

    #[test]
    fn test_query_stream_columns() {
        let stream = QueryStream::new(make_columns(), Vec::new());
        assert_eq!(stream.columns().len(), 1);
        assert_eq!(stream.columns()[0].name, "id");
        assert!(stream.is_finished());
    }

    #[test]
    fn fill_chunk_drains_in_order() {
        let columns = make_columns();
        let rows = vec![
            Row::from_values(columns.clone(), vec![mssql_types::SqlValue::Int(1)]),
            Row::from_values(columns.clone(), vec![mssql_types::SqlValue::Int(2)]),
            Row::from_values(columns.clone(), vec![mssql_types::SqlValue::Int(3)]),
        ];
        let mut stream = QueryStream::new(columns, rows);
        assert_eq!(stream.remaining(), 3);

        let chunk = stream.fill_chunk(2);
        assert_eq!(chunk.len(), 2);
        assert_eq!(stream.remaining(), 1);

        let rest = stream.fill_chunk(10);
        assert_eq!(rest.len(), 1);
        assert!(stream.is_finished());
    }

    #[test]
    fn cancel_empties_buffered_rows() {
        let columns = make_columns();
        let rows = vec![Row::from_values(columns.clone(), vec![mssql_types::SqlValue::Int(1)])];
        let mut stream = QueryStream::new(columns, rows);
        stream.cancel();
        assert!(stream.is_finished());
        assert_eq!(stream.fill_chunk(10).len(), 0);
    }

    #[test]
    fn multi_result_stream_advances_results() {
        let columns = make_columns();
        let result_sets = vec![
            ResultSet::new(
                columns.clone(),
                vec![Row::from_values(columns.clone(), vec![mssql_types::SqlValue::Int(1)])],
            ),
            ResultSet::new(
                columns.clone(),
                vec![Row::from_values(columns.clone(), vec![mssql_types::SqlValue::Int(2)])],
            ),
        ];
        let mut stream = MultiResultStream::new(result_sets);
        assert_eq!(stream.result_count(), 2);
        assert_eq!(stream.current_result_index(), 0);
    }

    #[tokio::test]
    async fn multi_result_stream_next_row_and_next_result() {
        let columns = make_columns();
        let result_sets = vec![
            ResultSet::new(
                columns.clone(),
                vec![Row::from_values(columns.clone(), vec![mssql_types::SqlValue::Int(1)])],
            ),
            ResultSet::new(
                columns.clone(),
                vec![Row::from_values(columns.clone(), vec![mssql_types::SqlValue::Int(2)])],
            ),
        ];
        let mut stream = MultiResultStream::new(result_sets);

        let row = stream.next_row().await.unwrap();
        assert!(row.is_some());
        assert!(stream.next_row().await.unwrap().is_none());

        assert!(stream.next_result().await.unwrap());
        let row = stream.next_row().await.unwrap();
        assert!(row.is_some());
        assert!(!stream.next_result().await.unwrap());
    }

    #[test]
    fn projection_map_selects_and_orders_columns() {
        let columns = vec![
            Column {
                name: "id".to_string(),
                index: 0,
                type_name: "INT".to_string(),
                nullable: false,
                max_length: Some(4),
                precision: Some(0),
                scale: Some(0),
                collation: None,
            },
            Column {
                name: "name".to_string(),
                index: 1,
                type_name: "NVARCHAR".to_string(),
                nullable: true,
                max_length: Some(100),
                precision: None,
                scale: None,
                collation: None,
            },
        ];
        let projection = ProjectionMap::new(&columns, &["name", "id"]);
        let row = Row::from_values(
            columns.clone(),
            vec![mssql_types::SqlValue::Int(1), mssql_types::SqlValue::String("Ada".to_string())],
        );
        let projected = projection.apply(&row);
        assert_eq!(projected.len(), 2);
        assert_eq!(projected[0], Some(mssql_types::SqlValue::String("Ada".to_string())));
        assert_eq!(projected[1], Some(mssql_types::SqlValue::Int(1)));
    }
}
