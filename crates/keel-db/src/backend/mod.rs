//! The execute/query capability every backend adapter implements.
//!
//! [`ConnectionFactory`](crate::ConnectionFactory) picks an adapter from the
//! connection descriptor, and the tracing decorator wraps whichever adapter
//! it got, so call sites never see which backend they are talking to.

mod postgres;
mod sqlite;

pub use postgres::PostgresBackend;
pub use sqlite::SqliteBackend;

use crate::context::QueryContext;
use crate::error::DbError;
use crate::options::BackendKind;
use crate::value::Value;

/// Rows returned by [`Executor::query`].
pub type Rows = Box<dyn RowCursor + Send>;

/// Minimal statement execution capability.
pub trait Executor: Send + Sync {
    /// Which backend ultimately runs the statements.
    fn backend(&self) -> BackendKind;

    /// Runs a statement that returns no rows and reports the number of
    /// rows affected.
    fn execute(&self, ctx: &QueryContext, sql: &str, args: &[Value]) -> Result<u64, DbError>;

    /// Runs a statement that returns rows.
    fn query(&self, ctx: &QueryContext, sql: &str, args: &[Value]) -> Result<Rows, DbError>;
}

/// Forward-only cursor over a result set.
pub trait RowCursor {
    /// Column names of the result set, in order.
    fn columns(&self) -> &[String];

    /// Fetches the next row, or `None` once the result set is exhausted.
    fn next_row(&mut self) -> Result<Option<Vec<Value>>, DbError>;

    /// Drains the remaining rows.
    fn collect_all(&mut self) -> Result<Vec<Vec<Value>>, DbError> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row()? {
            rows.push(row);
        }
        Ok(rows)
    }
}

/// A result set fetched eagerly from the backend.
///
/// Pooled connections go back to the pool as soon as the statement
/// finishes, so adapters read every row before returning.
#[derive(Debug, Clone, Default)]
pub struct MaterializedRows {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl MaterializedRows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows: rows.into_iter(),
        }
    }
}

impl RowCursor for MaterializedRows {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>, DbError> {
        Ok(self.rows.next())
    }
}
