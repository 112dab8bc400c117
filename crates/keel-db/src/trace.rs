//! SQL tracing decorator.
//!
//! [`TracedExecutor`] wraps any [`Executor`] and logs every statement it
//! runs: duration, error, the owner of the connection and the bound
//! arguments. It also writes an audit entry whenever a statement other than
//! a `SELECT` goes through a connection with a registered [`Writer`], since
//! that write may be touching a table the owner does not own.
//!
//! The decorator is purely observational. Rows, results and errors reach the
//! caller exactly as the wrapped executor produced them.
//!
//! [`Writer`]: crate::Writer

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::backend::{Executor, RowCursor, Rows};
use crate::context::QueryContext;
use crate::error::DbError;
use crate::options::BackendKind;
use crate::value::Value;
use crate::writer::{ConnectionToken, WriterRegistry};

/// Suffix appended to the driver name of a traced handle.
pub const TRACE_DRIVER_SUFFIX: &str = "-trace";

/// Statements starting with this exact prefix are treated as reads.
///
/// This is a literal, case-sensitive prefix check: leading whitespace,
/// lowercase `select` or a `WITH` clause all count as writes.
const READ_PREFIX: &str = "SELECT ";

/// How much of each result set gets logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowLogging {
    /// Rows are not logged.
    Off,
    /// Every fetched row is logged with its column names.
    #[default]
    PerRow,
    /// One summary line per result set, once it is exhausted.
    PerResultSet,
}

/// Whether handles are traced, and how verbosely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Installs the tracing decorator on every handle opened.
    #[serde(default)]
    pub enabled: bool,

    /// Row-level verbosity for traced handles.
    #[serde(default)]
    pub row_logging: RowLogging,
}

impl TraceConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            row_logging: RowLogging::default(),
        }
    }
}

/// Who a statement ran on behalf of, as far as the trace can tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyLabel {
    /// The call context carried no connection token.
    NoToken,
    /// The context carried a token nobody registered.
    Unregistered(ConnectionToken),
    /// The token resolved to a writer with this description.
    Writer(String),
}

impl SafetyLabel {
    /// Resolves the label for a call made with `ctx`.
    pub fn resolve(ctx: &QueryContext, writers: &WriterRegistry) -> Self {
        match ctx.token() {
            None => Self::NoToken,
            Some(token) => match writers.resolve(token) {
                Some(writer) => Self::Writer(writer.description()),
                None => Self::Unregistered(token.clone()),
            },
        }
    }

    /// The writer's description, if one was resolved.
    pub fn writer(&self) -> Option<&str> {
        match self {
            Self::Writer(description) => Some(description),
            _ => None,
        }
    }

    /// Whether running `sql` under this label warrants an audit entry.
    pub fn requires_audit(&self, sql: &str) -> bool {
        self.writer().is_some() && !sql.starts_with(READ_PREFIX)
    }
}

impl fmt::Display for SafetyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoToken => Ok(()),
            Self::Unregistered(token) => write!(f, "no writer for key {token}"),
            Self::Writer(description) => f.write_str(description),
        }
    }
}

/// Executor decorator that logs every statement.
pub struct TracedExecutor<E> {
    inner: E,
    writers: Arc<WriterRegistry>,
    row_logging: RowLogging,
}

impl<E: Executor> TracedExecutor<E> {
    pub fn new(inner: E, writers: Arc<WriterRegistry>, row_logging: RowLogging) -> Self {
        Self {
            inner,
            writers,
            row_logging,
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    fn observe(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[Value],
        elapsed: Duration,
        error: Option<&DbError>,
    ) {
        // The audit entry is INFO and the trace entry DEBUG; if neither
        // would be recorded there is nothing to resolve or format.
        if !tracing::enabled!(Level::INFO) {
            return;
        }

        let label = SafetyLabel::resolve(ctx, &self.writers);
        if label.requires_audit(sql) {
            tracing::info!(
                writer = label.writer().unwrap_or_default(),
                statement = sql,
                "unsafe: statement is not a read on a writer-owned connection"
            );
        }

        tracing::debug!(
            duration = ?elapsed,
            error = error.map(tracing::field::display),
            safe = %label,
            statement = sql,
            args = ?args,
            "executed sql query"
        );
    }
}

impl<E: Executor> Executor for TracedExecutor<E> {
    fn backend(&self) -> BackendKind {
        self.inner.backend()
    }

    fn execute(&self, ctx: &QueryContext, sql: &str, args: &[Value]) -> Result<u64, DbError> {
        let started = Instant::now();
        let result = self.inner.execute(ctx, sql, args);
        self.observe(ctx, sql, args, started.elapsed(), result.as_ref().err());
        result
    }

    fn query(&self, ctx: &QueryContext, sql: &str, args: &[Value]) -> Result<Rows, DbError> {
        let started = Instant::now();
        let result = self.inner.query(ctx, sql, args);
        self.observe(ctx, sql, args, started.elapsed(), result.as_ref().err());

        match (result, self.row_logging) {
            (Ok(rows), RowLogging::Off) => Ok(rows),
            (Ok(rows), logging) => Ok(Box::new(TracedRows::new(rows, logging))),
            (Err(err), _) => Err(err),
        }
    }
}

impl<E> fmt::Debug for TracedExecutor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracedExecutor")
            .field("row_logging", &self.row_logging)
            .finish_non_exhaustive()
    }
}

/// Cursor decorator that logs fetched rows.
struct TracedRows {
    inner: Rows,
    logging: RowLogging,
    fetched: usize,
    exhausted: bool,
}

impl TracedRows {
    fn new(inner: Rows, logging: RowLogging) -> Self {
        Self {
            inner,
            logging,
            fetched: 0,
            exhausted: false,
        }
    }
}

impl RowCursor for TracedRows {
    fn columns(&self) -> &[String] {
        self.inner.columns()
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>, DbError> {
        let next = self.inner.next_row();
        match &next {
            Ok(Some(row)) => {
                self.fetched += 1;
                if self.logging == RowLogging::PerRow && tracing::enabled!(Level::DEBUG) {
                    let values: Vec<String> = row.iter().map(Value::quoted).collect();
                    tracing::debug!(
                        columns = %self.inner.columns().join(" | "),
                        values = %values.join(" | "),
                        "fetched row"
                    );
                }
            }
            // End of data carries no new row; only the per-result-set
            // summary is written here, and only once.
            Ok(None) => {
                if self.logging == RowLogging::PerResultSet && !self.exhausted {
                    tracing::debug!(
                        columns = %self.inner.columns().join(" | "),
                        rows = self.fetched,
                        "result set exhausted"
                    );
                }
                self.exhausted = true;
            }
            Err(_) => {}
        }
        next
    }
}
