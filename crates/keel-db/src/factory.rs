//! Opening database handles.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::backend::{Executor, PostgresBackend, Rows, SqliteBackend};
use crate::context::QueryContext;
use crate::error::DbError;
use crate::options::{BackendKind, DatabaseOptions};
use crate::trace::{TraceConfig, TracedExecutor, TRACE_DRIVER_SUFFIX};
use crate::value::Value;
use crate::writer::{Writer, WriterRegistry};

static DSN_CREDENTIALS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"://[^@]*@").unwrap());

/// Strips the `user:password@` part from a URL-style data source name.
pub fn redact_dsn(dsn: &str) -> String {
    DSN_CREDENTIALS.replace(dsn, "://").into_owned()
}

/// Opens database handles for feature modules.
///
/// One factory is built by the server at startup and shared; it owns the
/// trace toggle and the writer registry every traced handle reports to.
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    writers: Arc<WriterRegistry>,
    trace: TraceConfig,
}

impl ConnectionFactory {
    pub fn new(writers: Arc<WriterRegistry>, trace: TraceConfig) -> Self {
        Self { writers, trace }
    }

    pub fn writers(&self) -> &Arc<WriterRegistry> {
        &self.writers
    }

    pub fn trace(&self) -> TraceConfig {
        self.trace
    }

    /// Opens a handle for the database `options` describes.
    ///
    /// `file:` descriptors open the embedded SQLite backend at the parsed
    /// path; `postgres://` descriptors are handed to the PostgreSQL driver
    /// unchanged and are the only ones the pool limits in `options` apply
    /// to. When tracing is enabled the handle's driver name carries the
    /// `-trace` suffix and every statement goes through
    /// [`TracedExecutor`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] for an unrecognised or malformed
    /// descriptor, and the backend's own error if the pool cannot be built.
    pub fn open(&self, options: &DatabaseOptions) -> Result<Database, DbError> {
        let backend = options.connection_string.backend()?;

        let executor = match backend {
            BackendKind::Sqlite => {
                let path = options.connection_string.file_path()?;
                self.wrap(SqliteBackend::open(&path)?)
            }
            BackendKind::Postgres => {
                let dsn = options.connection_string.as_str();
                tracing::debug!(
                    max_open_conns = options.max_open_conns,
                    max_idle_conns = options.max_idle_conns,
                    conn_max_lifetime_secs = options.conn_max_lifetime_secs,
                    data_source_name = %redact_dsn(dsn),
                    "setting database connection limits"
                );
                self.wrap(PostgresBackend::open(dsn, options)?)
            }
        };

        let mut driver_name = backend.driver_name().to_string();
        if self.trace.enabled {
            driver_name.push_str(TRACE_DRIVER_SUFFIX);
        }

        tracing::info!(driver = %driver_name, "opened database handle");
        Ok(Database {
            executor,
            driver_name,
        })
    }

    /// Opens a handle owned by `writer`.
    ///
    /// Registers a fresh connection token for `writer` and returns a
    /// context carrying it; queries made with that context are attributed
    /// to `writer` in the trace.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open). Nothing is registered when opening
    /// fails.
    pub fn open_with_writer(
        &self,
        options: &DatabaseOptions,
        writer: Arc<dyn Writer>,
    ) -> Result<(Database, QueryContext), DbError> {
        let db = self.open(options)?;
        let token = self.writers.register(writer);
        Ok((db, QueryContext::with_token(token)))
    }

    fn wrap<E: Executor + 'static>(&self, executor: E) -> Arc<dyn Executor> {
        if self.trace.enabled {
            Arc::new(TracedExecutor::new(
                executor,
                Arc::clone(&self.writers),
                self.trace.row_logging,
            ))
        } else {
            Arc::new(executor)
        }
    }
}

/// A ready-to-use database handle.
///
/// Cloning is cheap and clones share the underlying pool.
#[derive(Clone)]
pub struct Database {
    executor: Arc<dyn Executor>,
    driver_name: String,
}

impl Database {
    /// The driver name, `sqlite3` or `postgres`, with `-trace` appended on
    /// traced handles.
    pub fn driver_name(&self) -> &str {
        &self.driver_name
    }

    pub fn backend(&self) -> BackendKind {
        self.executor.backend()
    }

    pub fn is_traced(&self) -> bool {
        self.driver_name.ends_with(TRACE_DRIVER_SUFFIX)
    }

    /// Runs a statement that returns no rows.
    ///
    /// # Errors
    ///
    /// Returns the backend's error unchanged.
    pub fn execute(&self, ctx: &QueryContext, sql: &str, args: &[Value]) -> Result<u64, DbError> {
        self.executor.execute(ctx, sql, args)
    }

    /// Runs a statement and returns a cursor over its rows.
    ///
    /// # Errors
    ///
    /// Returns the backend's error unchanged.
    pub fn query(&self, ctx: &QueryContext, sql: &str, args: &[Value]) -> Result<Rows, DbError> {
        self.executor.query(ctx, sql, args)
    }

    /// Runs a statement and collects every row.
    ///
    /// # Errors
    ///
    /// Returns the backend's error unchanged.
    pub fn query_all(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[Value],
    ) -> Result<Vec<Vec<Value>>, DbError> {
        self.query(ctx, sql, args)?.collect_all()
    }

    /// Runs a statement and returns its first row, if any.
    ///
    /// # Errors
    ///
    /// Returns the backend's error unchanged.
    pub fn query_opt(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[Value],
    ) -> Result<Option<Vec<Value>>, DbError> {
        self.query(ctx, sql, args)?.next_row()
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("driver_name", &self.driver_name)
            .finish_non_exhaustive()
    }
}
