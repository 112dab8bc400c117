//! Database access layer for the Keel server.
//!
//! Every feature module issues SQL through a [`Database`] handle opened by
//! the shared [`ConnectionFactory`]. The factory supports two backends,
//! selected by the scheme of the connection string:
//!
//! | Scheme | Backend | Pool limits |
//! |--------|---------|-------------|
//! | `file:` | embedded SQLite (`rusqlite` + `r2d2`) | fixed |
//! | `postgres://`, `postgresql://` | PostgreSQL (`postgres` + `r2d2`) | from [`DatabaseOptions`] |
//!
//! # Tracing
//!
//! When SQL tracing is switched on at startup, every handle is wrapped in a
//! [`TracedExecutor`] that logs each statement with its duration, error and
//! arguments. Handles opened with
//! [`ConnectionFactory::open_with_writer`] are tied to a [`Writer`], the
//! logical owner of the connection, through a [`ConnectionToken`] carried in
//! the returned [`QueryContext`]. Any non-`SELECT` statement on such a
//! handle produces an audit entry naming the writer.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use keel_db::{ConnectionFactory, DatabaseOptions, NamedWriter, TraceConfig, WriterRegistry};
//!
//! let factory = ConnectionFactory::new(Arc::new(WriterRegistry::new()), TraceConfig::enabled());
//! let (db, ctx) = factory.open_with_writer(
//!     &DatabaseOptions::new("file:events.db"),
//!     Arc::new(NamedWriter::new("events")),
//! )?;
//! db.execute(&ctx, "INSERT INTO events (id) VALUES (?1)", &["$1".into()])?;
//! ```

mod backend;
mod context;
mod error;
mod factory;
mod options;
mod trace;
mod value;
mod writer;

pub use backend::{Executor, MaterializedRows, PostgresBackend, RowCursor, Rows, SqliteBackend};
pub use context::QueryContext;
pub use error::DbError;
pub use factory::{redact_dsn, ConnectionFactory, Database};
pub use options::{BackendKind, ConnectionString, DatabaseOptions};
pub use trace::{RowLogging, SafetyLabel, TraceConfig, TracedExecutor, TRACE_DRIVER_SUFFIX};
pub use value::Value;
pub use writer::{ConnectionToken, ExclusiveWriter, NamedWriter, Writer, WriterRegistry};
