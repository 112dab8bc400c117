//! Embedded SQLite adapter.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params_from_iter, OpenFlags};

use super::{Executor, MaterializedRows, Rows};
use crate::context::QueryContext;
use crate::error::DbError;
use crate::options::BackendKind;
use crate::value::Value;

/// Busy timeout applied to every SQLite connection, in milliseconds.
const BUSY_TIMEOUT_MS: u64 = 5_000;

/// Connections per file-backed pool.
const POOL_SIZE: u32 = 8;

/// SQLite path that opens a private in-memory database.
const MEMORY_PATH: &str = ":memory:";

/// Statement execution against a pooled SQLite database file.
#[derive(Clone)]
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("max_size", &self.pool.max_size())
            .finish()
    }
}

impl SqliteBackend {
    /// Opens a pool over the database at `path`, with WAL mode and foreign
    /// keys enabled.
    ///
    /// Pool sizing is fixed here; an in-memory database gets exactly one
    /// connection so that every statement sees the same data.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Pool`] if the first connection cannot be opened
    /// or initialised.
    pub fn open(path: &str) -> Result<Self, DbError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

        let manager = SqliteConnectionManager::file(path)
            .with_flags(flags)
            .with_init(|conn| {
                conn.execute_batch(&format!(
                    "PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};
                     PRAGMA foreign_keys = ON;"
                ))?;
                // In-memory databases report "memory", which is fine.
                let journal_mode: String =
                    conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
                if journal_mode != "wal" && journal_mode != "memory" {
                    return Err(rusqlite::Error::SqliteFailure(
                        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                        Some(format!(
                            "failed to set WAL journal mode, got: {journal_mode}"
                        )),
                    ));
                }
                Ok(())
            });

        let max_size = if path == MEMORY_PATH { 1 } else { POOL_SIZE };
        let pool = Pool::builder()
            .max_size(max_size)
            .build(manager)
            .map_err(|source| DbError::Pool {
                driver: BackendKind::Sqlite.driver_name(),
                source,
            })?;

        tracing::debug!(path, max_size = pool.max_size(), "opened sqlite pool");
        Ok(Self { pool })
    }

    /// Maximum number of pooled connections.
    pub fn max_size(&self) -> u32 {
        self.pool.max_size()
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, DbError> {
        self.pool.get().map_err(|source| DbError::Pool {
            driver: BackendKind::Sqlite.driver_name(),
            source,
        })
    }
}

impl Executor for SqliteBackend {
    fn backend(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn execute(&self, _ctx: &QueryContext, sql: &str, args: &[Value]) -> Result<u64, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        // Step to completion so statements that also return rows, such as
        // `INSERT .. RETURNING`, run like any other write.
        let mut rows = stmt.query(params_from_iter(args.iter()))?;
        while rows.next()?.is_some() {}
        drop(rows);
        drop(stmt);
        Ok(conn.changes() as u64)
    }

    fn query(&self, _ctx: &QueryContext, sql: &str, args: &[Value]) -> Result<Rows, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut fetched = Vec::new();
        let mut rows = stmt.query(params_from_iter(args.iter()))?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for idx in 0..width {
                values.push(Value::from(row.get_ref(idx)?));
            }
            fetched.push(values);
        }

        Ok(Box::new(MaterializedRows::new(columns, fetched)))
    }
}
