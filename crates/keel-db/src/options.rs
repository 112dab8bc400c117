//! Connection descriptors and pool sizing.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DbError;

/// Which of the two supported backends a descriptor selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Single-file, in-process SQLite database.
    Sqlite,
    /// Client/server PostgreSQL database.
    Postgres,
}

impl BackendKind {
    /// Driver name for the backend, before any tracing suffix.
    pub fn driver_name(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite3",
            Self::Postgres => "postgres",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.driver_name())
    }
}

/// A connection descriptor, classified by its scheme.
///
/// - `file:` selects the embedded backend; the rest is a local path.
/// - `postgres://` or `postgresql://` selects the networked backend and is
///   handed to the driver verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionString(String);

impl ConnectionString {
    /// Wraps a descriptor without validating it.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The descriptor as given.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_sqlite(&self) -> bool {
        self.0.starts_with("file:")
    }

    pub fn is_postgres(&self) -> bool {
        self.0.starts_with("postgres://") || self.0.starts_with("postgresql://")
    }

    /// Classifies the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] when the scheme is not recognised.
    pub fn backend(&self) -> Result<BackendKind, DbError> {
        if self.is_sqlite() {
            Ok(BackendKind::Sqlite)
        } else if self.is_postgres() {
            Ok(BackendKind::Postgres)
        } else {
            Err(DbError::Config(format!(
                "invalid database connection string {:?}",
                self.0
            )))
        }
    }

    /// Parses a `file:` descriptor into the local path SQLite should open.
    ///
    /// `file:relative.db`, `file:///abs/path.db` and `file://relative.db`
    /// are accepted; anything after `?` is dropped. `file::memory:` yields
    /// SQLite's `:memory:` path.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] for non-`file:` descriptors and for
    /// descriptors with an empty path.
    pub fn file_path(&self) -> Result<String, DbError> {
        let rest = self.0.strip_prefix("file:").ok_or_else(|| {
            DbError::Config(format!("expected a file: connection string, got {:?}", self.0))
        })?;
        let rest = rest.strip_prefix("//").unwrap_or(rest);
        let path = rest.split('?').next().unwrap_or_default();
        if path.is_empty() {
            return Err(DbError::Config(format!(
                "connection string {:?} has no file path",
                self.0
            )));
        }
        Ok(path.to_string())
    }
}

impl From<&str> for ConnectionString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Connection descriptor plus pool sizing.
///
/// Pool settings only apply to the networked backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseOptions {
    /// Where to connect.
    #[serde(default = "default_connection_string")]
    pub connection_string: ConnectionString,

    /// Upper bound on open connections.
    #[serde(default = "default_max_open_conns")]
    pub max_open_conns: u32,

    /// Number of idle connections the pool tries to keep.
    #[serde(default = "default_max_idle_conns")]
    pub max_idle_conns: u32,

    /// Maximum lifetime of a connection in seconds. Zero or negative means
    /// connections are reused forever.
    #[serde(default = "default_conn_max_lifetime_secs")]
    pub conn_max_lifetime_secs: i64,
}

fn default_connection_string() -> ConnectionString {
    ConnectionString::new("file:keel.db")
}

fn default_max_open_conns() -> u32 {
    90
}

fn default_max_idle_conns() -> u32 {
    5
}

fn default_conn_max_lifetime_secs() -> i64 {
    -1
}

impl DatabaseOptions {
    /// Options for `connection_string` with default pool sizing.
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: ConnectionString::new(connection_string),
            max_open_conns: default_max_open_conns(),
            max_idle_conns: default_max_idle_conns(),
            conn_max_lifetime_secs: default_conn_max_lifetime_secs(),
        }
    }

    /// Maximum connection lifetime, or `None` for unlimited.
    pub fn conn_max_lifetime(&self) -> Option<Duration> {
        u64::try_from(self.conn_max_lifetime_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            connection_string: default_connection_string(),
            max_open_conns: default_max_open_conns(),
            max_idle_conns: default_max_idle_conns(),
            conn_max_lifetime_secs: default_conn_max_lifetime_secs(),
        }
    }
}
