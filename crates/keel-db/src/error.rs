//! Error types for the database layer.

use thiserror::Error;

/// Errors returned by connection setup and statement execution.
///
/// Backend errors are carried unchanged so callers can inspect the driver's
/// own error value.
#[derive(Debug, Error)]
pub enum DbError {
    /// The connection descriptor or pool settings are unusable.
    #[error("invalid database configuration: {0}")]
    Config(String),

    /// An error reported by the embedded SQLite backend.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// An error reported by the networked PostgreSQL backend.
    #[error(transparent)]
    Postgres(#[from] postgres::Error),

    /// The connection pool could not be built or could not hand out a
    /// connection.
    #[error("{driver} connection pool: {source}")]
    Pool {
        /// Driver name of the pool that failed.
        driver: &'static str,
        /// The underlying pool error.
        source: r2d2::Error,
    },

    /// A result column's value could not be decoded.
    #[error("column '{column}' could not be decoded: {source}")]
    Decode {
        /// Name of the offending column.
        column: String,
        /// The driver's decoding error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A result column has a type the backend adapter cannot represent.
    #[error("column '{column}' has unsupported type {type_name}")]
    UnsupportedColumnType {
        /// Name of the offending column.
        column: String,
        /// The backend's name for the column type.
        type_name: String,
    },
}

impl DbError {
    /// Returns `true` for configuration errors, which are never worth
    /// retrying.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
