//! Connection owners and the token registry that correlates queries with
//! them.
//!
//! Every handle opened with [`ConnectionFactory::open_with_writer`] gets a
//! fresh [`ConnectionToken`] mapped to the [`Writer`] that owns it. The
//! token travels with each call in a [`QueryContext`], and the tracing
//! decorator resolves it back to the owner when it writes audit entries.
//!
//! [`ConnectionFactory::open_with_writer`]: crate::ConnectionFactory::open_with_writer
//! [`QueryContext`]: crate::QueryContext

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// The logical owner of a connection.
///
/// The description is only used to build audit strings; it has no effect
/// on how statements are executed.
pub trait Writer: Send + Sync {
    /// Short human-readable name of the owner, usually the table or module
    /// the connection writes to.
    fn description(&self) -> String;
}

/// A writer that is nothing more than a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedWriter {
    name: String,
}

impl NamedWriter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Writer for NamedWriter {
    fn description(&self) -> String {
        self.name.clone()
    }
}

/// A writer that serialises the write closures run through it.
///
/// SQLite permits a single writer at a time; funnelling every write for a
/// database through one `ExclusiveWriter` keeps callers from tripping over
/// `SQLITE_BUSY`.
#[derive(Debug)]
pub struct ExclusiveWriter {
    name: String,
    lock: Mutex<()>,
}

impl ExclusiveWriter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lock: Mutex::new(()),
        }
    }

    /// Runs `f` while holding the writer's lock.
    pub fn write<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        f()
    }
}

impl Writer for ExclusiveWriter {
    fn description(&self) -> String {
        self.name.clone()
    }
}

/// Opaque per-open correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionToken(String);

impl ConnectionToken {
    /// Wraps an existing token string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Append-only map from connection token to writer.
///
/// Tokens are minted from an atomic counter, so concurrent registrations
/// never share a token. Entries are never removed: once registered, a token
/// resolves to the same writer for the lifetime of the registry.
#[derive(Default)]
pub struct WriterRegistry {
    counter: AtomicU64,
    writers: RwLock<HashMap<ConnectionToken, Arc<dyn Writer>>>,
}

impl WriterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a new token and maps it to `writer`.
    pub fn register(&self, writer: Arc<dyn Writer>) -> ConnectionToken {
        let id = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let token = ConnectionToken(id.to_string());
        let description = writer.description();

        self.writers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token.clone(), writer);

        tracing::debug!(token = %token, writer = %description, "registered connection writer");
        token
    }

    /// Looks up the writer registered for `token`.
    pub fn resolve(&self, token: &ConnectionToken) -> Option<Arc<dyn Writer>> {
        self.writers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(token)
            .cloned()
    }

    /// Number of registered tokens.
    pub fn len(&self) -> usize {
        self.writers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for WriterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterRegistry")
            .field("registered", &self.len())
            .finish()
    }
}
