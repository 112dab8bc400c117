//! Event persistence, the producer of `new_event` hooks.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use keel_db::{Database, DatabaseOptions, DbError, ExclusiveWriter, QueryContext, Value, Writer};
use keel_hooks::{HookRegistry, NewEvent, PersistedEvent};
use thiserror::Error;

use crate::Core;

/// Description the event store's writer reports in SQL traces.
pub const EVENTS_WRITER: &str = "events";

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS events (
    event_id TEXT PRIMARY KEY,
    room_id TEXT NOT NULL,
    sender TEXT NOT NULL,
    event_type TEXT NOT NULL,
    content TEXT NOT NULL,
    persisted_at TEXT NOT NULL
)";

const INSERT_EVENT: &str = "INSERT INTO events (event_id, room_id, sender, event_type, content, persisted_at) \
     VALUES ($1, $2, $3, $4, $5, $6)";

const SELECT_EVENT: &str = "SELECT event_id, room_id, sender, event_type, content, persisted_at \
     FROM events WHERE event_id = $1";

const COUNT_EVENTS: &str = "SELECT COUNT(*) FROM events";

/// Errors from event storage.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DbError),

    #[error("invalid event content: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid event timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("corrupt event row: {0}")]
    Corrupt(String),
}

/// Stores events and announces each one to `new_event` hooks.
///
/// All writes go through one [`ExclusiveWriter`], so inserts from
/// different threads never overlap.
pub struct EventStore {
    db: Database,
    ctx: QueryContext,
    writer: Arc<ExclusiveWriter>,
    hooks: Arc<HookRegistry>,
}

impl EventStore {
    /// Opens the event database and creates its table if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the handle cannot be opened or
    /// the table cannot be created.
    pub fn open(core: &Core, options: &DatabaseOptions) -> Result<Self, StoreError> {
        let writer = Arc::new(ExclusiveWriter::new(EVENTS_WRITER));
        let (db, ctx) = core
            .factory()
            .open_with_writer(options, Arc::clone(&writer) as Arc<dyn Writer>)?;

        writer.write(|| db.execute(&ctx, CREATE_TABLE, &[]))?;

        Ok(Self {
            db,
            ctx,
            writer,
            hooks: Arc::clone(core.hooks()),
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Writes `event` and then runs every `new_event` callback with it.
    ///
    /// Callbacks run on the calling thread after the insert has finished
    /// and the exclusive writer has been released.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be serialized or the insert
    /// fails; hooks are not run in that case.
    pub fn persist(&self, event: &PersistedEvent) -> Result<(), StoreError> {
        let content = serde_json::to_string(&event.content)?;
        let args = [
            Value::from(event.event_id.as_str()),
            Value::from(event.room_id.as_str()),
            Value::from(event.sender.as_str()),
            Value::from(event.event_type.as_str()),
            Value::from(content),
            Value::from(
                event
                    .persisted_at
                    .to_rfc3339_opts(SecondsFormat::Nanos, true),
            ),
        ];

        self.writer
            .write(|| self.db.execute(&self.ctx, INSERT_EVENT, &args))?;

        tracing::debug!(event_id = %event.event_id, room_id = %event.room_id, "persisted event");
        self.hooks.run::<NewEvent>(event);
        Ok(())
    }

    /// Looks up an event by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored row is malformed.
    pub fn get(&self, event_id: &str) -> Result<Option<PersistedEvent>, StoreError> {
        let row = self
            .db
            .query_opt(&self.ctx, SELECT_EVENT, &[Value::from(event_id)])?;
        row.map(|row| event_from_row(&row)).transpose()
    }

    /// Number of stored events.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count(&self) -> Result<u64, StoreError> {
        let row = self
            .db
            .query_opt(&self.ctx, COUNT_EVENTS, &[])?
            .ok_or_else(|| StoreError::Corrupt("count returned no rows".to_string()))?;
        let count = row
            .first()
            .and_then(Value::as_i64)
            .ok_or_else(|| StoreError::Corrupt("count is not an integer".to_string()))?;
        u64::try_from(count).map_err(|_| StoreError::Corrupt(format!("negative count {count}")))
    }
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("db", &self.db)
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}

fn text(row: &[Value], idx: usize, column: &str) -> Result<String, StoreError> {
    row.get(idx)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StoreError::Corrupt(format!("column {column} is not text")))
}

fn event_from_row(row: &[Value]) -> Result<PersistedEvent, StoreError> {
    let content = serde_json::from_str(&text(row, 4, "content")?)?;
    let persisted_at =
        DateTime::parse_from_rfc3339(&text(row, 5, "persisted_at")?)?.with_timezone(&Utc);

    Ok(PersistedEvent {
        event_id: text(row, 0, "event_id")?,
        room_id: text(row, 1, "room_id")?,
        sender: text(row, 2, "sender")?,
        event_type: text(row, 3, "event_type")?,
        content,
        persisted_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_with_wrong_types_is_corrupt() {
        let row = vec![Value::Integer(1); 6];
        let err = event_from_row(&row).expect_err("integer columns should be rejected");
        assert!(matches!(err, StoreError::Corrupt(_)), "unexpected error: {err:?}");
    }

    #[test]
    fn row_with_bad_timestamp_is_rejected() {
        let row: Vec<Value> = ["$e", "!r", "@s", "m.room.message", "{}", "yesterday"]
            .into_iter()
            .map(Value::from)
            .collect();
        let err = event_from_row(&row).expect_err("timestamp should be rejected");
        assert!(matches!(err, StoreError::Timestamp(_)));
    }
}
