//! Hook kinds and their payload types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A well-known extension point.
///
/// Each kind fixes the payload type its callbacks receive, so a callback
/// attached for a kind can only ever be handed that kind's payload.
pub trait HookKind: 'static {
    /// Stable identifier of the extension point, used in logs.
    const NAME: &'static str;

    /// The value passed to every callback attached for this kind.
    type Payload: 'static;
}

/// Fired after a new event has been persisted by the server core.
///
/// Feature modules that index or relate events attach here.
#[derive(Debug, Clone, Copy)]
pub enum NewEvent {}

impl HookKind for NewEvent {
    const NAME: &'static str = "new_event";
    type Payload = PersistedEvent;
}

/// Names of every hook kind the server core triggers.
pub const KNOWN_HOOKS: &[&str] = &[NewEvent::NAME];

/// An event record as it was written to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEvent {
    /// Globally unique event identifier.
    pub event_id: String,
    /// The room the event belongs to.
    pub room_id: String,
    /// The sender of the event.
    pub sender: String,
    /// The event type (e.g. `m.room.message`).
    pub event_type: String,
    /// The event content as submitted.
    pub content: serde_json::Value,
    /// When the event was written.
    pub persisted_at: DateTime<Utc>,
}
