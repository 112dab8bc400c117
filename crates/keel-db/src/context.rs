//! Per-call context threaded through every statement.

use crate::writer::ConnectionToken;

/// Carries the connection token of the handle a call belongs to.
///
/// Contexts are cheap to clone and are passed explicitly to every
/// [`Database`](crate::Database) call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryContext {
    token: Option<ConnectionToken>,
}

impl QueryContext {
    /// A context with no connection token. Queries made with it resolve no
    /// writer.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context carrying `token`.
    pub fn with_token(token: ConnectionToken) -> Self {
        Self { token: Some(token) }
    }

    pub fn token(&self) -> Option<&ConnectionToken> {
        self.token.as_ref()
    }
}
