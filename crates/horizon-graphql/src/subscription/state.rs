//! Session lifecycle state and the observable cells that expose it.

use std::fmt;

use horizon_graphql_core::{Observable, ReadOnlyObservable};
use serde_json::Value;

use crate::error::{ClientError, SubscriptionError};
use crate::response::GraphQLResponse;

/// Lifecycle state of a subscription session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SubscriptionState {
    /// No data yet: not connected, or a connection is in flight.
    #[default]
    Pending,
    /// At least one result has arrived on the live connection.
    Connected,
    /// Closed explicitly, by the server, or by a transport failure.
    Closed,
}

impl SubscriptionState {
    /// Lowercase name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Connected => "connected",
            Self::Closed => "closed",
        }
    }

    /// Whether the session is closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three cells a session publishes, and the transitions between them.
///
/// Callers are expected to hold the session lock; the cells themselves only
/// guarantee per-cell atomicity.
#[derive(Debug, Default)]
pub(crate) struct SessionCells {
    state: Observable<SubscriptionState>,
    data: Observable<Option<Value>>,
    error: Observable<Option<SubscriptionError>>,
}

impl SessionCells {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SubscriptionState {
        self.state.get()
    }

    pub fn state_cell(&self) -> ReadOnlyObservable<SubscriptionState> {
        self.state.read_only()
    }

    pub fn data_cell(&self) -> ReadOnlyObservable<Option<Value>> {
        self.data.read_only()
    }

    pub fn error_cell(&self) -> ReadOnlyObservable<Option<SubscriptionError>> {
        self.error.read_only()
    }

    /// Clear data and error and wait for a new connection.
    pub fn reset(&self) {
        self.data.set(None);
        self.error.set(None);
        self.state.set(SubscriptionState::Pending);
    }

    /// Publish a result: state, then error, then data.
    ///
    /// Observers run between the writes and may close or restart the
    /// session. `is_current` is checked after each write and publishing
    /// stops as soon as it returns `false`. Returns whether the whole
    /// result was published by a still-current connection.
    pub fn accept(&self, response: GraphQLResponse, is_current: impl Fn() -> bool) -> bool {
        let error = if response.errors.is_empty() {
            None
        } else {
            Some(SubscriptionError::Response(response.errors))
        };
        self.state.set(SubscriptionState::Connected);
        if !is_current() {
            return false;
        }
        self.error.set(error);
        if !is_current() {
            return false;
        }
        self.data.set(response.data);
        is_current()
    }

    /// Record a transport failure and close.
    pub fn fail(&self, error: ClientError) {
        self.error.set(Some(SubscriptionError::Transport(error)));
        self.close();
    }

    pub fn close(&self) {
        self.state.set(SubscriptionState::Closed);
    }
}
