//! The event sink handed to transports.

use std::fmt;
use std::sync::Weak;

use crate::error::ClientError;
use crate::response::GraphQLResponse;

use super::epoch::Epoch;
use super::session::{AttemptId, SessionShared};

/// Receives events for one connection attempt.
///
/// Each call to [`SubscriptionTransport::open`](crate::transport::SubscriptionTransport::open)
/// gets its own sink. The sink is bound to the epoch and attempt it was
/// created for: once the session restarts, hands off to a newer attempt, or
/// closes, further events are dropped.
///
/// Sinks are cheap to clone and may be moved to any thread.
#[derive(Clone)]
pub struct EventSink {
    session: Weak<SessionShared>,
    attempt: AttemptId,
    epoch: Epoch,
}

impl EventSink {
    pub(crate) fn new(session: Weak<SessionShared>, attempt: AttemptId, epoch: Epoch) -> Self {
        Self {
            session,
            attempt,
            epoch,
        }
    }

    /// The epoch this attempt was started under.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Deliver a result. A result with `hasNext: false` ends the stream.
    pub fn next(&self, response: GraphQLResponse) {
        if let Some(session) = self.session.upgrade() {
            session.on_next(self.attempt, self.epoch, response);
        }
    }

    /// Report a transport failure. Terminal for this attempt.
    pub fn error(&self, error: ClientError) {
        if let Some(session) = self.session.upgrade() {
            session.on_terminal(self.attempt, self.epoch, Some(error));
        }
    }

    /// Report that the server ended the stream. Terminal for this attempt.
    pub fn complete(&self) {
        if let Some(session) = self.session.upgrade() {
            session.on_terminal(self.attempt, self.epoch, None);
        }
    }

    /// Register cleanup for this attempt.
    ///
    /// Hooks run once, in registration order, when the attempt is retired.
    /// If the attempt has already been retired the hook runs immediately.
    pub fn on_unsubscribe(&self, hook: impl FnOnce() + Send + 'static) {
        match self.session.upgrade() {
            Some(session) => session.register_hook(self.attempt, Box::new(hook)),
            None => hook(),
        }
    }

    /// Whether this attempt still belongs to its session.
    ///
    /// Transports may use this to stop work early; events sent after it
    /// turns `false` are ignored either way.
    pub fn is_active(&self) -> bool {
        self.session
            .upgrade()
            .is_some_and(|session| session.is_attempt_active(self.attempt, self.epoch))
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("attempt", &self.attempt)
            .field("epoch", &self.epoch)
            .finish()
    }
}
