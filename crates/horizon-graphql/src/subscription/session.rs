//! Subscription sessions and connection handoff.
//!
//! A session owns at most two connection attempts: the *live* attempt whose
//! results are published, and, during a refresh, a *candidate* opened in
//! the background. All bookkeeping happens under one reentrant lock so that
//! transport events, caller commands and observer callbacks are applied one
//! at a time. Observers and cleanup hooks run with the lock held but the
//! bookkeeping released, so they may call back into the session.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use horizon_graphql_core::ReadOnlyObservable;
use parking_lot::{ReentrantMutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, error, trace, warn};

use crate::context::SubscriptionContext;
use crate::document::OperationDocument;
use crate::error::{ClientError, Result, SubscriptionError};
use crate::response::GraphQLResponse;
use crate::targets;
use crate::transport::{ConnectionRequest, SubscriptionTransport};

use super::epoch::{Epoch, EpochGuard};
use super::hooks::{Hook, UnsubscribeHooks};
use super::sink::EventSink;
use super::state::{SessionCells, SubscriptionState};

/// How a [`restart`](SubscriptionSession::restart) or
/// [`refresh`](SubscriptionSession::refresh) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handoff {
    /// The new connection delivered its first result and is now live.
    Connected,
    /// A later restart or refresh replaced the new connection first.
    Superseded,
    /// The new connection, or the whole session, closed before connecting.
    Closed,
    /// Nothing was started: the session is pending, or subscriptions are
    /// disabled in this execution context.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct AttemptId(u64);

struct Attempt {
    id: AttemptId,
    epoch: Epoch,
    hooks: UnsubscribeHooks,
    ready: Option<oneshot::Sender<Handoff>>,
}

impl Attempt {
    fn resolve(&mut self, outcome: Handoff) {
        if let Some(ready) = self.ready.take() {
            let _ = ready.send(outcome);
        }
    }

    /// Settle the attempt's waiter and run its cleanup.
    fn retire(mut self, outcome: Handoff) {
        trace!(
            target: targets::SUBSCRIPTION,
            attempt = self.id.0,
            epoch = %self.epoch,
            hooks = self.hooks.len(),
            ?outcome,
            "retiring connection"
        );
        self.resolve(outcome);
        self.hooks.run();
    }
}

#[derive(Default)]
struct Attempts {
    next_id: u64,
    live: Option<Attempt>,
    candidate: Option<Attempt>,
}

impl Attempts {
    fn allocate(&mut self, epoch: Epoch) -> (Attempt, oneshot::Receiver<Handoff>) {
        self.next_id += 1;
        let (ready, waiter) = oneshot::channel();
        let attempt = Attempt {
            id: AttemptId(self.next_id),
            epoch,
            hooks: UnsubscribeHooks::new(),
            ready: Some(ready),
        };
        (attempt, waiter)
    }

    fn is_live(&self, id: AttemptId) -> bool {
        self.live.as_ref().is_some_and(|a| a.id == id)
    }

    fn is_candidate(&self, id: AttemptId) -> bool {
        self.candidate.as_ref().is_some_and(|a| a.id == id)
    }

    fn get_mut(&mut self, id: AttemptId) -> Option<&mut Attempt> {
        self.live
            .as_mut()
            .filter(|a| a.id == id)
            .or(self.candidate.as_mut().filter(|a| a.id == id))
    }

    /// Remove every attempt, live first.
    fn take_all(&mut self) -> Vec<Attempt> {
        self.live.take().into_iter().chain(self.candidate.take()).collect()
    }
}

enum NextStep {
    Drop,
    Publish(Option<oneshot::Sender<Handoff>>),
    Promote(Option<Attempt>, Option<oneshot::Sender<Handoff>>),
}

enum TerminalStep {
    Drop,
    Close(Option<Attempt>),
    Promote(Option<Attempt>),
    Abandon(Option<Attempt>),
}

pub(crate) struct SessionShared {
    document: OperationDocument,
    transport: Option<Arc<dyn SubscriptionTransport>>,
    url: String,
    context: SubscriptionContext,
    auto_connect: bool,
    variables: RwLock<Value>,
    epoch: EpochGuard,
    cells: SessionCells,
    attempts: ReentrantMutex<RefCell<Attempts>>,
}

impl SessionShared {
    fn connection_request(&self) -> ConnectionRequest {
        ConnectionRequest {
            document: self.document.clone(),
            variables: self.variables.read().clone(),
            url: self.url.clone(),
            context: self.context.clone(),
        }
    }

    fn begin_restart(self: &Arc<Self>) -> Option<oneshot::Receiver<Handoff>> {
        let Some(transport) = self.transport.as_ref() else {
            debug!(
                target: targets::SUBSCRIPTION,
                operation = ?self.document.operation_name(),
                "subscriptions are disabled in this execution context"
            );
            return None;
        };

        let guard = self.attempts.lock();
        let previous = guard.borrow_mut().take_all();
        if !previous.is_empty() {
            self.cells.close();
            for attempt in previous {
                attempt.retire(Handoff::Superseded);
            }
        }

        let epoch = self.epoch.bump();
        self.cells.reset();

        let (attempt, waiter) = guard.borrow_mut().allocate(epoch);
        let sink = EventSink::new(Arc::downgrade(self), attempt.id, epoch);
        // Observers above may have re-entered and opened their own attempt.
        let displaced = {
            let mut attempts = guard.borrow_mut();
            let displaced = attempts.take_all();
            attempts.live = Some(attempt);
            displaced
        };
        for attempt in displaced {
            attempt.retire(Handoff::Superseded);
        }

        debug!(
            target: targets::SUBSCRIPTION,
            transport = transport.name(),
            %epoch,
            operation = ?self.document.operation_name(),
            "opening subscription"
        );
        transport.open(self.connection_request(), sink);
        Some(waiter)
    }

    fn begin_refresh(self: &Arc<Self>) -> Option<oneshot::Receiver<Handoff>> {
        let transport = self.transport.as_ref()?;

        let guard = self.attempts.lock();
        match self.cells.state() {
            SubscriptionState::Closed => self.begin_restart(),
            SubscriptionState::Pending => {
                if cfg!(debug_assertions) {
                    warn!(
                        target: targets::SUBSCRIPTION,
                        operation = ?self.document.operation_name(),
                        "refresh() ignored: the subscription is still pending"
                    );
                }
                None
            }
            SubscriptionState::Connected => {
                let epoch = self.epoch.current();
                let (attempt, waiter) = guard.borrow_mut().allocate(epoch);
                let sink = EventSink::new(Arc::downgrade(self), attempt.id, epoch);
                let superseded = guard.borrow_mut().candidate.replace(attempt);
                if let Some(superseded) = superseded {
                    debug!(
                        target: targets::SUBSCRIPTION,
                        %epoch,
                        "superseding an unfinished refresh"
                    );
                    superseded.retire(Handoff::Superseded);
                }

                debug!(
                    target: targets::SUBSCRIPTION,
                    transport = transport.name(),
                    %epoch,
                    operation = ?self.document.operation_name(),
                    "refreshing subscription"
                );
                transport.open(self.connection_request(), sink);
                Some(waiter)
            }
        }
    }

    pub(crate) fn on_next(&self, id: AttemptId, epoch: Epoch, response: GraphQLResponse) {
        let guard = self.attempts.lock();
        if !self.epoch.is_current(epoch) {
            trace!(target: targets::SUBSCRIPTION, %epoch, "dropping result from a previous epoch");
            return;
        }

        let step = {
            let mut attempts = guard.borrow_mut();
            if attempts.is_live(id) {
                NextStep::Publish(attempts.live.as_mut().and_then(|a| a.ready.take()))
            } else if attempts.is_candidate(id) {
                match attempts.candidate.take() {
                    Some(mut candidate) => {
                        let ready = candidate.ready.take();
                        let previous = attempts.live.replace(candidate);
                        NextStep::Promote(previous, ready)
                    }
                    None => NextStep::Drop,
                }
            } else {
                NextStep::Drop
            }
        };

        let ready = match step {
            NextStep::Drop => {
                trace!(target: targets::SUBSCRIPTION, %epoch, "dropping result from a retired connection");
                return;
            }
            NextStep::Publish(ready) => ready,
            NextStep::Promote(previous, ready) => {
                debug!(
                    target: targets::SUBSCRIPTION,
                    %epoch,
                    "refreshed connection is live; closing the previous one"
                );
                if let Some(previous) = previous {
                    previous.retire(Handoff::Superseded);
                }
                // Cleanup may have closed the session.
                if !guard.borrow().is_live(id) {
                    if let Some(ready) = ready {
                        let _ = ready.send(Handoff::Closed);
                    }
                    return;
                }
                ready
            }
        };

        let last = response.is_final();
        let published = self.cells.accept(response, || guard.borrow().is_live(id));
        if !published {
            // An observer closed or restarted the session while it was
            // publishing; whatever it started stays in place.
            debug!(target: targets::SUBSCRIPTION, %epoch, "connection replaced while publishing");
            if let Some(ready) = ready {
                let outcome = if guard.borrow().live.is_some() {
                    Handoff::Superseded
                } else {
                    Handoff::Closed
                };
                let _ = ready.send(outcome);
            }
            return;
        }
        if let Some(ready) = ready {
            let _ = ready.send(Handoff::Connected);
        }
        if last {
            debug!(target: targets::SUBSCRIPTION, %epoch, "stream delivered its final result");
            self.close();
        }
    }

    pub(crate) fn on_terminal(&self, id: AttemptId, epoch: Epoch, failure: Option<ClientError>) {
        let guard = self.attempts.lock();
        if !self.epoch.is_current(epoch) {
            trace!(
                target: targets::SUBSCRIPTION,
                %epoch,
                error = ?failure,
                "dropping termination from a previous epoch"
            );
            return;
        }

        let step = {
            let mut attempts = guard.borrow_mut();
            if attempts.is_live(id) {
                let live = attempts.live.take();
                match attempts.candidate.take() {
                    Some(candidate) => {
                        attempts.live = Some(candidate);
                        TerminalStep::Promote(live)
                    }
                    None => TerminalStep::Close(live),
                }
            } else if attempts.is_candidate(id) {
                TerminalStep::Abandon(attempts.candidate.take())
            } else {
                TerminalStep::Drop
            }
        };

        match step {
            TerminalStep::Drop => {
                trace!(target: targets::SUBSCRIPTION, %epoch, "dropping termination from a retired connection");
            }
            TerminalStep::Close(live) => {
                match failure {
                    Some(failure) => {
                        error!(target: targets::SUBSCRIPTION, %epoch, error = %failure, "subscription failed");
                        self.cells.fail(failure);
                    }
                    None => {
                        debug!(target: targets::SUBSCRIPTION, %epoch, "server completed the subscription");
                        self.cells.close();
                    }
                }
                if let Some(live) = live {
                    live.retire(Handoff::Closed);
                }
            }
            TerminalStep::Promote(live) => {
                warn!(
                    target: targets::SUBSCRIPTION,
                    %epoch,
                    error = ?failure,
                    "connection ended during refresh; continuing on the refreshed connection"
                );
                if let Some(live) = live {
                    live.retire(Handoff::Closed);
                }
            }
            TerminalStep::Abandon(candidate) => {
                warn!(
                    target: targets::SUBSCRIPTION,
                    %epoch,
                    error = ?failure,
                    "refresh ended before connecting; keeping the current connection"
                );
                if let Some(candidate) = candidate {
                    candidate.retire(Handoff::Closed);
                }
            }
        }
    }

    pub(crate) fn register_hook(&self, id: AttemptId, hook: Hook) {
        let guard = self.attempts.lock();
        let rejected = {
            let mut attempts = guard.borrow_mut();
            match attempts.get_mut(id) {
                Some(attempt) => {
                    attempt.hooks.push_boxed(hook);
                    None
                }
                None => Some(hook),
            }
        };
        if let Some(hook) = rejected {
            trace!(target: targets::SUBSCRIPTION, "connection already retired; running cleanup now");
            hook();
        }
    }

    pub(crate) fn is_attempt_active(&self, id: AttemptId, epoch: Epoch) -> bool {
        let guard = self.attempts.lock();
        let attempts = guard.borrow();
        self.epoch.is_current(epoch) && (attempts.is_live(id) || attempts.is_candidate(id))
    }

    fn close(&self) {
        let guard = self.attempts.lock();
        let attempts = guard.borrow_mut().take_all();
        if !attempts.is_empty() {
            debug!(
                target: targets::SUBSCRIPTION,
                epoch = %self.epoch.current(),
                "closing subscription"
            );
        }
        self.cells.close();
        for attempt in attempts {
            attempt.retire(Handoff::Closed);
        }
    }
}

impl Drop for SessionShared {
    fn drop(&mut self) {
        let attempts = self.attempts.get_mut().get_mut().take_all();
        for attempt in attempts {
            attempt.retire(Handoff::Closed);
        }
    }
}

/// A running subscription: reactive state, data and error cells plus the
/// controls to close, restart or refresh the underlying connection.
///
/// Created by [`SubscriptionDefinition::subscribe`](super::SubscriptionDefinition::subscribe).
/// Handles are cheap to clone; the session closes when the last handle is
/// dropped.
///
/// # Example
///
/// ```ignore
/// let session = countdown.subscribe(json!({"from": 5}), SubscribeOptions::new().immediate(true));
///
/// session.data().subscribe(|data| println!("tick: {data:?}"));
///
/// // Swap to a fresh connection without a visible gap.
/// session.refresh().await;
///
/// session.close();
/// ```
#[derive(Clone)]
pub struct SubscriptionSession {
    shared: Arc<SessionShared>,
}

static_assertions::assert_impl_all!(SubscriptionSession: Send, Sync);
static_assertions::assert_impl_all!(EventSink: Send, Sync);

impl SubscriptionSession {
    pub(crate) fn new(
        document: OperationDocument,
        transport: Option<Arc<dyn SubscriptionTransport>>,
        url: String,
        context: SubscriptionContext,
        variables: Value,
        auto_connect: bool,
    ) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                document,
                transport,
                url,
                context,
                auto_connect,
                variables: RwLock::new(variables),
                epoch: EpochGuard::new(),
                cells: SessionCells::new(),
                attempts: ReentrantMutex::new(RefCell::new(Attempts::default())),
            }),
        }
    }

    /// The lifecycle state cell.
    pub fn state(&self) -> ReadOnlyObservable<SubscriptionState> {
        self.shared.cells.state_cell()
    }

    /// The latest `data` payload.
    pub fn data(&self) -> ReadOnlyObservable<Option<Value>> {
        self.shared.cells.data_cell()
    }

    /// The latest error: GraphQL errors from a result, or a transport failure.
    pub fn error(&self) -> ReadOnlyObservable<Option<SubscriptionError>> {
        self.shared.cells.error_cell()
    }

    /// Deserialize the latest `data` payload.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.shared.cells.data_cell().with(|data| {
            data.as_ref()
                .map(|value| serde_json::from_value(value.clone()).map_err(ClientError::from))
                .transpose()
        })
    }

    /// The subscription document.
    pub fn document(&self) -> &OperationDocument {
        &self.shared.document
    }

    /// The variables sent with the next connection.
    pub fn variables(&self) -> Value {
        self.shared.variables.read().clone()
    }

    /// Replace the variables.
    ///
    /// With auto-connect enabled a change restarts the session; otherwise
    /// the new variables apply to the next restart or refresh.
    pub fn set_variables(&self, variables: Value) {
        let changed = {
            let mut current = self.shared.variables.write();
            if *current == variables {
                false
            } else {
                *current = variables;
                true
            }
        };
        if changed && self.shared.auto_connect {
            self.open();
        }
    }

    /// Start a connection. Equivalent to [`restart`](Self::restart) without
    /// waiting for the outcome.
    pub fn open(&self) {
        let _ = self.shared.begin_restart();
    }

    /// Close the current connection and open a new one.
    ///
    /// The old connection's cleanup runs and data and error are cleared
    /// before the new connection starts; results still in flight from the
    /// old connection are ignored. The reconnect begins when this method is
    /// called, the returned future only reports how it ended.
    pub fn restart(&self) -> impl Future<Output = Handoff> + Send + 'static {
        settle(self.shared.begin_restart())
    }

    /// Replace the connection without a visible interruption.
    ///
    /// While connected, a second connection is opened in the background and
    /// the current one keeps publishing until the new one delivers its first
    /// result; then the old connection is closed. A closed session restarts
    /// instead. A pending session is left alone and the future resolves to
    /// [`Handoff::Skipped`].
    pub fn refresh(&self) -> impl Future<Output = Handoff> + Send + 'static {
        settle(self.shared.begin_refresh())
    }

    /// Close the session. Idempotent.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Alias for [`close`](Self::close).
    pub fn unsubscribe(&self) {
        self.close();
    }
}

fn settle(
    waiter: Option<oneshot::Receiver<Handoff>>,
) -> impl Future<Output = Handoff> + Send + 'static {
    async move {
        match waiter {
            Some(waiter) => waiter.await.unwrap_or(Handoff::Closed),
            None => Handoff::Skipped,
        }
    }
}

impl fmt::Debug for SubscriptionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionSession")
            .field("document", &self.shared.document)
            .field("state", &self.shared.cells.state())
            .field("epoch", &self.shared.epoch.current())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::OperationDocument;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        sinks: Mutex<Vec<EventSink>>,
    }

    impl SubscriptionTransport for Recorder {
        fn open(&self, _request: ConnectionRequest, sink: EventSink) {
            self.sinks.lock().push(sink);
        }
    }

    fn session(transport: Arc<Recorder>) -> SubscriptionSession {
        SubscriptionSession::new(
            OperationDocument::parse("subscription { tick }").unwrap(),
            Some(transport),
            "http://localhost/graphql".into(),
            SubscriptionContext::default(),
            Value::Null,
            false,
        )
    }

    fn tick(n: i64) -> GraphQLResponse {
        GraphQLResponse {
            data: Some(json!({ "tick": n })),
            ..Default::default()
        }
    }

    #[test]
    fn test_initial_state_is_pending() {
        let session = session(Arc::default());
        assert_eq!(session.state().get(), SubscriptionState::Pending);
        assert_eq!(session.data().get(), None);
    }

    #[test]
    fn test_first_result_connects() {
        let transport = Arc::new(Recorder::default());
        let session = session(transport.clone());
        session.open();

        let sink = transport.sinks.lock()[0].clone();
        assert!(sink.is_active());
        sink.next(tick(1));

        assert_eq!(session.state().get(), SubscriptionState::Connected);
        assert_eq!(session.data().get(), Some(json!({"tick": 1})));
    }

    #[test]
    fn test_final_result_closes() {
        let transport = Arc::new(Recorder::default());
        let session = session(transport.clone());
        session.open();

        let sink = transport.sinks.lock()[0].clone();
        sink.next(GraphQLResponse {
            has_next: Some(false),
            ..tick(0)
        });

        assert_eq!(session.state().get(), SubscriptionState::Closed);
        assert_eq!(session.data().get(), Some(json!({"tick": 0})));
        assert!(!sink.is_active());
    }

    #[test]
    fn test_hook_after_close_runs_immediately() {
        let transport = Arc::new(Recorder::default());
        let session = session(transport.clone());
        session.open();
        session.close();

        let ran = Arc::new(Mutex::new(false));
        let flag = ran.clone();
        transport.sinks.lock()[0].on_unsubscribe(move || *flag.lock() = true);
        assert!(*ran.lock());
    }

    #[test]
    fn test_drop_runs_hooks() {
        let transport = Arc::new(Recorder::default());
        let ran = Arc::new(Mutex::new(0));
        {
            let session = session(transport.clone());
            session.open();
            let counter = ran.clone();
            transport.sinks.lock()[0].on_unsubscribe(move || *counter.lock() += 1);
        }
        assert_eq!(*ran.lock(), 1);
        assert!(!transport.sinks.lock()[0].is_active());
    }

    #[test]
    fn test_data_as() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Tick {
            tick: i64,
        }

        let transport = Arc::new(Recorder::default());
        let session = session(transport.clone());
        assert_eq!(session.data_as::<Tick>().unwrap(), None);

        session.open();
        transport.sinks.lock()[0].next(tick(7));
        assert_eq!(session.data_as::<Tick>().unwrap(), Some(Tick { tick: 7 }));
    }
}
