//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use horizon_graphql::{
    ConnectionRequest, EventSink, GraphQLClient, GraphQLResponse, ReadOnlyObservable,
    SubscriptionTransport,
};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// One connection opened through [`ScriptedTransport`].
#[derive(Clone)]
pub struct Connection {
    pub request: ConnectionRequest,
    pub sink: EventSink,
    pub cleaned: Arc<Mutex<usize>>,
}

impl Connection {
    pub fn next(&self, data: Value) {
        self.sink.next(GraphQLResponse {
            data: Some(data),
            ..Default::default()
        });
    }

    pub fn cleanups(&self) -> usize {
        *self.cleaned.lock()
    }
}

/// A transport that records every connection and lets the test drive it.
#[derive(Default)]
pub struct ScriptedTransport {
    connections: Mutex<Vec<Connection>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn opened(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn connection(&self, index: usize) -> Connection {
        self.connections.lock()[index].clone()
    }
}

impl SubscriptionTransport for ScriptedTransport {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn open(&self, request: ConnectionRequest, sink: EventSink) {
        let cleaned = Arc::new(Mutex::new(0));
        let counter = cleaned.clone();
        sink.on_unsubscribe(move || *counter.lock() += 1);
        self.connections.lock().push(Connection {
            request,
            sink,
            cleaned,
        });
    }
}

pub fn client_with(transport: Arc<ScriptedTransport>) -> GraphQLClient {
    GraphQLClient::builder("http://localhost:4000/graphql")
        .subscription_transport(transport)
        .build()
        .unwrap()
}

pub fn tick(n: i64) -> Value {
    json!({ "tick": n })
}

/// Record every value a cell publishes.
pub fn record<T>(cell: &ReadOnlyObservable<T>) -> Arc<Mutex<Vec<T>>>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    cell.subscribe(move |value: &T| sink.lock().push(value.clone()));
    seen
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
