//! Session lifecycle: restart, refresh, close, and document validation.

mod common;

use std::sync::Arc;

use common::{ScriptedTransport, client_with, record, tick};
use horizon_graphql::{
    ClientError, DocumentError, ExecutionContext, GraphQLClient, GraphQLResponse, Handoff,
    OperationDocument, OperationKind, SubscribeOptions, SubscriptionContext, SubscriptionError,
    SubscriptionState,
};
use parking_lot::Mutex;
use serde_json::{Value, json};

fn ticks() -> OperationDocument {
    OperationDocument::parse("subscription Ticks($room: String) { tick(room: $room) }").unwrap()
}

fn immediate() -> SubscribeOptions {
    SubscribeOptions::new().immediate(true)
}

#[test]
fn test_query_document_rejected_before_connecting() {
    let transport = ScriptedTransport::new();
    let client = client_with(transport.clone());

    let err = client
        .define_subscription(
            OperationDocument::parse("query { users { id } }").unwrap(),
            SubscriptionContext::new(),
        )
        .unwrap_err();

    assert_eq!(
        err,
        ClientError::Document(DocumentError::WrongKind {
            expected: OperationKind::Subscription,
            actual: OperationKind::Query,
        })
    );
    assert_eq!(transport.opened(), 0);
}

#[test]
fn test_not_immediate_stays_pending() {
    let transport = ScriptedTransport::new();
    let client = client_with(transport.clone());
    let definition = client
        .define_subscription(ticks(), SubscriptionContext::new())
        .unwrap();

    let session = definition.subscribe(Value::Null, SubscribeOptions::new());
    assert_eq!(session.state().get(), SubscriptionState::Pending);
    assert_eq!(transport.opened(), 0);

    session.open();
    assert_eq!(transport.opened(), 1);
}

#[tokio::test]
async fn test_restart_drops_events_from_previous_connection() {
    let transport = ScriptedTransport::new();
    let client = client_with(transport.clone());
    let session = client
        .define_subscription(ticks(), SubscriptionContext::new())
        .unwrap()
        .subscribe(json!({"room": "a"}), immediate());

    let slow = transport.connection(0);
    slow.next(tick(1));
    assert_eq!(session.state().get(), SubscriptionState::Connected);

    let restarted = session.restart();
    assert_eq!(transport.opened(), 2);
    assert_eq!(slow.cleanups(), 1);
    assert_eq!(session.state().get(), SubscriptionState::Pending);
    assert_eq!(session.data().get(), None);

    // The old connection keeps talking after the restart.
    slow.next(tick(99));
    slow.sink.error(ClientError::Timeout);
    slow.sink.complete();
    assert_eq!(session.state().get(), SubscriptionState::Pending);
    assert_eq!(session.data().get(), None);
    assert_eq!(session.error().get(), None);

    let fresh = transport.connection(1);
    assert!(fresh.sink.epoch() > slow.sink.epoch());
    fresh.next(tick(2));

    assert_eq!(restarted.await, Handoff::Connected);
    assert_eq!(session.state().get(), SubscriptionState::Connected);
    assert_eq!(session.data().get(), Some(tick(2)));
    assert_eq!(slow.cleanups(), 1);
}

#[tokio::test]
async fn test_refresh_is_seamless() {
    let transport = ScriptedTransport::new();
    let client = client_with(transport.clone());
    let session = client
        .define_subscription(ticks(), SubscriptionContext::new())
        .unwrap()
        .subscribe(Value::Null, immediate());

    let old = transport.connection(0);
    old.next(tick(1));

    let states = record(&session.state());
    let data = record(&session.data());

    let refreshed = session.refresh();
    assert_eq!(transport.opened(), 2);
    let new = transport.connection(1);
    assert_eq!(new.sink.epoch(), old.sink.epoch());

    // Both connections are up; the old one is still the live one.
    old.next(tick(2));
    assert_eq!(old.cleanups(), 0);

    new.next(tick(3));
    assert_eq!(refreshed.await, Handoff::Connected);
    assert_eq!(old.cleanups(), 1);
    assert_eq!(new.cleanups(), 0);

    // Retired connection is ignored from now on.
    old.next(tick(4));
    old.sink.complete();

    assert!(states.lock().is_empty());
    assert_eq!(*data.lock(), vec![Some(tick(2)), Some(tick(3))]);
    assert_eq!(session.state().get(), SubscriptionState::Connected);
    assert_eq!(session.data().get(), Some(tick(3)));
}

#[tokio::test]
async fn test_refresh_twice_keeps_only_the_latest_connection() {
    let transport = ScriptedTransport::new();
    let client = client_with(transport.clone());
    let session = client
        .define_subscription(ticks(), SubscriptionContext::new())
        .unwrap()
        .subscribe(Value::Null, immediate());

    let original = transport.connection(0);
    original.next(tick(1));

    let first = session.refresh();
    let second = session.refresh();
    assert_eq!(transport.opened(), 3);

    let superseded = transport.connection(1);
    let latest = transport.connection(2);

    assert_eq!(first.await, Handoff::Superseded);
    assert_eq!(superseded.cleanups(), 1);
    assert_eq!(original.cleanups(), 0);

    superseded.next(tick(50));
    assert_eq!(session.data().get(), Some(tick(1)));

    latest.next(tick(2));
    assert_eq!(second.await, Handoff::Connected);

    assert_eq!(original.cleanups() + superseded.cleanups(), 2);
    assert_eq!(latest.cleanups(), 0);
    assert_eq!(session.data().get(), Some(tick(2)));

    session.close();
    assert_eq!(latest.cleanups(), 1);
    assert_eq!(original.cleanups(), 1);
    assert_eq!(superseded.cleanups(), 1);
}

#[tokio::test]
async fn test_refresh_on_pending_is_skipped() {
    let transport = ScriptedTransport::new();
    let client = client_with(transport.clone());
    let session = client
        .define_subscription(ticks(), SubscriptionContext::new())
        .unwrap()
        .subscribe(Value::Null, immediate());

    assert_eq!(session.refresh().await, Handoff::Skipped);
    assert_eq!(transport.opened(), 1);
}

#[tokio::test]
async fn test_refresh_on_closed_restarts() {
    let transport = ScriptedTransport::new();
    let client = client_with(transport.clone());
    let session = client
        .define_subscription(ticks(), SubscriptionContext::new())
        .unwrap()
        .subscribe(Value::Null, immediate());

    transport.connection(0).next(tick(1));
    session.close();
    assert_eq!(session.state().get(), SubscriptionState::Closed);

    let refreshed = session.refresh();
    assert_eq!(transport.opened(), 2);
    assert_eq!(session.state().get(), SubscriptionState::Pending);
    assert_eq!(session.data().get(), None);

    transport.connection(1).next(tick(2));
    assert_eq!(refreshed.await, Handoff::Connected);
}

#[tokio::test]
async fn test_candidate_failure_keeps_current_connection() {
    let transport = ScriptedTransport::new();
    let client = client_with(transport.clone());
    let session = client
        .define_subscription(ticks(), SubscriptionContext::new())
        .unwrap()
        .subscribe(Value::Null, immediate());

    let current = transport.connection(0);
    current.next(tick(1));

    let refreshed = session.refresh();
    let candidate = transport.connection(1);
    candidate.sink.error(ClientError::Connection("refused".into()));

    assert_eq!(refreshed.await, Handoff::Closed);
    assert_eq!(candidate.cleanups(), 1);
    assert_eq!(current.cleanups(), 0);
    assert_eq!(session.state().get(), SubscriptionState::Connected);
    assert_eq!(session.error().get(), None);

    current.next(tick(2));
    assert_eq!(session.data().get(), Some(tick(2)));
}

#[tokio::test]
async fn test_live_ending_during_refresh_promotes_candidate() {
    let transport = ScriptedTransport::new();
    let client = client_with(transport.clone());
    let session = client
        .define_subscription(ticks(), SubscriptionContext::new())
        .unwrap()
        .subscribe(Value::Null, immediate());

    let current = transport.connection(0);
    current.next(tick(1));

    let refreshed = session.refresh();
    let candidate = transport.connection(1);
    current.sink.complete();

    assert_eq!(current.cleanups(), 1);
    assert_eq!(session.state().get(), SubscriptionState::Connected);

    candidate.next(tick(2));
    assert_eq!(refreshed.await, Handoff::Connected);
    assert_eq!(session.data().get(), Some(tick(2)));
}

#[test]
fn test_close_runs_hooks_once_in_order() {
    let transport = ScriptedTransport::new();
    let client = client_with(transport.clone());
    let session = client
        .define_subscription(ticks(), SubscriptionContext::new())
        .unwrap()
        .subscribe(Value::Null, immediate());

    let connection = transport.connection(0);
    let order = Arc::new(Mutex::new(Vec::new()));
    for name in ["socket", "timer", "listener"] {
        let order = order.clone();
        connection.sink.on_unsubscribe(move || order.lock().push(name));
    }
    connection.next(tick(1));

    session.close();
    session.unsubscribe();
    session.close();

    assert_eq!(connection.cleanups(), 1);
    assert_eq!(*order.lock(), vec!["socket", "timer", "listener"]);
    assert_eq!(session.state().get(), SubscriptionState::Closed);

    connection.next(tick(2));
    connection.sink.error(ClientError::Timeout);
    assert_eq!(session.data().get(), Some(tick(1)));
    assert_eq!(session.error().get(), None);
    assert_eq!(session.state().get(), SubscriptionState::Closed);
}

#[test]
fn test_transport_error_closes_session() {
    let transport = ScriptedTransport::new();
    let client = client_with(transport.clone());
    let session = client
        .define_subscription(ticks(), SubscriptionContext::new())
        .unwrap()
        .subscribe(Value::Null, immediate());

    let connection = transport.connection(0);
    connection.next(tick(1));
    connection.sink.error(ClientError::WebSocket("reset".into()));

    assert_eq!(session.state().get(), SubscriptionState::Closed);
    assert_eq!(
        session.error().get(),
        Some(SubscriptionError::Transport(ClientError::WebSocket(
            "reset".into()
        )))
    );
    assert_eq!(connection.cleanups(), 1);
    assert!(!connection.sink.is_active());
}

#[test]
fn test_final_result_closes_session() {
    let transport = ScriptedTransport::new();
    let client = client_with(transport.clone());
    let session = client
        .define_subscription(ticks(), SubscriptionContext::new())
        .unwrap()
        .subscribe(Value::Null, immediate());

    let connection = transport.connection(0);
    connection.sink.next(GraphQLResponse {
        data: Some(tick(0)),
        has_next: Some(false),
        ..Default::default()
    });

    assert_eq!(session.state().get(), SubscriptionState::Closed);
    assert_eq!(session.data().get(), Some(tick(0)));
    assert_eq!(connection.cleanups(), 1);
}

#[test]
fn test_auto_connect_restarts_on_variable_change() {
    let transport = ScriptedTransport::new();
    let client = client_with(transport.clone());
    let definition = client
        .define_subscription(ticks(), SubscriptionContext::new())
        .unwrap();

    let session = definition.subscribe(
        json!({"room": "a"}),
        SubscribeOptions::new().immediate(true).auto_connect(true),
    );
    assert_eq!(transport.connection(0).request.variables, json!({"room": "a"}));

    session.set_variables(json!({"room": "a"}));
    assert_eq!(transport.opened(), 1);

    session.set_variables(json!({"room": "b"}));
    assert_eq!(transport.opened(), 2);
    assert_eq!(transport.connection(0).cleanups(), 1);
    assert_eq!(transport.connection(1).request.variables, json!({"room": "b"}));

    let manual = definition.subscribe(json!({"room": "a"}), immediate());
    manual.set_variables(json!({"room": "c"}));
    assert_eq!(transport.opened(), 3);
    assert_eq!(manual.variables(), json!({"room": "c"}));
}

#[test]
fn test_context_rewrite_reaches_transport() {
    let transport = ScriptedTransport::new();
    let client = client_with(transport.clone());
    let definition = client
        .define_subscription(
            ticks(),
            SubscriptionContext::new()
                .header("X-Client", "tests")
                .init_payload(json!({"token": "a"})),
        )
        .unwrap();

    definition.subscribe(
        Value::Null,
        immediate().context(SubscriptionContext::new().init_payload(json!({"token": "b"}))),
    );

    let request = transport.connection(0).request;
    assert_eq!(request.context.headers["X-Client"], "tests");
    assert_eq!(request.context.init_payload, Some(json!({"token": "b"})));
    assert_eq!(request.url, "http://localhost:4000/graphql");
    assert_eq!(request.document.operation_name(), Some("Ticks"));
}

#[tokio::test]
async fn test_server_context_never_connects() {
    let transport = ScriptedTransport::new();
    let client = GraphQLClient::builder("http://localhost:4000/graphql")
        .execution_context(ExecutionContext::Server)
        .subscription_transport(transport.clone())
        .build()
        .unwrap();

    let definition = client
        .define_subscription(ticks(), SubscriptionContext::new())
        .unwrap();
    let session = definition.subscribe(Value::Null, immediate());

    assert_eq!(session.restart().await, Handoff::Skipped);
    assert_eq!(session.refresh().await, Handoff::Skipped);
    assert_eq!(transport.opened(), 0);
    assert_eq!(session.state().get(), SubscriptionState::Pending);
}

#[tokio::test]
async fn test_close_resolves_pending_restart() {
    let transport = ScriptedTransport::new();
    let client = client_with(transport.clone());
    let session = client
        .define_subscription(ticks(), SubscriptionContext::new())
        .unwrap()
        .subscribe(Value::Null, SubscribeOptions::new());

    let restarted = session.restart();
    session.close();
    assert_eq!(restarted.await, Handoff::Closed);
}

#[tokio::test]
async fn test_subscribe_connected_waits_for_first_result() {
    let transport = ScriptedTransport::new();
    let client = client_with(transport.clone());
    let definition = client
        .define_subscription(ticks(), SubscriptionContext::new())
        .unwrap();

    let driver = {
        let transport = transport.clone();
        tokio::spawn(async move {
            while transport.opened() == 0 {
                tokio::task::yield_now().await;
            }
            transport.connection(0).next(tick(1));
        })
    };

    let session = definition
        .subscribe_connected(Value::Null, SubscribeOptions::new())
        .await;
    driver.await.unwrap();

    assert_eq!(transport.opened(), 1);
    assert_eq!(session.state().get(), SubscriptionState::Connected);
    assert_eq!(session.data().get(), Some(tick(1)));
}

#[test]
fn test_observer_restart_on_final_result_survives() {
    let transport = ScriptedTransport::new();
    let client = client_with(transport.clone());
    let session = client
        .define_subscription(ticks(), SubscriptionContext::new())
        .unwrap()
        .subscribe(
            json!({"room": "a"}),
            SubscribeOptions::new().immediate(true).auto_connect(true),
        );

    // Switch rooms as soon as the last tick of room "a" arrives.
    let handle = Arc::new(Mutex::new(Some(session.clone())));
    session.data().subscribe(move |data: &Option<Value>| {
        if *data == Some(tick(0)) {
            let session = handle.lock().take();
            if let Some(session) = session {
                session.set_variables(json!({"room": "b"}));
            }
        }
    });

    transport.connection(0).sink.next(GraphQLResponse {
        data: Some(tick(0)),
        has_next: Some(false),
        ..Default::default()
    });

    assert_eq!(transport.opened(), 2);
    assert_eq!(transport.connection(0).cleanups(), 1);

    let switched = transport.connection(1);
    assert_eq!(switched.request.variables, json!({"room": "b"}));
    assert_eq!(switched.cleanups(), 0);
    assert!(switched.sink.is_active());
    assert_eq!(session.state().get(), SubscriptionState::Pending);

    switched.next(tick(9));
    assert_eq!(session.state().get(), SubscriptionState::Connected);
    assert_eq!(session.data().get(), Some(tick(9)));
}

#[tokio::test]
async fn test_observer_close_during_first_result_stays_closed() {
    let transport = ScriptedTransport::new();
    let client = client_with(transport.clone());
    let session = client
        .define_subscription(ticks(), SubscriptionContext::new())
        .unwrap()
        .subscribe(Value::Null, SubscribeOptions::new());

    let handle = Arc::new(Mutex::new(Some(session.clone())));
    session.data().subscribe(move |data: &Option<Value>| {
        if data.is_some() {
            let session = handle.lock().take();
            if let Some(session) = session {
                session.close();
            }
        }
    });

    let restarted = session.restart();
    let connection = transport.connection(0);
    connection.next(tick(1));

    assert_eq!(restarted.await, Handoff::Closed);
    assert_eq!(session.state().get(), SubscriptionState::Closed);
    assert_eq!(connection.cleanups(), 1);
    assert!(!connection.sink.is_active());

    connection.next(tick(2));
    assert_eq!(session.state().get(), SubscriptionState::Closed);
    assert_eq!(session.data().get(), Some(tick(1)));
}
