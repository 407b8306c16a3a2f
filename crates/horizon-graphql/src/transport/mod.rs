//! Subscription transports.
//!
//! A transport turns a [`ConnectionRequest`] into a stream of events on an
//! [`EventSink`]. Two transports are built in:
//!
//! - [`WebSocketTransport`]: the `graphql-transport-ws` protocol, one socket
//!   per connection.
//! - [`SseTransport`]: Server-Sent Events over a GET request.
//!
//! Custom transports implement [`SubscriptionTransport`] and are installed
//! with [`GraphQLClientBuilder::subscription_transport`](crate::GraphQLClientBuilder::subscription_transport).

mod sse;
mod ws;

pub use sse::SseTransport;
pub use ws::WebSocketTransport;

use std::sync::Arc;

use serde_json::Value;

use crate::config::{ClientConfig, HandlerKind};
use crate::context::SubscriptionContext;
use crate::document::OperationDocument;
use crate::error::Result;
use crate::request::GraphQLRequest;
use crate::subscription::EventSink;

/// Everything a transport needs to open one connection.
#[derive(Debug, Clone)]
pub struct ConnectionRequest {
    /// The subscription document.
    pub document: OperationDocument,
    /// Variables for this connection.
    pub variables: Value,
    /// Subscription endpoint.
    pub url: String,
    /// Merged subscription context.
    pub context: SubscriptionContext,
}

impl ConnectionRequest {
    /// The GraphQL request sent on the wire.
    pub fn to_graphql_request(&self) -> GraphQLRequest {
        GraphQLRequest::new(&self.document).variables(self.variables.clone())
    }
}

/// Opens subscription connections.
///
/// `open` must not block: it starts the connection (typically on a spawned
/// task) and returns. The transport then reports through the sink:
///
/// - [`EventSink::next`] for every result,
/// - [`EventSink::error`] on failure,
/// - [`EventSink::complete`] when the server ends the stream,
///
/// and registers cleanup with [`EventSink::on_unsubscribe`] that tears the
/// connection down. After `error` or `complete` no further events should be
/// sent; if they are, the session ignores them.
pub trait SubscriptionTransport: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str {
        "custom"
    }

    /// Open a connection for `request`, reporting to `sink`.
    fn open(&self, request: ConnectionRequest, sink: EventSink);
}

/// Build the transport selected by `config`.
pub(crate) fn from_config(config: &ClientConfig) -> Result<Arc<dyn SubscriptionTransport>> {
    Ok(match config.subscription.handler {
        HandlerKind::Ws => Arc::new(WebSocketTransport::new(config.subscription.ws.clone())),
        HandlerKind::Sse => Arc::new(SseTransport::new(config.subscription.sse.clone())?),
    })
}

/// Spawn `task` on the current tokio runtime, or report through `sink`
/// that there is none.
fn spawn_connection<F>(sink: &EventSink, task: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(task);
        }
        Err(_) => sink.error(crate::error::ClientError::Connection(
            "no tokio runtime available to drive the subscription".into(),
        )),
    }
}
