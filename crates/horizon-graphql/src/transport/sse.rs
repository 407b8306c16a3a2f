//! GraphQL subscriptions over Server-Sent Events.
//!
//! The operation is encoded into the URL (`query`, `variables`,
//! `operationName`) and requested with `Accept: text/event-stream`. The
//! server answers with `next` events carrying execution results and a
//! `complete` event when the stream ends.

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tokio::sync::oneshot;
use tracing::{debug, trace};
use url::Url;

use super::{ConnectionRequest, SubscriptionTransport};
use crate::config::SseOptions;
use crate::error::{ClientError, Result};
use crate::response::GraphQLResponse;
use crate::subscription::EventSink;
use crate::targets;

/// Subscription transport over Server-Sent Events.
#[derive(Debug, Clone)]
pub struct SseTransport {
    client: reqwest::Client,
    options: SseOptions,
}

impl SseTransport {
    /// Create a transport with the given options.
    pub fn new(options: SseOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(options.connection_timeout)
            .build()?;
        Ok(Self { client, options })
    }

    /// The transport options.
    pub fn options(&self) -> &SseOptions {
        &self.options
    }
}

impl SubscriptionTransport for SseTransport {
    fn name(&self) -> &'static str {
        "sse"
    }

    fn open(&self, request: ConnectionRequest, sink: EventSink) {
        let (cancel, cancelled) = oneshot::channel::<()>();
        sink.on_unsubscribe(move || {
            let _ = cancel.send(());
        });

        let client = self.client.clone();
        let options = self.options.clone();
        let events = sink.clone();
        super::spawn_connection(&sink, async move {
            let epoch = events.epoch();
            tokio::select! {
                result = stream(&client, &options, &request, &events) => match result {
                    Ok(()) => {
                        debug!(target: targets::TRANSPORT_SSE, %epoch, "event stream completed");
                        events.complete();
                    }
                    Err(err) => {
                        debug!(target: targets::TRANSPORT_SSE, %epoch, error = %err, "event stream failed");
                        events.error(err);
                    }
                },
                _ = cancelled => {
                    debug!(target: targets::TRANSPORT_SSE, %epoch, "event stream closed by unsubscribe");
                }
            }
        });
    }
}

/// The event stream URL for `request`.
fn stream_url(request: &ConnectionRequest) -> Result<Url> {
    let mut url = Url::parse(&request.url)?;
    url.query_pairs_mut()
        .extend_pairs(request.to_graphql_request().to_query_pairs());
    Ok(url)
}

async fn stream(
    client: &reqwest::Client,
    options: &SseOptions,
    request: &ConnectionRequest,
    sink: &EventSink,
) -> Result<()> {
    let url = stream_url(request)?;
    let mut builder = client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache");
    for (name, value) in options.headers.iter().chain(&request.context.headers) {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let response = tokio::time::timeout(options.connection_timeout, builder.send())
        .await
        .map_err(|_| ClientError::Timeout)??;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.ok().filter(|body| !body.is_empty());
        return Err(ClientError::HttpStatus {
            status: status.as_u16(),
            message,
        });
    }

    let mut events = std::pin::pin!(response.bytes_stream().eventsource());
    while let Some(event) = events.next().await {
        let event = event.map_err(|e| ClientError::EventStream(e.to_string()))?;
        match event.event.as_str() {
            "next" => {
                let payload: GraphQLResponse = serde_json::from_str(&event.data)?;
                sink.next(payload);
            }
            "complete" => return Ok(()),
            "error" => {
                return Err(ClientError::EventStream(if event.data.is_empty() {
                    "server reported an error".into()
                } else {
                    event.data
                }));
            }
            other => {
                trace!(target: targets::TRANSPORT_SSE, event = other, "ignoring event");
            }
        }
    }

    Ok(())
}
