//! GraphQL subscriptions over WebSocket.
//!
//! Implements the graphql-transport-ws protocol (graphql-ws).
//! See: https://github.com/enisdenjo/graphql-ws/blob/master/PROTOCOL.md
//!
//! Each connection attempt owns its socket and carries exactly one
//! operation, so retiring an attempt is just closing its socket.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use http::header::{HeaderName, HeaderValue, SEC_WEBSOCKET_PROTOCOL};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::{Instant, Interval};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use super::{ConnectionRequest, SubscriptionTransport};
use crate::config::WsOptions;
use crate::error::{ClientError, Result};
use crate::request::GraphQLRequest;
use crate::response::{GraphQLError, GraphQLResponse, join_messages};
use crate::subscription::EventSink;
use crate::targets;

const PROTOCOL: &str = "graphql-transport-ws";

/// The single operation carried by each socket.
const OPERATION_ID: &str = "1";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

/// WebSocket message types for graphql-transport-ws protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsMessage {
    /// Client -> Server: Initialize connection
    ConnectionInit {
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Server -> Client: Connection acknowledged
    ConnectionAck {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Bidirectional: Ping
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Bidirectional: Pong
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Client -> Server: Subscribe to operation
    Subscribe { id: String, payload: GraphQLRequest },
    /// Server -> Client: Operation result
    Next { id: String, payload: GraphQLResponse },
    /// Server -> Client: Operation error
    Error {
        id: String,
        payload: Vec<GraphQLError>,
    },
    /// Bidirectional: Operation complete
    Complete { id: String },
}

impl WsMessage {
    fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionInit { .. } => "connection_init",
            Self::ConnectionAck { .. } => "connection_ack",
            Self::Ping { .. } => "ping",
            Self::Pong { .. } => "pong",
            Self::Subscribe { .. } => "subscribe",
            Self::Next { .. } => "next",
            Self::Error { .. } => "error",
            Self::Complete { .. } => "complete",
        }
    }
}

/// How a socket stopped.
enum Ending {
    /// The server completed the operation or closed the socket normally.
    Completed,
    /// The session unsubscribed.
    Cancelled,
}

/// Subscription transport speaking graphql-transport-ws.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport {
    options: WsOptions,
}

impl WebSocketTransport {
    /// Create a transport with the given dial options.
    pub fn new(options: WsOptions) -> Self {
        Self { options }
    }

    /// The dial options.
    pub fn options(&self) -> &WsOptions {
        &self.options
    }
}

impl SubscriptionTransport for WebSocketTransport {
    fn name(&self) -> &'static str {
        "ws"
    }

    fn open(&self, request: ConnectionRequest, sink: EventSink) {
        let (cancel, cancelled) = oneshot::channel();
        sink.on_unsubscribe(move || {
            let _ = cancel.send(());
        });
        let task = run(self.options.clone(), request, sink.clone(), cancelled);
        super::spawn_connection(&sink, task);
    }
}

async fn run(
    options: WsOptions,
    request: ConnectionRequest,
    sink: EventSink,
    mut cancelled: oneshot::Receiver<()>,
) {
    let epoch = sink.epoch();
    let connected = tokio::select! {
        connected = connect(&options, &request) => connected,
        _ = &mut cancelled => {
            debug!(target: targets::TRANSPORT_WS, %epoch, "unsubscribed while connecting");
            return;
        }
    };

    let (mut write, mut read) = match connected {
        Ok(halves) => halves,
        Err(err) => {
            debug!(target: targets::TRANSPORT_WS, %epoch, error = %err, "connection failed");
            sink.error(err);
            return;
        }
    };

    let ending = pump(&options, &request, &sink, &mut write, &mut read, &mut cancelled).await;
    let _ = write.close().await;

    match ending {
        Ok(Ending::Completed) => {
            debug!(target: targets::TRANSPORT_WS, %epoch, "operation completed");
            sink.complete();
        }
        Ok(Ending::Cancelled) => {
            debug!(target: targets::TRANSPORT_WS, %epoch, "socket closed by unsubscribe");
        }
        Err(err) => sink.error(err),
    }
}

/// Open the socket and complete the `connection_init`/`connection_ack`
/// exchange within the connection timeout.
async fn connect(options: &WsOptions, request: &ConnectionRequest) -> Result<(WsWrite, WsRead)> {
    let mut handshake = request.url.as_str().into_client_request()?;
    let headers = handshake.headers_mut();
    headers.insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(PROTOCOL));
    for (name, value) in options.headers.iter().chain(&request.context.headers) {
        headers.insert(
            HeaderName::try_from(name.as_str())?,
            HeaderValue::try_from(value.as_str())?,
        );
    }

    let init = WsMessage::ConnectionInit {
        payload: request
            .context
            .init_payload
            .clone()
            .or_else(|| options.connection_init_payload.clone()),
    };

    let url = request.url.clone();
    with_timeout(options.connection_timeout, async move {
        let (stream, _) = tokio_tungstenite::connect_async(handshake).await?;
        let (mut write, mut read) = stream.split();
        send(&mut write, &init).await?;

        loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<WsMessage>(&text)? {
                    WsMessage::ConnectionAck { .. } => break,
                    WsMessage::Ping { payload } => {
                        send(&mut write, &WsMessage::Pong { payload }).await?
                    }
                    other => {
                        return Err(ClientError::Protocol(format!(
                            "expected connection_ack, received {}",
                            other.kind()
                        )));
                    }
                },
                Some(Ok(Message::Close(frame))) => return Err(closed(frame)),
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err.into()),
                None => {
                    return Err(ClientError::Connection(
                        "socket closed before connection_ack".into(),
                    ));
                }
            }
        }

        debug!(target: targets::TRANSPORT_WS, url = %url, "connection acknowledged");
        Ok::<_, ClientError>((write, read))
    })
    .await
}

async fn with_timeout<T>(
    limit: Duration,
    future: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| ClientError::Timeout)?
}

/// Subscribe and forward events until the operation ends.
async fn pump(
    options: &WsOptions,
    request: &ConnectionRequest,
    sink: &EventSink,
    write: &mut WsWrite,
    read: &mut WsRead,
    cancelled: &mut oneshot::Receiver<()>,
) -> Result<Ending> {
    let subscribe = WsMessage::Subscribe {
        id: OPERATION_ID.into(),
        payload: request.to_graphql_request(),
    };
    send(write, &subscribe).await?;

    let mut keep_alive = options
        .keep_alive_interval
        .map(|period| tokio::time::interval_at(Instant::now() + period, period));

    loop {
        tokio::select! {
            _ = &mut *cancelled => {
                let _ = send(write, &WsMessage::Complete { id: OPERATION_ID.into() }).await;
                return Ok(Ending::Cancelled);
            }
            _ = tick(&mut keep_alive) => {
                send(write, &WsMessage::Ping { payload: None }).await?;
            }
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<WsMessage>(&text)? {
                    WsMessage::Next { id, payload } if id == OPERATION_ID => sink.next(payload),
                    WsMessage::Error { id, payload } if id == OPERATION_ID => {
                        return Err(ClientError::GraphQL(join_messages(&payload)));
                    }
                    WsMessage::Complete { id } if id == OPERATION_ID => return Ok(Ending::Completed),
                    WsMessage::Ping { payload } => send(write, &WsMessage::Pong { payload }).await?,
                    other => {
                        trace!(target: targets::TRANSPORT_WS, kind = other.kind(), "ignoring message");
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    return match frame {
                        Some(frame) if frame.code != CloseCode::Normal => Err(closed(Some(frame))),
                        _ => Ok(Ending::Completed),
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err.into()),
                None => return Ok(Ending::Completed),
            }
        }
    }
}

async fn tick(keep_alive: &mut Option<Interval>) {
    match keep_alive {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn send(write: &mut WsWrite, message: &WsMessage) -> Result<()> {
    let json = serde_json::to_string(message)?;
    write.send(Message::Text(json.into())).await?;
    Ok(())
}

fn closed(frame: Option<CloseFrame>) -> ClientError {
    match frame {
        Some(frame) => {
            let reason: &str = &frame.reason;
            ClientError::WebSocket(format!(
                "socket closed with code {}: {reason}",
                u16::from(frame.code)
            ))
        }
        None => ClientError::WebSocket("socket closed".into()),
    }
}
