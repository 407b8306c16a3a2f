//! GraphQL client for Horizon.
//!
//! This crate provides:
//!
//! - **Queries and mutations** over HTTP (POST or GET), with documents
//!   classified up front so a query is never sent as a mutation.
//! - **Subscriptions** over WebSocket (graphql-transport-ws) or Server-Sent
//!   Events, exposed as reactive sessions that can be closed, restarted, or
//!   refreshed onto a new connection without an interruption.
//!
//! # Queries
//!
//! ```ignore
//! use horizon_graphql::{GraphQLClient, OperationDocument};
//! use serde_json::{json, Value};
//!
//! let client = GraphQLClient::builder("https://api.example.com/graphql").build()?;
//!
//! let get_user: OperationDocument = "query GetUser($id: ID!) { user(id: $id) { name } }".parse()?;
//! let user: Value = client.query(&get_user, json!({"id": "1"}), None).await?;
//! ```
//!
//! # Subscriptions
//!
//! ```ignore
//! use horizon_graphql::{GraphQLClient, HandlerKind, SubscribeOptions, SubscriptionContext};
//!
//! let client = GraphQLClient::builder("https://api.example.com/graphql")
//!     .subscription_handler(HandlerKind::Ws)
//!     .build()?;
//!
//! let countdown = client.define_subscription(
//!     "subscription Countdown($from: Int!) { countdown(from: $from) }".parse()?,
//!     SubscriptionContext::new(),
//! )?;
//!
//! let session = countdown.subscribe(json!({"from": 5}), SubscribeOptions::new().immediate(true));
//! session.data().subscribe(|data| println!("{data:?}"));
//!
//! // Later: move to a new connection without a gap.
//! session.refresh().await;
//! ```
//!
//! # Logging
//!
//! Everything is logged through `tracing` under the targets in [`targets`].
//! The crate never installs a subscriber.

pub mod client;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
mod http;
pub mod operation;
pub mod request;
pub mod response;
pub mod subscription;
pub mod targets;
pub mod transport;

pub use client::{GraphQLClient, GraphQLClientBuilder};
pub use config::{
    ClientConfig, ExecutionContext, HandlerKind, HttpOptions, PreferMethod, SseOptions,
    SubscriptionConfig, WsOptions,
};
pub use context::{RequestContext, SubscriptionContext};
pub use document::{OperationDocument, OperationKind, classify};
pub use error::{ClientError, DocumentError, Result, SubscriptionError};
pub use operation::Operation;
pub use request::GraphQLRequest;
pub use response::{GraphQLError, GraphQLLocation, GraphQLResponse, PathSegment};
pub use subscription::{
    Epoch, EpochGuard, EventSink, Handoff, SubscribeOptions, SubscriptionDefinition,
    SubscriptionSession, SubscriptionState, UnsubscribeHooks,
};
pub use transport::{ConnectionRequest, SseTransport, SubscriptionTransport, WebSocketTransport};

pub use horizon_graphql_core::{ConnectionId, Observable, ReadOnlyObservable};
