//! Tracing targets used by this crate.
//!
//! Filter with e.g. `RUST_LOG=horizon_graphql::subscription=debug`.

/// Subscription sessions: connects, handoffs, stale events.
pub const SUBSCRIPTION: &str = "horizon_graphql::subscription";

/// The WebSocket transport.
pub const TRANSPORT_WS: &str = "horizon_graphql::transport::ws";

/// The Server-Sent Events transport.
pub const TRANSPORT_SSE: &str = "horizon_graphql::transport::sse";

/// Queries and mutations over HTTP.
pub const HTTP: &str = "horizon_graphql::http";
