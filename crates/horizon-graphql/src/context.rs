//! Per-operation request contexts.
//!
//! A context is captured when an operation is defined and can be rewritten
//! per call. Rewrites are merged field by field: headers are combined with
//! the rewrite winning on conflicts, optional fields are replaced only when
//! the rewrite sets them.

use std::collections::HashMap;

use serde_json::Value;

use crate::config::PreferMethod;

/// Context for queries and mutations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    /// Extra headers for the request.
    pub headers: HashMap<String, String>,
    /// Overrides the client's preferred HTTP method.
    pub prefer_method: Option<PreferMethod>,
}

impl RequestContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Override the HTTP method.
    pub fn prefer_method(mut self, method: PreferMethod) -> Self {
        self.prefer_method = Some(method);
        self
    }

    /// Return a copy of this context with `rewrite` applied on top.
    pub fn merge(&self, rewrite: &RequestContext) -> RequestContext {
        let mut headers = self.headers.clone();
        headers.extend(rewrite.headers.clone());
        RequestContext {
            headers,
            prefer_method: rewrite.prefer_method.or(self.prefer_method),
        }
    }
}

/// Context for subscriptions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionContext {
    /// Extra headers for the WebSocket handshake or SSE request.
    pub headers: HashMap<String, String>,
    /// Overrides the WebSocket `connection_init` payload.
    pub init_payload: Option<Value>,
}

impl SubscriptionContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the `connection_init` payload.
    pub fn init_payload(mut self, payload: Value) -> Self {
        self.init_payload = Some(payload);
        self
    }

    /// Return a copy of this context with `rewrite` applied on top.
    pub fn merge(&self, rewrite: &SubscriptionContext) -> SubscriptionContext {
        let mut headers = self.headers.clone();
        headers.extend(rewrite.headers.clone());
        SubscriptionContext {
            headers,
            init_payload: rewrite
                .init_payload
                .clone()
                .or_else(|| self.init_payload.clone()),
        }
    }
}
