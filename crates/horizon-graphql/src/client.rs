//! GraphQL client implementation.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{
    ClientConfig, ExecutionContext, HandlerKind, PreferMethod, SseOptions, WsOptions,
};
use crate::context::{RequestContext, SubscriptionContext};
use crate::document::{OperationDocument, OperationKind};
use crate::error::{ClientError, DocumentError, Result};
use crate::http::HttpExecutor;
use crate::operation::Operation;
use crate::response::GraphQLResponse;
use crate::subscription::SubscriptionDefinition;
use crate::targets;
use crate::transport::{self, SubscriptionTransport};

/// Builder for creating a GraphQL client.
pub struct GraphQLClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn SubscriptionTransport>>,
    init_payload_error: Option<ClientError>,
}

impl GraphQLClientBuilder {
    /// Create a new builder with the specified GraphQL endpoint URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self::from_config(ClientConfig::new(url))
    }

    /// Start from an existing configuration.
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            init_payload_error: None,
        }
    }

    /// Add a default header to all queries and mutations.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.http.headers.insert(name.into(), value.into());
        self
    }

    /// Add multiple headers.
    pub fn headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.config.http.headers.extend(headers);
        self
    }

    /// Set the HTTP method used for queries.
    pub fn prefer_method(mut self, method: PreferMethod) -> Self {
        self.config.http.prefer_method = method;
        self
    }

    /// Set the request timeout for HTTP operations.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.http.timeout = Some(timeout);
        self
    }

    /// Set the execution context.
    ///
    /// In [`ExecutionContext::Server`] subscriptions never connect.
    pub fn execution_context(mut self, context: ExecutionContext) -> Self {
        self.config.execution_context = context;
        self
    }

    /// Select the built-in subscription transport.
    pub fn subscription_handler(mut self, handler: HandlerKind) -> Self {
        self.config.subscription.handler = handler;
        self
    }

    /// Set a separate URL for subscriptions.
    ///
    /// If not set, the HTTP URL is used; for WebSocket it is converted
    /// (http:// -> ws://, https:// -> wss://).
    pub fn subscription_url(mut self, url: impl Into<String>) -> Self {
        self.config.subscription.url = Some(url.into());
        self
    }

    /// Replace the WebSocket dial options.
    pub fn ws_options(mut self, options: WsOptions) -> Self {
        self.config.subscription.ws = options;
        self
    }

    /// Replace the SSE options.
    pub fn sse_options(mut self, options: SseOptions) -> Self {
        self.config.subscription.sse = options;
        self
    }

    /// Set the connection init payload for WebSocket subscriptions.
    ///
    /// This is sent when establishing the WebSocket connection and can
    /// include authentication tokens or other initialization data. A
    /// payload that fails to serialize makes [`build`](Self::build) fail.
    pub fn connection_init_payload(mut self, payload: impl Serialize) -> Self {
        match serde_json::to_value(payload) {
            Ok(value) => {
                self.config.subscription.ws.connection_init_payload = Some(value);
                self.init_payload_error = None;
            }
            Err(err) => {
                warn!(target: targets::SUBSCRIPTION, error = %err, "connection init payload rejected");
                self.init_payload_error = Some(err.into());
            }
        }
        self
    }

    /// Set the connection timeout for subscription connections.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.subscription.ws.connection_timeout = timeout;
        self.config.subscription.sse.connection_timeout = timeout;
        self
    }

    /// Set the keep-alive interval for WebSocket connections.
    ///
    /// Set to `None` to disable keep-alive pings.
    pub fn keep_alive_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.subscription.ws.keep_alive_interval = interval;
        self
    }

    /// Use a custom subscription transport instead of WebSocket or SSE.
    pub fn subscription_transport(mut self, transport: Arc<dyn SubscriptionTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the GraphQL client.
    pub fn build(self) -> Result<GraphQLClient> {
        if let Some(err) = self.init_payload_error {
            return Err(err);
        }
        self.config.validate()?;

        let executor = HttpExecutor::new(self.config.endpoint.clone(), self.config.http.clone())?;

        let transport = if self.config.execution_context.can_subscribe() {
            match self.transport {
                Some(transport) => Some(transport),
                None => Some(transport::from_config(&self.config)?),
            }
        } else {
            None
        };

        let subscription_url = self.config.subscription_url();
        debug!(
            target: targets::HTTP,
            endpoint = %self.config.endpoint,
            subscription_url = %subscription_url,
            transport = transport.as_ref().map(|t| t.name()),
            "client created"
        );

        Ok(GraphQLClient {
            inner: Arc::new(GraphQLClientInner {
                executor: Arc::new(executor),
                subscription_url,
                transport,
                config: self.config,
            }),
        })
    }
}

struct GraphQLClientInner {
    executor: Arc<HttpExecutor>,
    subscription_url: String,
    transport: Option<Arc<dyn SubscriptionTransport>>,
    config: ClientConfig,
}

/// A GraphQL client for queries, mutations, and subscriptions.
///
/// # Example
///
/// ```ignore
/// use horizon_graphql::{GraphQLClient, HandlerKind, OperationDocument, SubscribeOptions};
///
/// let client = GraphQLClient::builder("https://api.example.com/graphql")
///     .subscription_handler(HandlerKind::Ws)
///     .build()?;
///
/// // Execute a query
/// let users: Value = client
///     .query(&"{ users { id name } }".parse()?, Value::Null, None)
///     .await?;
///
/// // Subscribe to events
/// let events = client.define_subscription(
///     "subscription { events { id } }".parse()?,
///     SubscriptionContext::new(),
/// )?;
/// let session = events.subscribe(Value::Null, SubscribeOptions::new().immediate(true));
/// ```
#[derive(Clone)]
pub struct GraphQLClient {
    inner: Arc<GraphQLClientInner>,
}

static_assertions::assert_impl_all!(GraphQLClient: Send, Sync);

impl GraphQLClient {
    /// Create a new builder for configuring a GraphQL client.
    pub fn builder(url: impl Into<String>) -> GraphQLClientBuilder {
        GraphQLClientBuilder::new(url)
    }

    /// Create a client from a configuration.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        GraphQLClientBuilder::from_config(config).build()
    }

    /// Get the HTTP endpoint URL.
    pub fn url(&self) -> &str {
        self.inner.executor.url()
    }

    /// Get the URL subscriptions connect to.
    pub fn subscription_url(&self) -> &str {
        &self.inner.subscription_url
    }

    /// Get the execution context.
    pub fn execution_context(&self) -> ExecutionContext {
        self.inner.config.execution_context
    }

    /// Get the configuration the client was built from.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Execute a query or mutation and return the raw response.
    ///
    /// For subscriptions, use [`define_subscription`](Self::define_subscription).
    pub async fn execute(
        &self,
        document: &OperationDocument,
        variables: Value,
        context: Option<RequestContext>,
    ) -> Result<GraphQLResponse> {
        if document.kind() == OperationKind::Subscription {
            return Err(DocumentError::SubscriptionNotSupported.into());
        }
        self.inner
            .executor
            .execute(document, variables, &context.unwrap_or_default())
            .await
    }

    /// Execute a query and parse the result.
    ///
    /// Fails before any network call unless `document` is a query.
    pub async fn query<T: DeserializeOwned>(
        &self,
        document: &OperationDocument,
        variables: Value,
        context: Option<RequestContext>,
    ) -> Result<T> {
        document.expect_kind(OperationKind::Query)?;
        self.execute(document, variables, context).await?.data()
    }

    /// Execute a mutation and parse the result.
    ///
    /// Fails before any network call unless `document` is a mutation.
    pub async fn mutation<T: DeserializeOwned>(
        &self,
        document: &OperationDocument,
        variables: Value,
        context: Option<RequestContext>,
    ) -> Result<T> {
        document.expect_kind(OperationKind::Mutation)?;
        self.execute(document, variables, context).await?.data()
    }

    /// Define a reusable query or mutation.
    pub fn define_operation(
        &self,
        document: OperationDocument,
        context: RequestContext,
    ) -> Result<Operation> {
        if document.kind() == OperationKind::Subscription {
            return Err(DocumentError::SubscriptionNotSupported.into());
        }
        Ok(Operation::new(
            self.inner.executor.clone(),
            document,
            context,
        ))
    }

    /// Define a reusable subscription.
    ///
    /// Fails unless `document` is a subscription. In a server execution
    /// context the definition is valid but its sessions never connect.
    pub fn define_subscription(
        &self,
        document: OperationDocument,
        context: SubscriptionContext,
    ) -> Result<SubscriptionDefinition> {
        SubscriptionDefinition::new(
            document,
            self.inner.transport.clone(),
            self.inner.subscription_url.clone(),
            context,
        )
    }
}

impl std::fmt::Debug for GraphQLClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQLClient")
            .field("http_url", &self.url())
            .field("subscription_url", &self.inner.subscription_url)
            .field("execution_context", &self.inner.config.execution_context)
            .finish()
    }
}
