//! Client configuration.
//!
//! [`ClientConfig`] can be assembled through [`GraphQLClientBuilder`](crate::GraphQLClientBuilder)
//! or loaded from TOML:
//!
//! ```
//! use horizon_graphql::config::{ClientConfig, HandlerKind};
//!
//! let config = ClientConfig::from_toml_str(r#"
//!     endpoint = "https://api.example.com/graphql"
//!
//!     [http]
//!     prefer_method = "GET"
//!
//!     [subscription]
//!     handler = "ws"
//!
//!     [subscription.ws]
//!     keep_alive_interval = 15
//! "#).unwrap();
//!
//! assert_eq!(config.subscription.handler, HandlerKind::Ws);
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, Result};

/// Where the client is running.
///
/// Subscriptions only open real connections in a [`Client`](Self::Client)
/// context. In a [`Server`](Self::Server) context (for example while
/// pre-rendering) subscription entry points are no-ops, so the same code
/// path does not open duplicate connections on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionContext {
    /// Interactive client; subscriptions connect.
    #[default]
    Client,
    /// Server-side execution; subscriptions never connect.
    Server,
}

impl ExecutionContext {
    /// Whether subscription connections may be opened.
    pub fn can_subscribe(&self) -> bool {
        matches!(self, Self::Client)
    }
}

/// HTTP method used for queries and mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PreferMethod {
    /// JSON body in a POST request.
    #[default]
    Post,
    /// URL-encoded parameters in a GET request.
    Get,
}

/// Options for the query/mutation HTTP path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpOptions {
    /// Headers added to every request.
    pub headers: HashMap<String, String>,
    /// Default HTTP method.
    pub prefer_method: PreferMethod,
    /// Request timeout.
    #[serde(with = "duration_secs::option")]
    pub timeout: Option<Duration>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            prefer_method: PreferMethod::Post,
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Which built-in transport carries subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    /// Server-Sent Events.
    #[default]
    Sse,
    /// WebSocket (graphql-transport-ws).
    Ws,
}

/// Dial options for the WebSocket transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WsOptions {
    /// Headers sent with the WebSocket handshake.
    pub headers: HashMap<String, String>,
    /// Payload of the `connection_init` message.
    pub connection_init_payload: Option<Value>,
    /// Time allowed for the handshake and `connection_ack`.
    #[serde(with = "duration_secs")]
    pub connection_timeout: Duration,
    /// Interval between client pings. `None` disables keep-alive.
    #[serde(with = "duration_secs::option")]
    pub keep_alive_interval: Option<Duration>,
}

impl Default for WsOptions {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            connection_init_payload: None,
            connection_timeout: Duration::from_secs(30),
            keep_alive_interval: Some(Duration::from_secs(30)),
        }
    }
}

/// Dial options for the Server-Sent Events transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SseOptions {
    /// Headers sent with the event stream request.
    pub headers: HashMap<String, String>,
    /// Time allowed to establish the connection.
    #[serde(with = "duration_secs")]
    pub connection_timeout: Duration,
}

impl Default for SseOptions {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            connection_timeout: Duration::from_secs(30),
        }
    }
}

/// Subscription transport selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Transport to use.
    pub handler: HandlerKind,
    /// Subscription endpoint. Defaults to the HTTP endpoint, converted to
    /// `ws://`/`wss://` for the WebSocket transport.
    pub url: Option<String>,
    /// WebSocket dial options.
    pub ws: WsOptions,
    /// SSE dial options.
    pub sse: SseOptions,
}

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// GraphQL HTTP endpoint.
    pub endpoint: String,
    /// Execution context.
    #[serde(default)]
    pub execution_context: ExecutionContext,
    /// Query/mutation options.
    #[serde(default)]
    pub http: HttpOptions,
    /// Subscription options.
    #[serde(default)]
    pub subscription: SubscriptionConfig,
}

impl ClientConfig {
    /// Create a configuration with defaults for `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            execution_context: ExecutionContext::default(),
            http: HttpOptions::default(),
            subscription: SubscriptionConfig::default(),
        }
    }

    /// Parse a configuration from TOML.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(ClientError::MissingEndpoint);
        }
        url::Url::parse(&self.endpoint)?;
        if let Some(url) = &self.subscription.url {
            url::Url::parse(url)?;
        }
        Ok(())
    }

    /// The URL subscriptions connect to.
    pub fn subscription_url(&self) -> String {
        match (&self.subscription.url, self.subscription.handler) {
            (Some(url), _) => url.clone(),
            (None, HandlerKind::Ws) => http_to_ws_url(&self.endpoint),
            (None, HandlerKind::Sse) => self.endpoint.clone(),
        }
    }
}

pub(crate) fn http_to_ws_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}

/// Durations as (fractional) seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use std::time::Duration;

        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(duration) => serializer.serialize_some(&duration.as_secs_f64()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Option::<f64>::deserialize(deserializer)?
                .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
