//! Error types for the GraphQL client.

use crate::document::OperationKind;
use crate::response::{GraphQLError, join_messages};

/// Errors raised while validating an operation document.
///
/// These are returned synchronously from the entry points and are never
/// retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    /// The document is not valid GraphQL.
    #[error("GraphQL syntax error: {message}")]
    Syntax { message: String },

    /// The document defines more than one operation.
    #[error("Multiple operation definitions in document")]
    Ambiguous,

    /// The document defines no operation.
    #[error("Unrecognizable document type")]
    Unknown,

    /// The document's operation does not match the entry point.
    #[error("Expected a {expected} operation, but got a {actual} operation")]
    WrongKind {
        expected: OperationKind,
        actual: OperationKind,
    },

    /// A subscription was passed to an entry point that cannot run one.
    #[error("Subscriptions are not supported by this entry point")]
    SubscriptionNotSupported,
}

/// Client errors.
///
/// `ClientError` is `Clone` so transport failures can be published through
/// a session's error cell.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    /// Document validation failed.
    #[error(transparent)]
    Document(#[from] DocumentError),
    /// No endpoint was configured.
    #[error("Endpoint is required")]
    MissingEndpoint,
    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Request or handshake timed out.
    #[error("Request timed out")]
    Timeout,
    /// Connection refused or failed.
    #[error("Connection error: {0}")]
    Connection(String),
    /// HTTP request failed.
    #[error("HTTP request error: {0}")]
    Request(String),
    /// HTTP error status (4xx or 5xx).
    #[error("HTTP {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// Optional error message from the response body.
        message: Option<String>,
    },
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),
    /// Server-Sent Events stream error.
    #[error("Event stream error: {0}")]
    EventStream(String),
    /// The server violated the subscription protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// The server reported GraphQL errors.
    #[error("GraphQL error: {0}")]
    GraphQL(String),
    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for ClientError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::Request(format!("Invalid header: {err}"))
    }
}

impl From<http::header::InvalidHeaderValue> for ClientError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::Request(format!("Invalid header: {err}"))
    }
}

/// The value carried by a subscription session's error cell.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubscriptionError {
    /// GraphQL errors delivered inside a `next` payload.
    #[error("{}", join_messages(.0))]
    Response(Vec<GraphQLError>),
    /// The transport reported a failure.
    #[error(transparent)]
    Transport(ClientError),
}

/// A specialized Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_kind_message() {
        let err = DocumentError::WrongKind {
            expected: OperationKind::Subscription,
            actual: OperationKind::Query,
        };
        assert_eq!(
            err.to_string(),
            "Expected a subscription operation, but got a query operation"
        );
    }

    #[test]
    fn test_http_status_message() {
        let with_body = ClientError::HttpStatus {
            status: 502,
            message: Some("bad gateway".into()),
        };
        assert_eq!(with_body.to_string(), "HTTP 502: bad gateway");

        let bare = ClientError::HttpStatus {
            status: 404,
            message: None,
        };
        assert_eq!(bare.to_string(), "HTTP 404");
    }

    #[test]
    fn test_document_error_converts() {
        let err: ClientError = DocumentError::Ambiguous.into();
        assert!(matches!(err, ClientError::Document(DocumentError::Ambiguous)));
    }
}
