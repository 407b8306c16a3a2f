//! GraphQL request types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::OperationDocument;

/// A GraphQL request as sent on the wire.
///
/// Serializes to `{query, variables, operationName, extensions}`; the same
/// shape is used for HTTP bodies, WebSocket `subscribe` payloads and, as URL
/// parameters, for GET and SSE requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLRequest {
    /// The GraphQL document source.
    pub query: String,

    /// Optional variables for the operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,

    /// Optional operation name.
    #[serde(skip_serializing_if = "Option::is_none", rename = "operationName")]
    pub operation_name: Option<String>,

    /// Extensions (implementation-specific metadata).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphQLRequest {
    /// Create a request for `document` with no variables.
    pub fn new(document: &OperationDocument) -> Self {
        Self {
            query: document.source().to_string(),
            variables: None,
            operation_name: document.operation_name().map(str::to_string),
            extensions: None,
        }
    }

    /// Set a variable value.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let request = GraphQLRequest::new(&document)
    ///     .variable("id", "123")
    ///     .variable("limit", 10);
    /// ```
    pub fn variable(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        let variables = self
            .variables
            .get_or_insert_with(|| Value::Object(Default::default()));
        if let Value::Object(map) = variables
            && let Ok(value) = serde_json::to_value(value)
        {
            map.insert(name.into(), value);
        }
        self
    }

    /// Replace all variables.
    ///
    /// `Value::Null` clears the variables.
    pub fn variables(mut self, variables: Value) -> Self {
        self.variables = match variables {
            Value::Null => None,
            other => Some(other),
        };
        self
    }

    /// Set extensions (implementation-specific metadata).
    pub fn extensions(mut self, extensions: impl Serialize) -> Self {
        self.extensions = serde_json::to_value(extensions).ok();
        self
    }

    /// Encode this request as URL query parameters.
    ///
    /// `variables` is always present, serialized as JSON (`{}` when unset).
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("query", self.query.clone()),
            (
                "variables",
                self.variables
                    .as_ref()
                    .map(Value::to_string)
                    .unwrap_or_else(|| "{}".to_string()),
            ),
        ];
        if let Some(name) = &self.operation_name {
            pairs.push(("operationName", name.clone()));
        }
        if let Some(extensions) = &self.extensions {
            pairs.push(("extensions", extensions.to_string()));
        }
        pairs
    }
}
