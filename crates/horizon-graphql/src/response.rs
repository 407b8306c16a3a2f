//! Execution results.
//!
//! [`GraphQLResponse`] is both the body of a query/mutation response and the
//! payload of every subscription `next` event.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientError;

/// An entry of the `errors` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<GraphQLLocation>,

    /// Response path of the field that failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        let Some(path) = &self.path else {
            return Ok(());
        };
        let rendered: Vec<String> = path
            .iter()
            .map(|segment| match segment {
                PathSegment::Field(name) => name.clone(),
                PathSegment::Index(index) => format!("[{index}]"),
            })
            .collect();
        write!(f, " (at {})", rendered.join("."))
    }
}

impl std::error::Error for GraphQLError {}

/// 1-based position in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphQLLocation {
    pub line: u32,
    pub column: u32,
}

/// One step of an error path: a field name or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// Join the messages of `errors` with `"; "`.
pub(crate) fn join_messages(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single execution result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQLResponse {
    #[serde(default)]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,

    /// `Some(false)` on the last result of a stream.
    #[serde(default, rename = "hasNext", skip_serializing_if = "Option::is_none")]
    pub has_next: Option<bool>,
}

impl GraphQLResponse {
    /// Whether the server marked this as the last result of the stream.
    pub fn is_final(&self) -> bool {
        self.has_next == Some(false)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// All error messages joined with `"; "`, or `None` without errors.
    pub fn error_message(&self) -> Option<String> {
        self.has_errors().then(|| join_messages(&self.errors))
    }

    /// Deserialize `data`.
    ///
    /// Any entry in `errors` fails the call with [`ClientError::GraphQL`],
    /// even when partial data is present.
    pub fn data<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        if let Some(message) = self.error_message() {
            return Err(ClientError::GraphQL(message));
        }
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| ClientError::Protocol("response carried no data".into()))?;
        serde_json::from_value(data.clone())
            .map_err(|e| ClientError::Json(format!("cannot decode response data: {e}")))
    }
}
