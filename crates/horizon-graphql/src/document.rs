//! Operation documents and the document classifier.
//!
//! Every entry point validates its document before dispatch: queries must
//! be queries, subscriptions must be subscriptions. Classification parses
//! the document once and requires exactly one operation definition.
//!
//! # Example
//!
//! ```
//! use horizon_graphql::document::{OperationDocument, OperationKind};
//!
//! let doc = OperationDocument::parse("subscription Countdown { countdown }").unwrap();
//! assert_eq!(doc.kind(), OperationKind::Subscription);
//! assert_eq!(doc.operation_name(), Some("Countdown"));
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_graphql_parser::types::{DocumentOperations, OperationType};
use serde::{Deserialize, Serialize};

use crate::error::DocumentError;

/// A GraphQL operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// A query operation (read-only).
    Query,
    /// A mutation operation (modifies data).
    Mutation,
    /// A subscription operation (real-time updates).
    Subscription,
}

impl OperationKind {
    /// The keyword used for this kind in GraphQL source.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<OperationType> for OperationKind {
    fn from(ty: OperationType) -> Self {
        match ty {
            OperationType::Query => Self::Query,
            OperationType::Mutation => Self::Mutation,
            OperationType::Subscription => Self::Subscription,
        }
    }
}

/// Return the kind of the single operation defined in `source`.
///
/// Fails with [`DocumentError::Ambiguous`] if the document defines more
/// than one operation and [`DocumentError::Unknown`] if it defines none.
pub fn classify(source: &str) -> Result<OperationKind, DocumentError> {
    parse_operation(source).map(|(kind, _)| kind)
}

fn parse_operation(source: &str) -> Result<(OperationKind, Option<String>), DocumentError> {
    use async_graphql_parser::Error as ParseError;

    let document = async_graphql_parser::parse_query(source).map_err(|err| match err {
        ParseError::MissingOperation => DocumentError::Unknown,
        ParseError::MultipleOperations { .. } | ParseError::OperationDuplicated { .. } => {
            DocumentError::Ambiguous
        }
        other => DocumentError::Syntax {
            message: other.to_string(),
        },
    })?;

    match document.operations {
        DocumentOperations::Single(operation) => Ok((operation.node.ty.into(), None)),
        DocumentOperations::Multiple(operations) => {
            let mut operations = operations.into_iter();
            match (operations.next(), operations.next()) {
                (Some((name, operation)), None) => {
                    Ok((operation.node.ty.into(), Some(name.to_string())))
                }
                (None, _) => Err(DocumentError::Unknown),
                (Some(_), Some(_)) => Err(DocumentError::Ambiguous),
            }
        }
    }
}

struct DocumentInner {
    source: String,
    kind: OperationKind,
    operation_name: Option<String>,
}

/// An immutable, classified GraphQL document.
///
/// Created once and shared by every invocation of its operation; clones
/// are cheap and refer to the same parsed document.
#[derive(Clone)]
pub struct OperationDocument {
    inner: Arc<DocumentInner>,
}

impl OperationDocument {
    /// Parse and classify `source`.
    pub fn parse(source: impl Into<String>) -> Result<Self, DocumentError> {
        let source = source.into();
        let (kind, operation_name) = parse_operation(&source)?;
        Ok(Self {
            inner: Arc::new(DocumentInner {
                source,
                kind,
                operation_name,
            }),
        })
    }

    /// The document source, sent on the wire as `query`.
    pub fn source(&self) -> &str {
        &self.inner.source
    }

    /// The operation kind.
    pub fn kind(&self) -> OperationKind {
        self.inner.kind
    }

    /// The operation name, if the operation is named.
    pub fn operation_name(&self) -> Option<&str> {
        self.inner.operation_name.as_deref()
    }

    /// Fail with [`DocumentError::WrongKind`] unless this document is `expected`.
    pub fn expect_kind(&self, expected: OperationKind) -> Result<(), DocumentError> {
        if self.kind() == expected {
            Ok(())
        } else {
            Err(DocumentError::WrongKind {
                expected,
                actual: self.kind(),
            })
        }
    }
}

impl FromStr for OperationDocument {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for OperationDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDocument")
            .field("kind", &self.inner.kind)
            .field("operation_name", &self.inner.operation_name)
            .finish()
    }
}
