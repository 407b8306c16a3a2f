//! Reusable query and mutation definitions.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::RequestContext;
use crate::document::OperationDocument;
use crate::error::Result;
use crate::http::HttpExecutor;
use crate::response::GraphQLResponse;

/// A validated query or mutation bound to a client.
///
/// Obtained from [`GraphQLClient::define_operation`](crate::GraphQLClient::define_operation).
///
/// ```ignore
/// let get_user = client.define_operation(
///     "query GetUser($id: ID!) { user(id: $id) { name } }".parse()?,
///     RequestContext::new(),
/// )?;
///
/// let user: Value = get_user.execute(json!({"id": "1"}), None).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Operation {
    executor: Arc<HttpExecutor>,
    document: OperationDocument,
    context: RequestContext,
}

impl Operation {
    pub(crate) fn new(
        executor: Arc<HttpExecutor>,
        document: OperationDocument,
        context: RequestContext,
    ) -> Self {
        Self {
            executor,
            document,
            context,
        }
    }

    /// The operation document.
    pub fn document(&self) -> &OperationDocument {
        &self.document
    }

    /// The context captured at definition time.
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Execute with `variables` and deserialize the `data` payload.
    ///
    /// `context_rewrite` is merged over the definition's context for this
    /// call only.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        variables: Value,
        context_rewrite: Option<RequestContext>,
    ) -> Result<T> {
        self.execute_raw(variables, context_rewrite).await?.data()
    }

    /// Execute and return the whole response, GraphQL errors included.
    pub async fn execute_raw(
        &self,
        variables: Value,
        context_rewrite: Option<RequestContext>,
    ) -> Result<GraphQLResponse> {
        let context = match &context_rewrite {
            Some(rewrite) => self.context.merge(rewrite),
            None => self.context.clone(),
        };
        self.executor
            .execute(&self.document, variables, &context)
            .await
    }
}
