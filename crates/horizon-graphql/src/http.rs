//! Queries and mutations over HTTP.

use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::{HttpOptions, PreferMethod};
use crate::context::RequestContext;
use crate::document::{OperationDocument, OperationKind};
use crate::error::{ClientError, Result};
use crate::request::GraphQLRequest;
use crate::response::GraphQLResponse;
use crate::targets;

const ACCEPT_GRAPHQL: &str = "application/graphql-response+json, application/json";

/// Sends single-result operations to the HTTP endpoint.
#[derive(Debug, Clone)]
pub(crate) struct HttpExecutor {
    client: reqwest::Client,
    url: String,
    options: HttpOptions,
}

impl HttpExecutor {
    pub fn new(url: String, options: HttpOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            url,
            options,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Execute `document` and return the raw response.
    ///
    /// Non-2xx statuses are errors; GraphQL errors in a 2xx body are left
    /// in the response for the caller to inspect.
    pub async fn execute(
        &self,
        document: &OperationDocument,
        variables: Value,
        context: &RequestContext,
    ) -> Result<GraphQLResponse> {
        let request = GraphQLRequest::new(document).variables(variables);

        // GET is only used for queries.
        let method = match document.kind() {
            OperationKind::Query => context.prefer_method.unwrap_or(self.options.prefer_method),
            _ => PreferMethod::Post,
        };

        let mut builder = match method {
            PreferMethod::Post => self.client.post(&self.url).json(&request),
            PreferMethod::Get => {
                let mut url = Url::parse(&self.url)?;
                url.query_pairs_mut().extend_pairs(request.to_query_pairs());
                self.client.get(url)
            }
        };
        builder = builder.header(ACCEPT, ACCEPT_GRAPHQL);
        for (name, value) in self.options.headers.iter().chain(&context.headers) {
            builder = builder.header(name.as_str(), value.as_str());
        }

        debug!(
            target: targets::HTTP,
            kind = %document.kind(),
            operation = ?document.operation_name(),
            ?method,
            "sending request"
        );

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.ok().filter(|body| !body.is_empty());
            debug!(target: targets::HTTP, status = status.as_u16(), "request failed");
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        let response: GraphQLResponse = response.json().await?;
        if response.has_errors() {
            debug!(
                target: targets::HTTP,
                errors = response.errors.len(),
                "response carried GraphQL errors"
            );
        }
        Ok(response)
    }
}
