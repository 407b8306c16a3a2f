//! Reusable subscription definitions.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::context::SubscriptionContext;
use crate::document::{OperationDocument, OperationKind};
use crate::error::Result;
use crate::transport::SubscriptionTransport;

use super::session::SubscriptionSession;

/// Options for [`SubscriptionDefinition::subscribe`].
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// Connect as soon as the session is created.
    pub immediate: bool,
    /// Restart whenever the variables change.
    pub auto_connect: bool,
    /// Context applied on top of the definition's context.
    pub context_rewrite: Option<SubscriptionContext>,
}

impl SubscribeOptions {
    /// Options that neither connect immediately nor react to variables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect as soon as the session is created.
    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    /// Restart whenever the variables change.
    pub fn auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    /// Rewrite the context for this session.
    pub fn context(mut self, context: SubscriptionContext) -> Self {
        self.context_rewrite = Some(context);
        self
    }
}

/// A validated subscription document bound to a client's transport.
///
/// Obtained from [`GraphQLClient::define_subscription`](crate::GraphQLClient::define_subscription).
/// A definition can start any number of independent sessions.
#[derive(Clone)]
pub struct SubscriptionDefinition {
    document: OperationDocument,
    transport: Option<Arc<dyn SubscriptionTransport>>,
    url: String,
    context: SubscriptionContext,
}

impl SubscriptionDefinition {
    pub(crate) fn new(
        document: OperationDocument,
        transport: Option<Arc<dyn SubscriptionTransport>>,
        url: String,
        context: SubscriptionContext,
    ) -> Result<Self> {
        document.expect_kind(OperationKind::Subscription)?;
        Ok(Self {
            document,
            transport,
            url,
            context,
        })
    }

    /// The subscription document.
    pub fn document(&self) -> &OperationDocument {
        &self.document
    }

    /// The context captured at definition time.
    pub fn context(&self) -> &SubscriptionContext {
        &self.context
    }

    /// Create a session for `variables`.
    ///
    /// The session starts pending. With [`SubscribeOptions::immediate`] it
    /// connects right away; otherwise call
    /// [`open`](SubscriptionSession::open) or
    /// [`restart`](SubscriptionSession::restart).
    pub fn subscribe(&self, variables: Value, options: SubscribeOptions) -> SubscriptionSession {
        let context = match &options.context_rewrite {
            Some(rewrite) => self.context.merge(rewrite),
            None => self.context.clone(),
        };
        let session = SubscriptionSession::new(
            self.document.clone(),
            self.transport.clone(),
            self.url.clone(),
            context,
            variables,
            options.auto_connect,
        );
        if options.immediate {
            session.open();
        }
        session
    }

    /// Create a session, connect, and wait until the first result arrives
    /// or the connection ends.
    pub async fn subscribe_connected(
        &self,
        variables: Value,
        options: SubscribeOptions,
    ) -> SubscriptionSession {
        let session = self.subscribe(variables, options.immediate(false));
        session.restart().await;
        session
    }
}

impl fmt::Debug for SubscriptionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionDefinition")
            .field("document", &self.document)
            .field("url", &self.url)
            .field("enabled", &self.transport.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClientError, DocumentError};

    #[test]
    fn test_rejects_non_subscription() {
        let document = OperationDocument::parse("query { users { id } }").unwrap();
        let err = SubscriptionDefinition::new(
            document,
            None,
            "http://localhost/graphql".into(),
            SubscriptionContext::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ClientError::Document(DocumentError::WrongKind {
                expected: OperationKind::Subscription,
                actual: OperationKind::Query,
            })
        );
    }

    #[test]
    fn test_options_builder() {
        let options = SubscribeOptions::new()
            .immediate(true)
            .auto_connect(true)
            .context(SubscriptionContext::new().header("X-Room", "1"));
        assert!(options.immediate);
        assert!(options.auto_connect);
        assert!(options.context_rewrite.is_some());
    }
}
