use super::{Middleware, Next};
use crate::core::Envelope;
use crate::policy::Policy;
use crate::response::Response;
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

/// Gates the rest of the chain behind a [`Policy`].
///
/// A denial answers with `ErrorResponse(PolicyDenied)` and the handler never
/// runs. A policy that fails to evaluate is a fault.
pub struct PolicyMiddleware<P> {
    policy: P,
}

impl<P> PolicyMiddleware<P>
where
    P: Policy<Envelope>,
{
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }
}

#[async_trait]
impl<P> Middleware for PolicyMiddleware<P>
where
    P: Policy<Envelope>,
{
    fn name(&self) -> &'static str {
        "policy"
    }

    async fn dispatch(&self, envelope: Envelope, next: Next<'_>) -> Result<Response> {
        match self.policy.verify(&envelope).await? {
            Ok(_) => next.run(envelope).await,
            Err(denied) => {
                debug!(
                    message = %envelope.key(),
                    reason = denied.reason(),
                    "policy denied dispatch"
                );
                Ok(Response::Error(denied.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{AllowAll, DenyAll, RequireCaller};
    use crate::test_support::{CountingHandler, Ping};
    use crate::{ErrorKind, MessageBus, MessageContext, MessageKind, RegistryBuilder};
    use std::sync::atomic::Ordering;

    fn bus_with<P: Policy<Envelope>>(policy: P, handler: CountingHandler) -> MessageBus {
        let mut registry = RegistryBuilder::new();
        registry.register_handler::<Ping, _>(handler).unwrap();
        registry.register_middleware(MessageKind::Query, PolicyMiddleware::new(policy));
        MessageBus::from_registry(registry.freeze())
    }

    #[tokio::test]
    async fn allowed_dispatch_reaches_handler() {
        let bus = bus_with(AllowAll, CountingHandler::default());
        let response = bus.dispatch(Ping::new("hi")).await.unwrap();
        assert_eq!(response, Response::success("hi"));
    }

    #[tokio::test]
    async fn denial_becomes_error_response_without_calling_handler() {
        let handler = CountingHandler::default();
        let calls = handler.calls();
        let bus = bus_with(DenyAll::new("maintenance"), handler);

        let response = bus.dispatch(Ping::new("hi")).await.unwrap();

        let error = response.as_error().unwrap();
        assert_eq!(error.kind(), &ErrorKind::PolicyDenied);
        assert_eq!(error.message(), "maintenance");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn require_caller_reads_the_context() {
        let bus = bus_with(RequireCaller, CountingHandler::default());

        let anonymous = bus.dispatch(Ping::new("hi")).await.unwrap();
        assert!(anonymous.is_error());

        let known = bus
            .dispatch_with_context(Ping::new("hi"), MessageContext::new().with_caller("bob"))
            .await
            .unwrap();
        assert!(known.is_success());
    }
}
