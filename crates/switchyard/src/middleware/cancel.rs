use super::{Middleware, Next};
use crate::core::Envelope;
use crate::response::{ErrorKind, Response};
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

/// Answers `ErrorResponse(Cancelled)` when the caller cancelled the context
/// before the rest of the chain started.
///
/// Cancellation that happens later is left to the handler to observe.
#[derive(Debug, Clone, Copy, Default)]
pub struct CancellationMiddleware;

#[async_trait]
impl Middleware for CancellationMiddleware {
    fn name(&self) -> &'static str {
        "cancellation"
    }

    async fn dispatch(&self, envelope: Envelope, next: Next<'_>) -> Result<Response> {
        if envelope.context().is_cancelled() {
            debug!(message = %envelope.key(), "skipping cancelled dispatch");
            return Ok(Response::error(
                ErrorKind::Cancelled,
                format!("dispatch of {} was cancelled by the caller", envelope.key()),
            ));
        }
        next.run(envelope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CountingHandler, Ping};
    use crate::{MessageBus, MessageContext, MessageKind, RegistryBuilder};
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn cancelled_context_never_reaches_handler() {
        let handler = CountingHandler::default();
        let calls = handler.calls();
        let mut registry = RegistryBuilder::new();
        registry.register_handler::<Ping, _>(handler).unwrap();
        registry.register_middleware(MessageKind::Query, CancellationMiddleware);
        let bus = MessageBus::from_registry(registry.freeze());

        let ctx = MessageContext::new();
        ctx.cancellation().cancel();
        let response = bus.dispatch_with_context(Ping::new("hi"), ctx).await.unwrap();

        assert_eq!(response.as_error().unwrap().kind(), &ErrorKind::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let response = bus.dispatch(Ping::new("hi")).await.unwrap();
        assert!(response.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
