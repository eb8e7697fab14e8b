//! Dispatcher - resolves and runs the chain for one message.

use crate::core::Envelope;
use crate::error::{DispatchError, MessageTypeMismatch};
use crate::middleware::Next;
use crate::registry::Registry;
use crate::response::Response;
use std::any::Any;
use std::sync::Arc;

/// Runs one envelope through its kind's middleware chain and handler.
///
/// Holds nothing but the frozen registry, so one instance serves every
/// concurrent caller.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Dispatch a single envelope.
    ///
    /// The handler is resolved and checked against the message's concrete
    /// type before any middleware runs, so an unknown message type faults
    /// with [`DispatchError::HandlerNotFound`], and a type sharing another's
    /// key faults with a [`MessageTypeMismatch`], both without side effects.
    /// Any `Err` raised inside the chain comes back as
    /// [`DispatchError::MiddlewareFault`].
    pub async fn dispatch_one(&self, envelope: Envelope) -> Result<Response, DispatchError> {
        let key = envelope.key();
        let handler = self.registry.resolve_handler(key)?;

        let message = envelope.message();
        if Any::type_id(message.as_any()) != handler.message_type_id() {
            return Err(DispatchError::MiddlewareFault {
                key,
                source: MessageTypeMismatch {
                    expected: handler.key(),
                    expected_type: handler.message_type_name(),
                    found: key,
                    found_type: message.type_name(),
                }
                .into(),
            });
        }

        let middlewares = self.registry.resolve_middlewares(envelope.kind());

        Next::new(middlewares, handler.as_ref())
            .run(envelope)
            .await
            .map_err(|source| DispatchError::MiddlewareFault { key, source })
    }
}
