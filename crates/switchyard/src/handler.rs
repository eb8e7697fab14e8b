//! Handler traits.
//!
//! [`Handler<M>`] is what application code implements: one message type in,
//! one [`Response`] out. The registry stores handlers behind the erased
//! [`DynHandler`] so that every message type fits in one table.

use crate::core::{Envelope, Message, MessageContext, TypeKey};
use crate::error::MessageTypeMismatch;
use crate::response::Response;
use anyhow::Result;
use async_trait::async_trait;
use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

/// Business logic bound to exactly one message type.
///
/// Return `Ok(Response::Error(..))` for expected failures (validation, not
/// found, denied). Return `Err` only for faults; the bus surfaces those as
/// [`DispatchError::MiddlewareFault`](crate::DispatchError::MiddlewareFault).
///
/// Collaborators such as repositories and policies are constructor
/// arguments, resolved once during wiring.
#[async_trait]
pub trait Handler<M: Message>: Send + Sync + 'static {
    async fn handle(&self, message: M, ctx: &MessageContext) -> Result<Response>;
}

#[async_trait]
impl<M: Message, H: Handler<M>> Handler<M> for Arc<H> {
    async fn handle(&self, message: M, ctx: &MessageContext) -> Result<Response> {
        self.as_ref().handle(message, ctx).await
    }
}

/// Type-erased handler as stored in the registry.
///
/// Implement it directly only when a transport produces its own message
/// types at runtime; everything else goes through [`Handler<M>`].
#[async_trait]
pub trait DynHandler: Send + Sync + 'static {
    /// Key of the message type this handler accepts.
    fn key(&self) -> TypeKey;

    /// Concrete type of the messages this handler accepts.
    fn message_type_id(&self) -> TypeId;

    fn message_type_name(&self) -> &'static str;

    async fn call(&self, envelope: Envelope) -> Result<Response>;
}

/// Bridges a typed handler to [`DynHandler`].
pub(crate) struct HandlerAdapter<M, H> {
    handler: H,
    _message: PhantomData<fn() -> M>,
}

impl<M, H> HandlerAdapter<M, H> {
    pub(crate) fn new(handler: H) -> Self {
        Self {
            handler,
            _message: PhantomData,
        }
    }
}

#[async_trait]
impl<M: Message, H: Handler<M>> DynHandler for HandlerAdapter<M, H> {
    fn key(&self) -> TypeKey {
        M::type_key()
    }

    fn message_type_id(&self) -> TypeId {
        TypeId::of::<M>()
    }

    fn message_type_name(&self) -> &'static str {
        std::any::type_name::<M>()
    }

    async fn call(&self, envelope: Envelope) -> Result<Response> {
        let (message, ctx) = envelope.into_parts();
        let (found, found_type) = (message.key(), message.type_name());
        let message = message
            .into_any()
            .downcast::<M>()
            .map_err(|_| MessageTypeMismatch {
                expected: M::type_key(),
                expected_type: std::any::type_name::<M>(),
                found,
                found_type,
            })?;
        self.handler.handle(*message, &ctx).await
    }
}
