//! Middleware chain.
//!
//! A middleware wraps everything registered after it for the same
//! [`MessageKind`](crate::MessageKind). For middlewares `[A, B, C]` the
//! effective call order is:
//!
//! ```text
//! caller ─► A ─► B ─► C ─► handler
//!        ◄─   ◄─   ◄─   ◄─
//! ```
//!
//! Each middleware receives a [`Next`] continuation and decides whether to
//! run it:
//!
//! - zero times: short-circuit with its own [`Response`]
//! - once: the usual case
//!
//! An `Err` from `next` is a fault. A middleware may translate it into an
//! error response it owns, or propagate it, but must never answer with a
//! success in its place.

mod authorize;
mod cache;
mod cancel;
mod trace;

pub use authorize::PolicyMiddleware;
pub use cache::{CacheInvalidationMiddleware, CacheMiddleware};
pub use cancel::CancellationMiddleware;
pub use trace::TracingMiddleware;

use crate::core::Envelope;
use crate::handler::DynHandler;
use crate::response::Response;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    async fn dispatch(&self, envelope: Envelope, next: Next<'_>) -> Result<Response>;
}

/// The rest of the chain: the remaining middlewares, then the handler.
///
/// `run` consumes it, so each middleware reaches the handler at most once.
pub struct Next<'a> {
    middlewares: &'a [Arc<dyn Middleware>],
    handler: &'a dyn DynHandler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(middlewares: &'a [Arc<dyn Middleware>], handler: &'a dyn DynHandler) -> Self {
        Self {
            middlewares,
            handler,
        }
    }

    /// Run the remainder of the chain.
    pub async fn run(self, envelope: Envelope) -> Result<Response> {
        match self.middlewares.split_first() {
            Some((current, rest)) => {
                current
                    .dispatch(envelope, Next::new(rest, self.handler))
                    .await
            }
            None => self.handler.call(envelope).await,
        }
    }
}
