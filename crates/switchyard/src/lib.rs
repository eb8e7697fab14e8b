//! # Switchyard
//!
//! An in-process message bus: commands, queries and events are dispatched
//! to exactly one handler each, through a middleware chain chosen by the
//! message's kind.
//!
//! ## Core Concepts
//!
//! - [`Message`] = a typed payload with a [`MessageKind`] and a [`TypeKey`]
//! - [`Handler`] = the one piece of business logic bound to a message type
//! - [`Middleware`] = cross-cutting behavior wrapped around every handler of
//!   a kind (tracing, authorization, caching)
//! - [`Response`] = the outcome. Expected failures (not found, denied) are
//!   [`Response::Error`] values; faults are [`DispatchError`]s.
//!
//! ## Architecture
//!
//! ```text
//! Transport (HTTP/RPC/CLI)
//!     │
//!     ▼ dispatch(message, ctx)
//! MessageBus ──► Envelope { message, context }
//!     │
//!     ▼ resolve handler by TypeKey, chain by MessageKind
//! Registry (frozen)
//!     │
//!     ▼
//! Middleware 1 ─► Middleware 2 ─► ... ─► Handler
//!     │                                    │
//!     ◄────────────── Response ────────────┘
//! ```
//!
//! ## Key Invariants
//!
//! 1. **One handler per type key** - duplicates fail wiring
//! 2. **Registration order is execution order** - first registered runs outermost
//! 3. **The registry is frozen** - no registration after the bus is built
//! 4. **Context is immutable** - middleware may replace the message, never the context
//!
//! ## Example
//!
//! ```ignore
//! use switchyard_core::{message, BusBuilder, BusConfig, Handler, MessageContext, Response};
//!
//! #[derive(Debug, Clone, serde::Serialize)]
//! struct Ping {
//!     value: String,
//! }
//! message!(Ping: Query, serializable);
//!
//! struct EchoHandler;
//!
//! #[switchyard_core::async_trait]
//! impl Handler<Ping> for EchoHandler {
//!     async fn handle(&self, ping: Ping, _ctx: &MessageContext) -> anyhow::Result<Response> {
//!         Ok(Response::success(ping.value))
//!     }
//! }
//!
//! let bus = BusBuilder::new()
//!     .with_standard_middlewares(&BusConfig::default())
//!     .with_handler::<Ping, _>(EchoHandler)
//!     .build()?;
//!
//! let response = bus.dispatch(Ping { value: "hi".into() }).await?;
//! assert_eq!(response, Response::success("hi"));
//! ```
//!
//! ## What This Is Not
//!
//! Switchyard is **not**:
//! - A distributed broker
//! - A persistence or retry layer
//! - A pub/sub fan-out (one handler per message type)

// Core modules
mod bus;
mod config;
mod core;
mod dispatch;
mod error;
mod handler;
mod message_macro;
mod policy;
mod registry;
mod response;
mod wiring;

pub mod middleware;


// Shared fixtures for in-crate tests; external helpers live in switchyard-testing
#[cfg(test)]
mod test_support;

// Re-export core types
pub use crate::core::{
    AnyMessage, CorrelationId, Envelope, Message, MessageContext, MessageKind, TypeKey,
};

// Re-export response types
pub use response::{ErrorKind, ErrorResponse, Response, SuccessResponse};

// Re-export error types
pub use crate::error::{
    ConfigError, DispatchError, MessageTypeMismatch, RegistryError, WiringError,
};

// Re-export handler and middleware types
pub use handler::{DynHandler, Handler};
pub use middleware::{
    CacheInvalidationMiddleware, CacheMiddleware, CancellationMiddleware, Middleware, Next,
    PolicyMiddleware, TracingMiddleware,
};

// Re-export policy types
pub use policy::{
    AllowAll, And, DenyAll, FnPolicy, Policy, PolicyDenied, PolicyResult, RequireCaller,
};

// Re-export registry and dispatch types
pub use dispatch::Dispatcher;
pub use registry::{Registry, RegistryBuilder};

// Re-export bus types (primary entry point)
pub use bus::{LifecycleState, MessageBus};
pub use wiring::{BusBuilder, Container, Module};

// Re-export config types
pub use config::{BusConfig, CacheConfig, DispatchConfig, LoggingConfig};

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use erased_serde;
pub use tokio_util::sync::CancellationToken;
