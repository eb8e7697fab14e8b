//! Handler and middleware registry.
//!
//! The registry has two phases, encoded as two types:
//!
//! - [`RegistryBuilder`] accepts registrations. It is owned by the single
//!   wiring thread and mutated through `&mut self`.
//! - [`Registry`] is produced by [`RegistryBuilder::freeze`] and is
//!   immutable. Dispatches read it concurrently without locks.

use crate::core::{Message, MessageKind, TypeKey};
use crate::error::{DispatchError, RegistryError};
use crate::handler::{DynHandler, Handler, HandlerAdapter};
use crate::middleware::Middleware;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type MiddlewareChain = SmallVec<[Arc<dyn Middleware>; 4]>;

/// Wiring-phase registry.
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: HashMap<TypeKey, Arc<dyn DynHandler>>,
    middlewares: [MiddlewareChain; 3],
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to the message type `M`.
    ///
    /// Fails with [`RegistryError::DuplicateHandler`] if `M`'s key is
    /// already bound.
    pub fn register_handler<M, H>(&mut self, handler: H) -> Result<&mut Self, RegistryError>
    where
        M: Message,
        H: Handler<M>,
    {
        self.register_dyn_handler(Arc::new(HandlerAdapter::<M, H>::new(handler)))
    }

    /// Bind an erased handler under the key it reports.
    pub fn register_dyn_handler(
        &mut self,
        handler: Arc<dyn DynHandler>,
    ) -> Result<&mut Self, RegistryError> {
        let key = handler.key();
        if self.handlers.contains_key(&key) {
            return Err(RegistryError::DuplicateHandler(key));
        }
        debug!(message = %key, "registered handler");
        self.handlers.insert(key, handler);
        Ok(self)
    }

    /// Append a middleware to the chain for `kind`.
    ///
    /// The first middleware registered for a kind is the outermost one.
    pub fn register_middleware<W: Middleware>(
        &mut self,
        kind: MessageKind,
        middleware: W,
    ) -> &mut Self {
        self.register_shared_middleware(kind, Arc::new(middleware))
    }

    /// Append a middleware instance that is also held elsewhere, e.g. one
    /// shared by several kinds or inspected by the application.
    pub fn register_shared_middleware(
        &mut self,
        kind: MessageKind,
        middleware: Arc<dyn Middleware>,
    ) -> &mut Self {
        let chain = &mut self.middlewares[kind.index()];
        debug!(
            kind = %kind,
            middleware = middleware.name(),
            position = chain.len(),
            "registered middleware"
        );
        chain.push(middleware);
        self
    }

    pub fn contains_handler(&self, key: TypeKey) -> bool {
        self.handlers.contains_key(&key)
    }

    /// End the wiring phase.
    pub fn freeze(self) -> Registry {
        Registry {
            handlers: self.handlers,
            middlewares: self.middlewares,
        }
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("handlers", &self.handlers.len())
            .field("middlewares", &chain_lengths(&self.middlewares))
            .finish()
    }
}

/// Frozen registry.
pub struct Registry {
    handlers: HashMap<TypeKey, Arc<dyn DynHandler>>,
    middlewares: [MiddlewareChain; 3],
}

impl Registry {
    pub fn resolve_handler(&self, key: TypeKey) -> Result<&Arc<dyn DynHandler>, DispatchError> {
        self.handlers
            .get(&key)
            .ok_or(DispatchError::HandlerNotFound(key))
    }

    /// Middlewares for `kind`, outermost first. Empty when none were
    /// registered.
    pub fn resolve_middlewares(&self, kind: MessageKind) -> &[Arc<dyn Middleware>] {
        &self.middlewares[kind.index()]
    }

    pub fn contains_handler(&self, key: TypeKey) -> bool {
        self.handlers.contains_key(&key)
    }

    /// Registered keys, sorted.
    pub fn handler_keys(&self) -> Vec<TypeKey> {
        let mut keys: Vec<_> = self.handlers.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("handlers", &self.handler_keys())
            .field("middlewares", &chain_lengths(&self.middlewares))
            .finish()
    }
}

fn chain_lengths(chains: &[MiddlewareChain; 3]) -> [(MessageKind, usize); 3] {
    MessageKind::ALL.map(|kind| (kind, chains[kind.index()].len()))
}
