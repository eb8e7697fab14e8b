//! One-time startup wiring.
//!
//! Dependencies are constructed up front and placed in a [`Container`].
//! [`Module`]s pull what they need out of it, build their handlers by
//! constructor injection, and register them. [`BusBuilder::build`] freezes
//! the result into a [`MessageBus`].
//!
//! Every failure here (duplicate handler, missing dependency, module error)
//! surfaces from `build()`, so a misconfigured process never starts serving.

use crate::bus::MessageBus;
use crate::config::BusConfig;
use crate::core::{Message, MessageKind};
use crate::error::{RegistryError, WiringError};
use crate::handler::Handler;
use crate::middleware::{
    CacheInvalidationMiddleware, CacheMiddleware, CancellationMiddleware, Middleware,
    TracingMiddleware,
};
use crate::registry::RegistryBuilder;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Typed store of the dependencies handlers are built from.
///
/// Values are looked up by exact type, so store shared services as
/// `Arc<Service>` or `Arc<dyn Trait>` and resolve them the same way.
#[derive(Default)]
pub struct Container {
    services: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provide `value`, replacing an earlier value of the same type.
    pub fn provide<T>(&mut self, value: T) -> &mut Self
    where
        T: Clone + Send + Sync + 'static,
    {
        debug!(dependency = std::any::type_name::<T>(), "provided dependency");
        self.services.insert(TypeId::of::<T>(), Box::new(value));
        self
    }

    /// Clone out the value of type `T`.
    pub fn resolve<T>(&self) -> Result<T, WiringError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
            .ok_or(WiringError::MissingDependency(std::any::type_name::<T>()))
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }
}

/// A group of registrations wired together, usually one per feature area.
///
/// Registry and container errors raised with `?` keep their
/// [`WiringError`] form. Any other failure, such as a client that could not
/// be built, is reported as [`WiringError::Module`] under
/// [`name`](Self::name).
pub trait Module {
    fn name(&self) -> &'static str;

    fn wire(&self, container: &Container, registry: &mut RegistryBuilder) -> anyhow::Result<()>;
}

fn module_error(module: &'static str, source: anyhow::Error) -> WiringError {
    let source = match source.downcast::<WiringError>() {
        Ok(wiring) => return wiring,
        Err(source) => source,
    };
    match source.downcast::<RegistryError>() {
        Ok(registry) => registry.into(),
        Err(source) => WiringError::Module { module, source },
    }
}

/// Startup procedure producing a [`MessageBus`].
///
/// Registrations are applied in call order; a module sees only the
/// dependencies provided before it was added. The first error is kept and
/// returned by [`build`](Self::build); later calls are ignored.
///
/// ```ignore
/// let bus = BusBuilder::new()
///     .provide(Arc::new(UserRepository::connect(&db)))
///     .with_standard_middlewares(&config)
///     .with_module(UsersModule)
///     .build()?;
/// ```
#[derive(Default)]
pub struct BusBuilder {
    container: Container,
    registry: RegistryBuilder,
    query_cache: Option<Arc<CacheMiddleware>>,
    error: Option<WiringError>,
}

impl BusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a container assembled elsewhere.
    pub fn with_container(container: Container) -> Self {
        Self {
            container,
            ..Self::default()
        }
    }

    pub fn provide<T>(mut self, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.container.provide(value);
        self
    }

    pub fn with_handler<M, H>(mut self, handler: H) -> Self
    where
        M: Message,
        H: Handler<M>,
    {
        if self.error.is_none() {
            if let Err(err) = self.registry.register_handler::<M, H>(handler) {
                self.error = Some(err.into());
            }
        }
        self
    }

    pub fn with_middleware<W: Middleware>(mut self, kind: MessageKind, middleware: W) -> Self {
        self.registry.register_middleware(kind, middleware);
        self
    }

    pub fn with_shared_middleware(mut self, kind: MessageKind, middleware: Arc<dyn Middleware>) -> Self {
        self.registry.register_shared_middleware(kind, middleware);
        self
    }

    /// Register the built-in middlewares driven by `config`.
    ///
    /// Every kind gets tracing then cancellation, in place. When
    /// `config.cache.enabled` is set, a query cache is appended to the query
    /// chain by [`build`](Self::build), so it runs inside every query
    /// middleware including policies, and successful commands and events
    /// clear it.
    pub fn with_standard_middlewares(mut self, config: &BusConfig) -> Self {
        let tracing: Arc<dyn Middleware> = Arc::new(TracingMiddleware::from_config(&config.dispatch));
        let cancellation: Arc<dyn Middleware> = Arc::new(CancellationMiddleware);
        for kind in MessageKind::ALL {
            self.registry
                .register_shared_middleware(kind, tracing.clone())
                .register_shared_middleware(kind, cancellation.clone());
        }
        self.query_cache = config
            .cache
            .enabled
            .then(|| Arc::new(CacheMiddleware::from_config(&config.cache)));
        self
    }

    /// The query cache [`with_standard_middlewares`](Self::with_standard_middlewares)
    /// will install, for applications that invalidate it themselves.
    pub fn query_cache(&self) -> Option<Arc<CacheMiddleware>> {
        self.query_cache.clone()
    }

    pub fn with_module<T: Module>(mut self, module: T) -> Self {
        if self.error.is_none() {
            let name = module.name();
            debug!(module = name, "wiring module");
            if let Err(err) = module.wire(&self.container, &mut self.registry) {
                let err = module_error(name, err);
                warn!(module = name, error = %err, "module failed to wire");
                self.error = Some(err);
            }
        }
        self
    }

    /// Freeze the registry and return the bus, or the first wiring error.
    pub fn build(mut self) -> Result<MessageBus, WiringError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if let Some(cache) = self.query_cache {
            self.registry
                .register_shared_middleware(MessageKind::Query, cache.clone())
                .register_middleware(
                    MessageKind::Command,
                    CacheInvalidationMiddleware::new(cache.clone()),
                )
                .register_middleware(MessageKind::Event, CacheInvalidationMiddleware::new(cache));
        }
        let registry = self.registry.freeze();
        info!(
            handlers = registry.len(),
            keys = ?registry.handler_keys(),
            "message bus wired"
        );
        Ok(MessageBus::from_registry(registry))
    }
}
