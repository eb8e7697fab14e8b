//! # Ping Service Example
//!
//! Wires a small greeting service onto a Switchyard bus: a store provided
//! through the container, a module registering one handler per message kind,
//! and the standard middlewares driven by a TOML config file.
//!
//! ```text
//! cargo run -p ping-service-demo -- demos/ping-service/switchyard.toml
//! ```

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use switchyard_core::{
    message, BusBuilder, BusConfig, CancellationToken, Container, ErrorKind, Handler,
    LoggingConfig, MessageContext, MessageKind, Module, PolicyMiddleware, RegistryBuilder,
    RequireCaller, Response,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Messages
// ============================================================================

/// Change how `name` is greeted.
#[derive(Debug, Clone)]
struct SetGreeting {
    name: String,
    greeting: String,
}

message!(SetGreeting: Command);

/// Look up the greeting for `name`.
#[derive(Debug, Clone, Serialize)]
struct Greet {
    name: String,
}

message!(Greet: Query, serializable);

/// A greeting was changed.
#[derive(Debug, Clone, Serialize)]
struct GreetingChanged {
    name: String,
}

message!(GreetingChanged: Event, serializable);

// ============================================================================
// Dependencies
// ============================================================================

#[derive(Default)]
struct GreetingStore {
    greetings: DashMap<String, String>,
}

// ============================================================================
// Handlers
// ============================================================================

struct SetGreetingHandler {
    store: Arc<GreetingStore>,
}

#[async_trait]
impl Handler<SetGreeting> for SetGreetingHandler {
    async fn handle(&self, cmd: SetGreeting, ctx: &MessageContext) -> Result<Response> {
        if cmd.greeting.trim().is_empty() {
            return Ok(Response::error(ErrorKind::Validation, "greeting must not be empty"));
        }
        info!(name = %cmd.name, by = ctx.caller(), "greeting updated");
        self.store.greetings.insert(cmd.name, cmd.greeting);
        Ok(Response::empty())
    }
}

struct GreetHandler {
    store: Arc<GreetingStore>,
}

#[async_trait]
impl Handler<Greet> for GreetHandler {
    async fn handle(&self, query: Greet, _ctx: &MessageContext) -> Result<Response> {
        Ok(match self.store.greetings.get(&query.name) {
            Some(greeting) => Response::success(format!("{}, {}!", greeting.value(), query.name)),
            None => Response::error(ErrorKind::NotFound, format!("nobody called {}", query.name)),
        })
    }
}

struct GreetingChangedHandler;

#[async_trait]
impl Handler<GreetingChanged> for GreetingChangedHandler {
    async fn handle(&self, event: GreetingChanged, ctx: &MessageContext) -> Result<Response> {
        info!(name = %event.name, correlation_id = %ctx.correlation_id(), "observed greeting change");
        Ok(Response::empty())
    }
}

// ============================================================================
// Module
// ============================================================================

struct GreetingModule;

impl Module for GreetingModule {
    fn name(&self) -> &'static str {
        "greetings"
    }

    fn wire(&self, container: &Container, registry: &mut RegistryBuilder) -> Result<()> {
        let store = container.resolve::<Arc<GreetingStore>>()?;

        registry
            .register_handler::<SetGreeting, _>(SetGreetingHandler {
                store: store.clone(),
            })?
            .register_handler::<Greet, _>(GreetHandler { store })?
            .register_handler::<GreetingChanged, _>(GreetingChangedHandler)?;
        Ok(())
    }
}

// ============================================================================
// Main
// ============================================================================

fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if config.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn describe(response: &Response) -> String {
    match response {
        Response::Success(ok) => format!("ok {}", ok.result()),
        Response::Error(err) => format!("refused ({err})"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => BusConfig::load(path)?,
        None => BusConfig::default(),
    };
    init_tracing(&config.logging);

    let bus = BusBuilder::new()
        .provide(Arc::new(GreetingStore::default()))
        .with_standard_middlewares(&config)
        .with_middleware(MessageKind::Command, PolicyMiddleware::new(RequireCaller))
        .with_module(GreetingModule)
        .build()?;

    let admin = || MessageContext::new().with_caller("admin");

    let anonymous = bus
        .dispatch(SetGreeting {
            name: "world".into(),
            greeting: "Hello".into(),
        })
        .await?;
    println!("anonymous set: {}", describe(&anonymous));

    let set = bus
        .dispatch_with_context(
            SetGreeting {
                name: "world".into(),
                greeting: "Hello".into(),
            },
            admin(),
        )
        .await?;
    println!("admin set:     {}", describe(&set));

    if set.is_success() {
        bus.dispatch(GreetingChanged {
            name: "world".into(),
        })
        .await?;
    }

    for name in ["world", "world", "moon"] {
        let response = bus.dispatch(Greet { name: name.into() }).await?;
        println!("greet {name:<6} {}", describe(&response));
    }

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let response = bus
        .dispatch_with_context(
            Greet {
                name: "world".into(),
            },
            MessageContext::new().with_cancellation(cancelled),
        )
        .await?;
    println!("cancelled:     {}", describe(&response));

    bus.shutdown().await;
    Ok(())
}
