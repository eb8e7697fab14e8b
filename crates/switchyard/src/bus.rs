//! MessageBus - the public entry point.

use crate::core::{AnyMessage, Envelope, Message, MessageContext};
use crate::dispatch::Dispatcher;
use crate::error::DispatchError;
use crate::registry::Registry;
use crate::response::Response;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

/// Where a built bus is in its lifecycle.
///
/// Wiring happens before a bus exists (see
/// [`BusBuilder`](crate::BusBuilder)), so a bus starts out `Frozen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Serving dispatches.
    Frozen,
    /// Rejecting new dispatches while in-flight ones drain.
    ShuttingDown,
}

/// The single call surface for transports.
///
/// Cheap to clone; clones share the registry and the lifecycle.
///
/// ```ignore
/// let bus = BusBuilder::new()
///     .with_handler::<Ping, _>(EchoHandler)
///     .build()?;
///
/// match bus.dispatch(Ping { value: "hi".into() }).await? {
///     Response::Success(ok) => println!("{}", ok.result()),
///     Response::Error(err) => println!("refused: {err}"),
/// }
/// ```
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    dispatcher: Dispatcher,
    shutting_down: AtomicBool,
    inflight: AtomicUsize,
    drained: Notify,
}

impl MessageBus {
    /// Serve dispatches from an already frozen registry.
    pub fn from_registry(registry: Registry) -> Self {
        Self {
            inner: Arc::new(BusInner {
                dispatcher: Dispatcher::new(Arc::new(registry)),
                shutting_down: AtomicBool::new(false),
                inflight: AtomicUsize::new(0),
                drained: Notify::new(),
            }),
        }
    }

    /// Dispatch with a fresh, anonymous context.
    pub async fn dispatch<M: Message>(&self, message: M) -> Result<Response, DispatchError> {
        self.dispatch_with_context(message, MessageContext::new())
            .await
    }

    pub async fn dispatch_with_context<M: Message>(
        &self,
        message: M,
        ctx: MessageContext,
    ) -> Result<Response, DispatchError> {
        self.dispatch_any(Box::new(message), ctx).await
    }

    /// Dispatch a message whose concrete type the caller does not know.
    pub async fn dispatch_any(
        &self,
        message: Box<dyn AnyMessage>,
        ctx: MessageContext,
    ) -> Result<Response, DispatchError> {
        let _guard = self.enter()?;
        self.inner
            .dispatcher
            .dispatch_one(Envelope::from_boxed(message, ctx))
            .await
    }

    pub fn registry(&self) -> &Registry {
        self.inner.dispatcher.registry()
    }

    pub fn state(&self) -> LifecycleState {
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            LifecycleState::ShuttingDown
        } else {
            LifecycleState::Frozen
        }
    }

    /// Dispatches currently running.
    pub fn inflight(&self) -> usize {
        self.inner.inflight.load(Ordering::SeqCst)
    }

    /// Stop accepting dispatches and wait for running ones to finish.
    ///
    /// Dispatches started afterwards fail with
    /// [`DispatchError::ShuttingDown`]. Calling it again just waits again.
    pub async fn shutdown(&self) {
        if !self.inner.shutting_down.swap(true, Ordering::SeqCst) {
            info!(inflight = self.inflight(), "message bus shutting down");
        }

        loop {
            let drained = self.inner.drained.notified();
            if self.inner.inflight.load(Ordering::SeqCst) == 0 {
                break;
            }
            drained.await;
        }

        info!("message bus drained");
    }

    fn enter(&self) -> Result<InflightGuard<'_>, DispatchError> {
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return Err(DispatchError::ShuttingDown);
        }
        self.inner.inflight.fetch_add(1, Ordering::SeqCst);
        let guard = InflightGuard { inner: &self.inner };

        // shutdown() may have started between the check and the increment.
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return Err(DispatchError::ShuttingDown);
        }
        Ok(guard)
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("registry", self.registry())
            .field("state", &self.state())
            .field("inflight", &self.inflight())
            .finish()
    }
}

struct InflightGuard<'a> {
    inner: &'a BusInner,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        if self.inner.inflight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.drained.notify_waiters();
        }
    }
}
