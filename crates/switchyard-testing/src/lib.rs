//! Testing utilities for Switchyard.
//!
//! Handlers and middlewares that record what they saw, so tests can assert
//! on call order and call counts without writing fixtures by hand.
//!
//! ```ignore
//! use switchyard_testing::{CallLog, CountingHandler, RecordingMiddleware};
//!
//! let log = CallLog::new();
//! let handler = CountingHandler::<Ping>::new(Response::success("pong")).with_log(log.clone());
//! let calls = handler.counter();
//!
//! let bus = BusBuilder::new()
//!     .with_middleware(MessageKind::Query, RecordingMiddleware::new("auth", log.clone()))
//!     .with_handler::<Ping, _>(handler)
//!     .build()?;
//!
//! bus.dispatch(ping).await?;
//! assert_eq!(log.entries(), ["auth-before", "handler", "auth-after"]);
//! assert_eq!(calls.get(), 1);
//! ```

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use switchyard_core::{
    Envelope, ErrorKind, Handler, Message, MessageContext, Middleware, Next, Response,
};

// ============================================================================
// CallLog
// ============================================================================

/// Shared, ordered record of labelled events.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        // A panicking test thread must not hide the entries from the others.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shared call counter handed out by the counting fixtures.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Middlewares
// ============================================================================

/// Pushes `"{label}-before"` and `"{label}-after"` around the rest of the
/// chain.
pub struct RecordingMiddleware {
    label: &'static str,
    log: CallLog,
}

impl RecordingMiddleware {
    pub fn new(label: &'static str, log: CallLog) -> Self {
        Self { label, log }
    }
}

#[async_trait]
impl Middleware for RecordingMiddleware {
    fn name(&self) -> &'static str {
        self.label
    }

    async fn dispatch(&self, envelope: Envelope, next: Next<'_>) -> Result<Response> {
        self.log.push(format!("{}-before", self.label));
        let outcome = next.run(envelope).await;
        self.log.push(format!("{}-after", self.label));
        outcome
    }
}

/// Answers every message with a fixed response without calling `next`.
pub struct ShortCircuitMiddleware {
    response: Response,
    hits: CallCounter,
}

impl ShortCircuitMiddleware {
    pub fn new(response: Response) -> Self {
        Self {
            response,
            hits: CallCounter::default(),
        }
    }

    pub fn deny(message: &str) -> Self {
        Self::new(Response::error(ErrorKind::PolicyDenied, message))
    }

    pub fn counter(&self) -> CallCounter {
        self.hits.clone()
    }
}

#[async_trait]
impl Middleware for ShortCircuitMiddleware {
    async fn dispatch(&self, _envelope: Envelope, _next: Next<'_>) -> Result<Response> {
        self.hits.bump();
        Ok(self.response.clone())
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Counts calls and returns a fixed response.
pub struct CountingHandler<M> {
    response: Response,
    calls: CallCounter,
    log: Option<CallLog>,
    _message: PhantomData<fn() -> M>,
}

impl<M> CountingHandler<M> {
    pub fn new(response: Response) -> Self {
        Self {
            response,
            calls: CallCounter::default(),
            log: None,
            _message: PhantomData,
        }
    }

    /// Also push `"handler"` to `log` on every call.
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn counter(&self) -> CallCounter {
        self.calls.clone()
    }
}

#[async_trait]
impl<M: Message> Handler<M> for CountingHandler<M> {
    async fn handle(&self, _message: M, _ctx: &MessageContext) -> Result<Response> {
        self.calls.bump();
        if let Some(log) = &self.log {
            log.push("handler");
        }
        Ok(self.response.clone())
    }
}

/// Fails every call with an error, producing a dispatch fault.
pub struct FailingHandler<M> {
    reason: String,
    _message: PhantomData<fn() -> M>,
}

impl<M> FailingHandler<M> {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            _message: PhantomData,
        }
    }
}

#[async_trait]
impl<M: Message> Handler<M> for FailingHandler<M> {
    async fn handle(&self, _message: M, _ctx: &MessageContext) -> Result<Response> {
        Err(anyhow!("{}", self.reason))
    }
}

/// Keeps every message and context it receives.
pub struct RecordingHandler<M> {
    response: Response,
    received: Arc<Mutex<Vec<(M, MessageContext)>>>,
}

impl<M> RecordingHandler<M> {
    pub fn new(response: Response) -> Self {
        Self {
            response,
            received: Arc::default(),
        }
    }

    pub fn received(&self) -> Received<M> {
        Received(self.received.clone())
    }
}

/// Read side of a [`RecordingHandler`].
pub struct Received<M>(Arc<Mutex<Vec<(M, MessageContext)>>>);

impl<M: Clone> Received<M> {
    pub fn messages(&self) -> Vec<M> {
        self.lock().iter().map(|(message, _)| message.clone()).collect()
    }

    pub fn contexts(&self) -> Vec<MessageContext> {
        self.lock().iter().map(|(_, ctx)| ctx.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(M, MessageContext)>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl<M: Message> Handler<M> for RecordingHandler<M> {
    async fn handle(&self, message: M, ctx: &MessageContext) -> Result<Response> {
        self.received
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((message, ctx.clone()));
        Ok(self.response.clone())
    }
}

// ============================================================================
// Assertions
// ============================================================================

/// Unwrap a success payload, panicking with the error response otherwise.
#[track_caller]
pub fn assert_success(response: &Response) -> &Value {
    match response {
        Response::Success(ok) => ok.result(),
        Response::Error(err) => panic!("expected success, got error response: {err}"),
    }
}

/// Assert the response is an error of `kind`.
#[track_caller]
pub fn assert_error_kind(response: &Response, kind: ErrorKind) {
    match response {
        Response::Error(err) => assert_eq!(err.kind(), &kind, "error message: {}", err.message()),
        Response::Success(ok) => panic!("expected {kind} error, got success: {}", ok.result()),
    }
}
