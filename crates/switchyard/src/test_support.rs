//! Fixtures shared by the in-crate tests.

use crate::core::{Envelope, MessageContext};
use crate::handler::Handler;
use crate::middleware::{Middleware, Next};
use crate::response::Response;
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) type TraceLog = Arc<Mutex<Vec<String>>>;

pub(crate) fn trace_log() -> TraceLog {
    Arc::new(Mutex::new(Vec::new()))
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Ping {
    pub value: String,
}

impl Ping {
    pub(crate) fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
        }
    }
}

crate::message!(Ping: Query, serializable);

#[derive(Debug, Clone)]
pub(crate) struct Touch;

crate::message!(Touch: Command);

/// Echoes `Ping::value`, counting calls and optionally appending "handler"
/// to a trace log.
#[derive(Default)]
pub(crate) struct CountingHandler {
    calls: Arc<AtomicUsize>,
    log: Option<TraceLog>,
}

impl CountingHandler {
    pub(crate) fn with_log(log: TraceLog) -> Self {
        Self {
            calls: Arc::default(),
            log: Some(log),
        }
    }

    pub(crate) fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Handler<Ping> for CountingHandler {
    async fn handle(&self, message: Ping, _ctx: &MessageContext) -> Result<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.lock().unwrap().push("handler".to_string());
        }
        Ok(Response::success(message.value))
    }
}

pub(crate) struct RecordingMiddleware {
    label: &'static str,
    log: TraceLog,
}

impl RecordingMiddleware {
    pub(crate) fn new(label: &'static str, log: TraceLog) -> Self {
        Self { label, log }
    }
}

#[async_trait]
impl Middleware for RecordingMiddleware {
    async fn dispatch(&self, envelope: Envelope, next: Next<'_>) -> Result<Response> {
        self.log.lock().unwrap().push(format!("{}-before", self.label));
        let response = next.run(envelope).await;
        self.log.lock().unwrap().push(format!("{}-after", self.label));
        response
    }
}

pub(crate) struct ShortCircuit(pub Response);

#[async_trait]
impl Middleware for ShortCircuit {
    async fn dispatch(&self, _envelope: Envelope, _next: Next<'_>) -> Result<Response> {
        Ok(self.0.clone())
    }
}
