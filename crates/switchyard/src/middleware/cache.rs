use super::{Middleware, Next};
use crate::config::CacheConfig;
use crate::core::{Envelope, MessageKind};
use crate::response::Response;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Short-circuits repeated queries with the response of an earlier one.
///
/// Only queries whose message is serializable (see
/// [`Message::as_serialize`](crate::Message::as_serialize)) are cached, keyed
/// by type key, caller identity and JSON payload. Only successes are stored.
///
/// The cache answers without consulting anything registered inside it, so
/// it must sit inside every policy of the query chain.
/// [`BusBuilder::with_standard_middlewares`](crate::BusBuilder::with_standard_middlewares)
/// takes care of that, and pairs it with a [`CacheInvalidationMiddleware`]
/// on commands and events.
///
/// `capacity` is a soft bound: concurrent inserts may overshoot it briefly
/// before eviction catches up.
pub struct CacheMiddleware {
    entries: DashMap<String, Response>,
    capacity: usize,
    generation: AtomicU64,
}

impl CacheMiddleware {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity.min(1024)),
            capacity,
            generation: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.capacity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every cached response, e.g. after a command changed state.
    ///
    /// Queries already running when this is called do not store their
    /// result.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.clear();
    }

    fn cache_key(envelope: &Envelope) -> Option<String> {
        if envelope.kind() != MessageKind::Query {
            return None;
        }
        let payload = envelope.message().payload()?;
        let key = (
            envelope.key().as_str(),
            envelope.context().caller(),
            payload,
        );
        match serde_json::to_string(&key) {
            Ok(json) => Some(json),
            Err(err) => {
                warn!(message = %envelope.key(), error = %err, "query payload not serializable, bypassing cache");
                None
            }
        }
    }

    fn store(&self, key: String, response: Response) {
        if self.capacity == 0 {
            return;
        }
        self.entries.insert(key.clone(), response);

        while self.entries.len() > self.capacity {
            let victim = self
                .entries
                .iter()
                .find(|entry| entry.key() != &key)
                .map(|entry| entry.key().clone());
            match victim {
                Some(victim) => {
                    self.entries.remove(&victim);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl Middleware for CacheMiddleware {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn dispatch(&self, envelope: Envelope, next: Next<'_>) -> Result<Response> {
        let Some(key) = Self::cache_key(&envelope) else {
            return next.run(envelope).await;
        };

        let cached = self.entries.get(&key).map(|entry| entry.value().clone());
        if let Some(response) = cached {
            trace!(cache_key = %key, "cache hit");
            return Ok(response);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let response = next.run(envelope).await?;
        if response.is_success() && self.generation.load(Ordering::SeqCst) == generation {
            self.store(key.clone(), response.clone());
            // clear() raced with the insert.
            if self.generation.load(Ordering::SeqCst) != generation {
                self.entries.remove(&key);
            }
        }
        Ok(response)
    }
}

/// Clears a [`CacheMiddleware`] after every successful dispatch it wraps.
///
/// Register it on the kinds whose handlers write state.
pub struct CacheInvalidationMiddleware {
    cache: Arc<CacheMiddleware>,
}

impl CacheInvalidationMiddleware {
    pub fn new(cache: Arc<CacheMiddleware>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Middleware for CacheInvalidationMiddleware {
    fn name(&self) -> &'static str {
        "cache-invalidation"
    }

    async fn dispatch(&self, envelope: Envelope, next: Next<'_>) -> Result<Response> {
        let key = envelope.key();
        let response = next.run(envelope).await?;
        if response.is_success() {
            debug!(message = %key, dropped = self.cache.len(), "invalidating query cache");
            self.cache.clear();
        }
        Ok(response)
    }
}
