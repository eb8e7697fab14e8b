//! Error types.
//!
//! Everything here is a fault or a wiring failure. Expected business
//! outcomes are [`Response`](crate::Response) values instead.

use crate::core::TypeKey;
use std::path::PathBuf;
use thiserror::Error;

/// Registration failures. Only raised while wiring.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("a handler is already registered for message type `{0}`")]
    DuplicateHandler(TypeKey),
}

/// Faults raised by a dispatch call.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No handler is bound to the message's type key. Always a wiring bug.
    #[error("no handler registered for message type `{0}`")]
    HandlerNotFound(TypeKey),

    /// A handler or middleware failed without translating the failure into
    /// an error response.
    #[error("dispatch of `{key}` faulted: {source}")]
    MiddlewareFault {
        key: TypeKey,
        #[source]
        source: anyhow::Error,
    },

    #[error("message bus is shutting down")]
    ShuttingDown,
}

impl DispatchError {
    pub fn is_handler_not_found(&self) -> bool {
        matches!(self, Self::HandlerNotFound(_))
    }

    /// The underlying failure of a [`MiddlewareFault`](Self::MiddlewareFault).
    pub fn fault(&self) -> Option<&anyhow::Error> {
        match self {
            Self::MiddlewareFault { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A handler was handed a message of a different concrete type than the one
/// it was registered for.
///
/// Raised before any middleware runs when two message types share a type
/// key, and by the handler itself when a middleware swapped the message.
#[derive(Debug, Error)]
#[error("handler for `{expected}` ({expected_type}) received a `{found}` ({found_type}) message")]
pub struct MessageTypeMismatch {
    pub expected: TypeKey,
    pub expected_type: &'static str,
    pub found: TypeKey,
    pub found_type: &'static str,
}

/// Startup failures. The bus is never built when one of these occurs.
#[derive(Debug, Error)]
pub enum WiringError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("missing required dependency `{0}`")]
    MissingDependency(&'static str),

    #[error("module `{module}` failed to wire: {source}")]
    Module {
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
