//! Core message vocabulary: kinds, type keys, erased messages and the
//! context that travels alongside them.

use chrono::{DateTime, Utc};
use std::any::Any;
use std::fmt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ============================================================================
// MessageKind
// ============================================================================

/// The category a message belongs to.
///
/// Middleware chains are registered per kind, so every command shares one
/// chain, every query another, and every event a third.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    /// Intent to change state.
    Command,
    /// Request to read state.
    Query,
    /// Notification that something happened.
    Event,
}

impl MessageKind {
    /// Every kind, in chain-table order.
    pub const ALL: [MessageKind; 3] = [Self::Command, Self::Query, Self::Event];

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Command => 0,
            Self::Query => 1,
            Self::Event => 2,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Query => "query",
            Self::Event => "event",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TypeKey
// ============================================================================

/// Registry lookup key for a message type.
///
/// Derived from the concrete type name with the leading module path removed,
/// so `billing::commands::ChargeCard` becomes `ChargeCard` and
/// `tick::Tick<7>` becomes `Tick<7>`. Generic arguments are kept, which
/// keeps distinct instantiations of one generic message apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(&'static str);

impl TypeKey {
    /// Use an explicit key instead of the derived one.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Derive the key for `T` from its type name.
    pub fn of<T: ?Sized>() -> Self {
        Self(short_type_name(std::any::type_name::<T>()))
    }

    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Strip the module path of the outermost type, leaving generic arguments
/// untouched.
fn short_type_name(full: &'static str) -> &'static str {
    let head_end = full.find('<').unwrap_or(full.len());
    match full[..head_end].rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

// ============================================================================
// Message
// ============================================================================

/// A dispatchable, immutable value.
///
/// Implement it by hand or with the [`message!`](crate::message) macro:
///
/// ```ignore
/// #[derive(Debug, Clone, Serialize)]
/// struct Ping { value: String }
///
/// switchyard_core::message!(Ping: Query, serializable);
/// ```
pub trait Message: Send + Sync + 'static {
    /// Category used to pick the middleware chain.
    const KIND: MessageKind;

    /// Registry key. Override only when two message types would otherwise
    /// share a short name.
    fn type_key() -> TypeKey
    where
        Self: Sized,
    {
        TypeKey::of::<Self>()
    }

    /// Serializable view of the payload, used for cache keys and trace logs.
    ///
    /// Messages that derive `Serialize` can opt in with
    /// [`serializable!`](crate::serializable).
    fn as_serialize(&self) -> Option<&dyn erased_serde::Serialize> {
        None
    }
}

/// Object-safe view of a [`Message`].
///
/// Every `Message` is an `AnyMessage` through a blanket impl; transports that
/// only hold erased messages dispatch them through
/// [`MessageBus::dispatch_any`](crate::MessageBus::dispatch_any).
pub trait AnyMessage: Send + Sync + 'static {
    fn kind(&self) -> MessageKind;
    fn key(&self) -> TypeKey;
    /// Full `std::any::type_name` of the concrete message.
    fn type_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
    fn payload(&self) -> Option<&dyn erased_serde::Serialize>;
}

impl<M: Message> AnyMessage for M {
    fn kind(&self) -> MessageKind {
        M::KIND
    }

    fn key(&self) -> TypeKey {
        M::type_key()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<M>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }

    fn payload(&self) -> Option<&dyn erased_serde::Serialize> {
        Message::as_serialize(self)
    }
}

impl dyn AnyMessage {
    /// Borrow the concrete message if it is an `M`.
    pub fn downcast_ref<M: Message>(&self) -> Option<&M> {
        self.as_any().downcast_ref::<M>()
    }

    pub fn is<M: Message>(&self) -> bool {
        self.as_any().is::<M>()
    }
}

impl fmt::Debug for dyn AnyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyMessage")
            .field("kind", &self.kind())
            .field("key", &self.key())
            .finish()
    }
}

// ============================================================================
// MessageContext
// ============================================================================

/// Identifier tying together everything done on behalf of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for CorrelationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Side channel passed with a message through every middleware and into the
/// handler.
///
/// The bus never inspects or modifies it. Cancellation is cooperative:
/// handlers and middlewares check [`is_cancelled`](Self::is_cancelled).
#[derive(Debug, Clone)]
pub struct MessageContext {
    correlation_id: CorrelationId,
    caller: Option<String>,
    issued_at: DateTime<Utc>,
    cancellation: CancellationToken,
}

impl MessageContext {
    pub fn new() -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            caller: None,
            issued_at: Utc::now(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Attach the identity of whoever issued the message.
    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = Some(caller.into());
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<CorrelationId>) -> Self {
        self.correlation_id = id.into();
        self
    }

    /// Share a cancellation token owned by the caller.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn caller(&self) -> Option<&str> {
        self.caller.as_deref()
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl Default for MessageContext {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// A message and its context on their way through the middleware chain.
#[derive(Debug)]
pub struct Envelope {
    message: Box<dyn AnyMessage>,
    context: MessageContext,
}

impl Envelope {
    pub fn new<M: Message>(message: M, context: MessageContext) -> Self {
        Self::from_boxed(Box::new(message), context)
    }

    pub fn from_boxed(message: Box<dyn AnyMessage>, context: MessageContext) -> Self {
        Self { message, context }
    }

    pub fn message(&self) -> &dyn AnyMessage {
        self.message.as_ref()
    }

    pub fn context(&self) -> &MessageContext {
        &self.context
    }

    pub fn kind(&self) -> MessageKind {
        self.message.kind()
    }

    pub fn key(&self) -> TypeKey {
        self.message.key()
    }

    /// Replace the message, keeping the context.
    ///
    /// The handler was resolved from the original key; a replacement of a
    /// different type makes the dispatch fault.
    pub fn with_message<M: Message>(self, message: M) -> Self {
        Self {
            message: Box::new(message),
            context: self.context,
        }
    }

    pub fn into_parts(self) -> (Box<dyn AnyMessage>, MessageContext) {
        (self.message, self.context)
    }
}
