//! Reusable authorization and precondition checks.
//!
//! A policy answers with a value: `Ok(output)` when the check passes,
//! `Err(PolicyDenied)` when it does not. The outer `anyhow::Result` is
//! reserved for infrastructure problems, such as a permission store that
//! cannot be reached.
//!
//! Policies are not registered with the bus. Handlers receive them as
//! constructor dependencies, or the bus gates a whole chain with
//! [`PolicyMiddleware`](crate::PolicyMiddleware).

use crate::core::{Envelope, MessageContext};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

/// Reason a policy refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("policy denied: {reason}")]
pub struct PolicyDenied {
    reason: String,
}

impl PolicyDenied {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

pub type PolicyResult<T> = std::result::Result<T, PolicyDenied>;

#[async_trait]
pub trait Policy<I: ?Sized + Sync>: Send + Sync + 'static {
    /// Value produced when the check passes, e.g. the authorized principal.
    type Output: Send;

    async fn verify(&self, input: &I) -> Result<PolicyResult<Self::Output>>;

    /// Require `self` and then `other` to pass.
    fn and<P>(self, other: P) -> And<Self, P>
    where
        Self: Sized,
        P: Policy<I>,
    {
        And {
            first: self,
            second: other,
        }
    }
}

/// Passes everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl<I: ?Sized + Sync> Policy<I> for AllowAll {
    type Output = ();

    async fn verify(&self, _input: &I) -> Result<PolicyResult<()>> {
        Ok(Ok(()))
    }
}

/// Refuses everything with a fixed reason.
#[derive(Debug, Clone)]
pub struct DenyAll {
    reason: String,
}

impl DenyAll {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for DenyAll {
    fn default() -> Self {
        Self::new("denied by policy")
    }
}

#[async_trait]
impl<I: ?Sized + Sync> Policy<I> for DenyAll {
    type Output = ();

    async fn verify(&self, _input: &I) -> Result<PolicyResult<()>> {
        Ok(Err(PolicyDenied::new(self.reason.clone())))
    }
}

/// Passes when the context carries a caller identity, yielding it.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireCaller;

#[async_trait]
impl Policy<MessageContext> for RequireCaller {
    type Output = String;

    async fn verify(&self, ctx: &MessageContext) -> Result<PolicyResult<String>> {
        Ok(ctx
            .caller()
            .map(str::to_owned)
            .ok_or_else(|| PolicyDenied::new("no caller identity on message context")))
    }
}

#[async_trait]
impl Policy<Envelope> for RequireCaller {
    type Output = String;

    async fn verify(&self, envelope: &Envelope) -> Result<PolicyResult<String>> {
        <Self as Policy<MessageContext>>::verify(self, envelope.context()).await
    }
}

/// Adapts a synchronous predicate.
pub struct FnPolicy<F> {
    check: F,
}

impl<F> FnPolicy<F> {
    pub fn new(check: F) -> Self {
        Self { check }
    }
}

#[async_trait]
impl<I, F> Policy<I> for FnPolicy<F>
where
    I: ?Sized + Sync,
    F: Fn(&I) -> PolicyResult<()> + Send + Sync + 'static,
{
    type Output = ();

    async fn verify(&self, input: &I) -> Result<PolicyResult<()>> {
        Ok((self.check)(input))
    }
}

/// Both policies must pass; the second is not consulted after a denial.
#[derive(Debug, Clone)]
pub struct And<A, B> {
    first: A,
    second: B,
}

#[async_trait]
impl<I, A, B> Policy<I> for And<A, B>
where
    I: ?Sized + Sync,
    A: Policy<I>,
    B: Policy<I>,
{
    type Output = (A::Output, B::Output);

    async fn verify(&self, input: &I) -> Result<PolicyResult<Self::Output>> {
        let first = match self.first.verify(input).await? {
            Ok(output) => output,
            Err(denied) => return Ok(Err(denied)),
        };
        let second = match self.second.verify(input).await? {
            Ok(output) => output,
            Err(denied) => return Ok(Err(denied)),
        };
        Ok(Ok((first, second)))
    }
}
