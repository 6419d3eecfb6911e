// src/health/probe.rs
use super::context::CheckContext;
use super::status::ComponentStatus;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Something that can report the health of one dependency.
///
/// Implementations must never fail out of band: any error is reported as a
/// `DOWN` status carrying an `err` detail.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self, ctx: &CheckContext) -> ComponentStatus;
}

#[async_trait]
impl<P> Probe for Arc<P>
where
    P: Probe + ?Sized,
{
    async fn check(&self, ctx: &CheckContext) -> ComponentStatus {
        (**self).check(ctx).await
    }
}

/// Adapts a closure into a [`Probe`].
pub struct FnProbe<F> {
    f: F,
}

impl<F, Fut> FnProbe<F>
where
    F: Fn(CheckContext) -> Fut + Send + Sync,
    Fut: Future<Output = ComponentStatus> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Probe for FnProbe<F>
where
    F: Fn(CheckContext) -> Fut + Send + Sync,
    Fut: Future<Output = ComponentStatus> + Send + 'static,
{
    async fn check(&self, ctx: &CheckContext) -> ComponentStatus {
        (self.f)(ctx.clone()).await
    }
}
