use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::Receiver;

use crate::error::Result;
use crate::pipeline::stage::{Outlet, Stage, StageContext};

/// transform: I -> O
pub struct Transform<F> {
    f: Arc<F>,
}

impl<F> Transform<F> {
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

#[async_trait]
impl<I, O, F> Stage<I, O> for Transform<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Result<O> + Send + Sync + 'static,
{
    fn stage_name(&self) -> &'static str {
        "transform"
    }

    async fn process(
        &self,
        input: Receiver<I>,
        output: Outlet<O>,
        ctx: StageContext,
    ) -> Result<()> {
        let f = Arc::clone(&self.f);
        ctx.for_each_concurrent(input, move |item| {
            let f = Arc::clone(&f);
            let output = output.clone();
            async move { output.send((*f)(item)?).await }
        })
        .await
    }
}

/// Async transform: I -> Future<O>
pub struct TransformAsync<F> {
    f: Arc<F>,
}

impl<F> TransformAsync<F> {
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

#[async_trait]
impl<I, O, F, Fut> Stage<I, O> for TransformAsync<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
{
    fn stage_name(&self) -> &'static str {
        "transform_async"
    }

    async fn process(
        &self,
        input: Receiver<I>,
        output: Outlet<O>,
        ctx: StageContext,
    ) -> Result<()> {
        let f = Arc::clone(&self.f);
        ctx.for_each_concurrent(input, move |item| {
            let pending = (*f)(item);
            let output = output.clone();
            async move { output.send(pending.await?).await }
        })
        .await
    }
}

/// transform many: I -> [O]
///
/// Outputs of one item are forwarded in iteration order, each one waiting
/// for room downstream.
pub struct TransformMany<F> {
    f: Arc<F>,
}

impl<F> TransformMany<F> {
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

#[async_trait]
impl<I, O, F, It> Stage<I, O> for TransformMany<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Result<It> + Send + Sync + 'static,
    It: IntoIterator<Item = O> + Send + 'static,
    It::IntoIter: Send + 'static,
{
    fn stage_name(&self) -> &'static str {
        "transform_many"
    }

    async fn process(
        &self,
        input: Receiver<I>,
        output: Outlet<O>,
        ctx: StageContext,
    ) -> Result<()> {
        let f = Arc::clone(&self.f);
        ctx.for_each_concurrent(input, move |item| {
            let produced = (*f)(item);
            let output = output.clone();
            async move {
                for value in produced? {
                    output.send(value).await?;
                }
                Ok(())
            }
        })
        .await
    }
}

/// Async transform many: I -> Future<[O]>
pub struct TransformManyAsync<F> {
    f: Arc<F>,
}

impl<F> TransformManyAsync<F> {
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

#[async_trait]
impl<I, O, F, Fut, It> Stage<I, O> for TransformManyAsync<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<It>> + Send + 'static,
    It: IntoIterator<Item = O> + Send + 'static,
    It::IntoIter: Send + 'static,
{
    fn stage_name(&self) -> &'static str {
        "transform_many_async"
    }

    async fn process(
        &self,
        input: Receiver<I>,
        output: Outlet<O>,
        ctx: StageContext,
    ) -> Result<()> {
        let f = Arc::clone(&self.f);
        ctx.for_each_concurrent(input, move |item| {
            let pending = (*f)(item);
            let output = output.clone();
            async move {
                for value in pending.await? {
                    output.send(value).await?;
                }
                Ok(())
            }
        })
        .await
    }
}

pub struct Filter<P> {
    predicate: Arc<P>,
}

impl<P> Filter<P> {
    pub fn new(predicate: P) -> Self {
        Self {
            predicate: Arc::new(predicate),
        }
    }
}

#[async_trait]
impl<T, P> Stage<T, T> for Filter<P>
where
    T: Send + 'static,
    P: Fn(&T) -> bool + Send + Sync + 'static,
{
    fn stage_name(&self) -> &'static str {
        "filter"
    }

    async fn process(
        &self,
        input: Receiver<T>,
        output: Outlet<T>,
        ctx: StageContext,
    ) -> Result<()> {
        let predicate = Arc::clone(&self.predicate);
        ctx.for_each_concurrent(input, move |item| {
            let keep = (*predicate)(&item);
            let output = output.clone();
            async move {
                if keep {
                    output.send(item).await?;
                }
                Ok(())
            }
        })
        .await
    }
}

/// Terminal stage running a side effect per item.
pub struct Target<F> {
    f: Arc<F>,
}

impl<F> Target<F> {
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

#[async_trait]
impl<I, F> Stage<I, ()> for Target<F>
where
    I: Send + 'static,
    F: Fn(I) -> Result<()> + Send + Sync + 'static,
{
    fn stage_name(&self) -> &'static str {
        "target"
    }

    async fn process(
        &self,
        input: Receiver<I>,
        _output: Outlet<()>,
        ctx: StageContext,
    ) -> Result<()> {
        let f = Arc::clone(&self.f);
        ctx.for_each_concurrent(input, move |item| std::future::ready((*f)(item)))
            .await
    }
}

pub struct TargetAsync<F> {
    f: Arc<F>,
}

impl<F> TargetAsync<F> {
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

#[async_trait]
impl<I, F, Fut> Stage<I, ()> for TargetAsync<F>
where
    I: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn stage_name(&self) -> &'static str {
        "target_async"
    }

    async fn process(
        &self,
        input: Receiver<I>,
        _output: Outlet<()>,
        ctx: StageContext,
    ) -> Result<()> {
        let f = Arc::clone(&self.f);
        ctx.for_each_concurrent(input, move |item| (*f)(item)).await
    }
}
