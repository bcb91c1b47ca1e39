use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::pipeline::adapters::{
    Filter, Target, TargetAsync, Transform, TransformAsync, TransformMany, TransformManyAsync,
};
use crate::pipeline::batch::Batch;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::config::StageOptions;
use crate::pipeline::group::Group;
use crate::pipeline::join::{join_task, DualSource};
use crate::pipeline::runtime::{Pipeline, Shared, Source, StageTask};
use crate::pipeline::stage::{Outlet, Stage, StageContext};

/// The last stage added so far, waiting for its downstream outlet.
type Link<T> = Box<dyn FnOnce(Outlet<T>) -> StageTask + Send>;

/// Starts a single-source pipeline whose entry queue holds `buffer_size`
/// items. Cancelling `cancel` stops the built pipeline.
pub fn from_source<T: Send + 'static>(
    buffer_size: usize,
    cancel: CancelToken,
) -> PipelineBuilder<Source<T>, T> {
    PipelineBuilder::from_source(buffer_size, cancel)
}

/// Starts a two-source pipeline whose outputs are `(A, B)` pairs.
pub fn from_sources<A, B>(
    buffer_size: usize,
    cancel: CancelToken,
) -> PipelineBuilder<DualSource<A, B>, (A, B)>
where
    A: Send + 'static,
    B: Send + 'static,
{
    PipelineBuilder::from_sources(buffer_size, cancel)
}

/// Fluent, typed chain of stages.
///
/// `E` is the entry point handed to the built [`Pipeline`] and `T` the item
/// type produced by the last stage. Each operator consumes the builder and
/// returns one whose `T` is the new stage's output, so adjacent stages can
/// only be linked when their item types agree. Invalid options are reported
/// by [`TerminalBuilder::build`].
pub struct PipelineBuilder<E, T> {
    entry: E,
    shared: Arc<Shared>,
    stages: Vec<StageTask>,
    open: Link<T>,
    invalid: Option<Error>,
}

impl<T: Send + 'static> PipelineBuilder<Source<T>, T> {
    pub fn from_source(buffer_size: usize, cancel: CancelToken) -> Self {
        let shared = Shared::new(&cancel);
        let options = StageOptions::parallel(1)
            .bounded_capacity(buffer_size)
            .name("source");
        let invalid = options.validate().err();

        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        let ctx = StageContext::new(options, Arc::clone(&shared));
        Self {
            entry: Source { tx },
            shared,
            stages: Vec::new(),
            open: Box::new(move |outlet| {
                StageTask::new(Transform::new(Ok::<T, Error>), rx, outlet, ctx)
            }),
            invalid,
        }
    }
}

impl<A, B> PipelineBuilder<DualSource<A, B>, (A, B)>
where
    A: Send + 'static,
    B: Send + 'static,
{
    pub fn from_sources(buffer_size: usize, cancel: CancelToken) -> Self {
        let shared = Shared::new(&cancel);
        let options = StageOptions::parallel(1)
            .bounded_capacity(buffer_size)
            .name("join");
        let invalid = options.validate().err();

        let (first_tx, first_rx) = mpsc::channel(buffer_size.max(1));
        let (second_tx, second_rx) = mpsc::channel(buffer_size.max(1));
        let ctx = StageContext::new(options, Arc::clone(&shared));
        Self {
            entry: DualSource::new(first_tx, second_tx),
            shared,
            stages: Vec::new(),
            open: Box::new(move |outlet| join_task(first_rx, second_rx, outlet, ctx)),
            invalid,
        }
    }
}

impl<E, T: Send + 'static> PipelineBuilder<E, T> {
    /// Links `stage` with explicit queue depth, worker count and name.
    pub fn pipe<O, S>(self, stage: S, options: StageOptions) -> PipelineBuilder<E, O>
    where
        O: Send + 'static,
        S: Stage<T, O> + 'static,
    {
        let Self {
            entry,
            shared,
            mut stages,
            open,
            mut invalid,
        } = self;

        let options = options.or_name(stage.stage_name());
        if invalid.is_none() {
            invalid = stage.validate().and_then(|()| options.validate()).err();
        }

        let (tx, rx) = mpsc::channel(options.capacity().max(1));
        stages.push(open(Outlet::new(tx, Arc::clone(&shared))));

        let ctx = StageContext::new(options, Arc::clone(&shared));
        PipelineBuilder {
            entry,
            shared,
            stages,
            open: Box::new(move |outlet| StageTask::new(stage, rx, outlet, ctx)),
            invalid,
        }
    }

    pub fn process<O, F>(self, f: F, parallelism: usize) -> PipelineBuilder<E, O>
    where
        O: Send + 'static,
        F: Fn(T) -> Result<O> + Send + Sync + 'static,
    {
        self.pipe(Transform::new(f), StageOptions::parallel(parallelism))
    }

    pub fn process_async<O, F, Fut>(self, f: F, parallelism: usize) -> PipelineBuilder<E, O>
    where
        O: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        self.pipe(TransformAsync::new(f), StageOptions::parallel(parallelism))
    }

    pub fn process_many<O, F, It>(self, f: F, parallelism: usize) -> PipelineBuilder<E, O>
    where
        O: Send + 'static,
        F: Fn(T) -> Result<It> + Send + Sync + 'static,
        It: IntoIterator<Item = O> + Send + 'static,
        It::IntoIter: Send + 'static,
    {
        self.pipe(TransformMany::new(f), StageOptions::parallel(parallelism))
    }

    pub fn process_many_async<O, F, Fut, It>(
        self,
        f: F,
        parallelism: usize,
    ) -> PipelineBuilder<E, O>
    where
        O: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<It>> + Send + 'static,
        It: IntoIterator<Item = O> + Send + 'static,
        It::IntoIter: Send + 'static,
    {
        self.pipe(
            TransformManyAsync::new(f),
            StageOptions::parallel(parallelism),
        )
    }

    pub fn filter<P>(self, predicate: P, parallelism: usize) -> PipelineBuilder<E, T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.pipe(Filter::new(predicate), StageOptions::parallel(parallelism))
    }

    /// Groups consecutive items into `Vec`s of exactly `size`. The queue
    /// holds one batch worth of items.
    pub fn batch(self, size: usize) -> PipelineBuilder<E, Vec<T>> {
        let options = StageOptions::new().bounded_capacity(size);
        self.pipe(Batch::new(size), options)
    }

    /// Emits the items sharing a key once `threshold` of them arrived.
    pub fn group<K, F>(self, key: F, threshold: usize) -> PipelineBuilder<E, Vec<T>>
    where
        K: Eq + Hash + Send + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        let options = StageOptions::new().bounded_capacity(threshold);
        self.pipe(Group::new(key, threshold), options)
    }

    /// Terminates the chain with a custom stage. Anything it outputs is
    /// discarded.
    pub fn sink<O, S>(self, stage: S, options: StageOptions) -> TerminalBuilder<E>
    where
        O: Send + 'static,
        S: Stage<T, O> + 'static,
    {
        let PipelineBuilder {
            entry,
            shared,
            mut stages,
            open,
            invalid,
        } = self.pipe(stage, options);

        stages.push(open(Outlet::terminal(Arc::clone(&shared))));
        TerminalBuilder {
            entry,
            shared,
            stages,
            invalid,
        }
    }

    pub fn to_target<F>(self, f: F, parallelism: usize) -> TerminalBuilder<E>
    where
        F: Fn(T) -> Result<()> + Send + Sync + 'static,
    {
        self.sink(Target::new(f), StageOptions::parallel(parallelism))
    }

    pub fn to_target_async<F, Fut>(self, f: F, parallelism: usize) -> TerminalBuilder<E>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.sink(TargetAsync::new(f), StageOptions::parallel(parallelism))
    }
}

/// A chain closed by a sink, ready to [`build`](Self::build).
pub struct TerminalBuilder<E> {
    entry: E,
    shared: Arc<Shared>,
    stages: Vec<StageTask>,
    invalid: Option<Error>,
}

impl<E> TerminalBuilder<E> {
    /// Validates the chain and spawns one task per stage on the current
    /// Tokio runtime.
    pub fn build(self) -> Result<Pipeline<E>> {
        if let Some(error) = self.invalid {
            return Err(error);
        }
        Pipeline::launch(self.entry, self.shared, self.stages)
    }
}
