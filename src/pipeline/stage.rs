use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::error::Result;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::config::StageOptions;
use crate::pipeline::runtime::{offer, Shared};

/// One processing step of a pipeline.
///
/// `process` owns the stage's input queue for the lifetime of the pipeline.
/// It returns once the queue is closed and drained (completion), once the
/// pipeline is cancelled, or with the error that faults the pipeline.
/// Returning drops the stage's [`Outlet`], which completes the next stage.
#[async_trait]
pub trait Stage<I: Send + 'static, O: Send + 'static>: Send + Sync {
    fn stage_name(&self) -> &'static str {
        "stage"
    }

    /// Checked by the builder; an error here fails `build()`.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    async fn process(
        &self,
        input: Receiver<I>,
        output: Outlet<O>,
        ctx: StageContext,
    ) -> Result<()>;
}

/// Sending half of the downstream stage's queue.
///
/// [`Outlet::send`] suspends while the downstream queue is full and fails
/// with [`Error::Rejected`](crate::error::Error::Rejected) once the pipeline
/// has stopped. A terminal outlet accepts and discards everything.
pub struct Outlet<O> {
    tx: Option<Sender<O>>,
    shared: Arc<Shared>,
}

impl<O: Send + 'static> Outlet<O> {
    pub(crate) fn new(tx: Sender<O>, shared: Arc<Shared>) -> Self {
        Self {
            tx: Some(tx),
            shared,
        }
    }

    pub(crate) fn terminal(shared: Arc<Shared>) -> Self {
        Self { tx: None, shared }
    }

    pub async fn send(&self, item: O) -> Result<()> {
        match &self.tx {
            Some(tx) => offer(tx, item, &self.shared, None).await,
            None => Ok(()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.tx.is_none()
    }
}

impl<O> Clone for Outlet<O> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Per-stage view of the pipeline: configuration plus the shared
/// cancellation signal.
#[derive(Clone)]
pub struct StageContext {
    name: &'static str,
    options: StageOptions,
    pub(crate) shared: Arc<Shared>,
}

impl StageContext {
    pub(crate) fn new(options: StageOptions, shared: Arc<Shared>) -> Self {
        Self {
            name: options.stage_name().unwrap_or("stage"),
            options,
            shared,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.options.capacity()
    }

    pub fn parallelism(&self) -> usize {
        self.options.parallelism()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.shared.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Next queued item, or `None` once the queue is closed and drained or
    /// the pipeline stopped.
    pub async fn recv<I>(&self, input: &mut Receiver<I>) -> Option<I> {
        tokio::select! {
            biased;
            _ = self.shared.cancel.cancelled() => {
                #[cfg(feature = "tracing")]
                tracing::event!(tracing::Level::DEBUG, event = "flowpipe.cancelled", stage = self.name, where_ = "recv", "flowpipe.cancelled");
                None
            },
            item = input.recv() => item,
        }
    }
}
