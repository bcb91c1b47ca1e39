use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinSet;

use crate::error::{Error, RejectReason, Result};
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::stage::{Outlet, Stage, StageContext};

/// Completion state shared by every stage of one pipeline.
pub(crate) struct Shared {
    /// Child of the caller's token; cancelled on the first fault.
    pub(crate) cancel: CancelToken,
    fault: Mutex<Option<Error>>,
}

impl Shared {
    pub(crate) fn new(cancel: &CancelToken) -> Arc<Self> {
        Arc::new(Self {
            cancel: cancel.child(),
            fault: Mutex::new(None),
        })
    }

    /// Records `error` if it is the first fault, then stops the pipeline.
    ///
    /// A rejection only counts as fallout once the pipeline is already
    /// stopped. Recorded before that, it stands until a real fault replaces
    /// it: a faulting stage closes its queue before reporting, so upstream
    /// may see the rejection first.
    pub(crate) fn fault(&self, stage: &'static str, error: Error) {
        let rejected = error.root().is_rejected();
        if rejected && self.cancel.is_cancelled() {
            #[cfg(feature = "tracing")]
            tracing::event!(tracing::Level::INFO, event = "flowpipe.downstream.closed", stage = stage, "flowpipe.downstream.closed");
            return;
        }

        let mut slot = self.fault.lock();
        let replace = match slot.as_ref() {
            None => true,
            Some(recorded) => recorded.root().is_rejected() && !rejected,
        };
        if replace {
            #[cfg(feature = "tracing")]
            tracing::event!(tracing::Level::ERROR, event = "flowpipe.fault", stage = stage, error = %error, "flowpipe.fault");
            *slot = Some(error.in_stage(stage));
        } else {
            #[cfg(feature = "tracing")]
            tracing::event!(tracing::Level::DEBUG, event = "flowpipe.fault.swallowed", stage = stage, error = %error, "flowpipe.fault.swallowed");
        }
        drop(slot);

        self.cancel.cancel();
    }

    pub(crate) fn is_faulted(&self) -> bool {
        self.fault.lock().is_some()
    }

    pub(crate) fn reject_reason(&self) -> RejectReason {
        if self.is_faulted() {
            RejectReason::Faulted
        } else if self.cancel.is_cancelled() {
            RejectReason::Cancelled
        } else {
            RejectReason::Completed
        }
    }

    fn outcome(&self) -> Result<()> {
        if let Some(fault) = self.fault.lock().take() {
            return Err(fault);
        }
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

/// Backpressured hand-off into a bounded queue.
///
/// Suspends while the queue is full. Fails fast once the pipeline stops, or
/// with [`Error::Cancelled`] when the caller's own token fires first.
pub(crate) async fn offer<T>(
    tx: &Sender<T>,
    item: T,
    shared: &Shared,
    call: Option<&CancelToken>,
) -> Result<()> {
    let call_cancelled = async {
        match call {
            Some(token) => token.cancelled().await,
            None => std::future::pending::<()>().await,
        }
    };

    let rejected = tokio::select! {
        biased;
        _ = shared.cancel.cancelled() => shared.reject_reason(),
        _ = call_cancelled => return Err(Error::Cancelled),
        sent = tx.send(item) => match sent {
            Ok(()) => return Ok(()),
            Err(_) => shared.reject_reason(),
        },
    };

    #[cfg(feature = "tracing")]
    tracing::event!(tracing::Level::DEBUG, event = "flowpipe.send.rejected", reason = %rejected, "flowpipe.send.rejected");
    Err(Error::Rejected(rejected))
}

/// A linked stage waiting to be spawned by `build()`.
pub(crate) struct StageTask {
    name: &'static str,
    future: BoxFuture<'static, ()>,
}

impl StageTask {
    pub(crate) fn new<I, O, S>(
        stage: S,
        input: Receiver<I>,
        output: Outlet<O>,
        ctx: StageContext,
    ) -> Self
    where
        I: Send + 'static,
        O: Send + 'static,
        S: Stage<I, O> + 'static,
    {
        let run_ctx = ctx.clone();
        Self::from_future(ctx, async move { stage.process(input, output, run_ctx).await })
    }

    /// Wraps a stage body so its error or panic becomes the pipeline's fault.
    pub(crate) fn from_future<F>(ctx: StageContext, body: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let name = ctx.name();
        let shared = Arc::clone(&ctx.shared);
        let future = async move {
            match AssertUnwindSafe(body).catch_unwind().await {
                Ok(Ok(())) => {
                    #[cfg(feature = "tracing")]
                    tracing::event!(tracing::Level::DEBUG, event = "flowpipe.stage.completed", stage = name, "flowpipe.stage.completed");
                }
                Ok(Err(error)) => shared.fault(name, error),
                Err(panic) => shared.fault(
                    name,
                    Error::Panicked {
                        stage: name,
                        message: panic_message(panic.as_ref()),
                    },
                ),
            }
        }
        .boxed();

        Self { name, future }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Entry point of a single-source pipeline.
pub struct Source<T> {
    pub(crate) tx: Sender<T>,
}

/// A built, running pipeline.
///
/// `E` is the entry point: [`Source`] for pipelines built with
/// [`from_source`](crate::pipeline::chain::from_source), and
/// [`DualSource`](crate::pipeline::join::DualSource) for
/// [`from_sources`](crate::pipeline::chain::from_sources).
pub struct Pipeline<E> {
    pub(crate) entry: E,
    pub(crate) shared: Arc<Shared>,
    stages: Vec<&'static str>,
    tasks: JoinSet<()>,
}

impl<E> Pipeline<E> {
    pub(crate) fn launch(entry: E, shared: Arc<Shared>, stages: Vec<StageTask>) -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|_| Error::build("build() must be called within a Tokio runtime"))?;

        let mut names = Vec::with_capacity(stages.len());
        let mut tasks = JoinSet::new();
        for stage in stages {
            names.push(stage.name);

            #[cfg(feature = "tracing")]
            let future = {
                use tracing::Instrument;
                let span = tracing::info_span!("flowpipe.stage", stage = stage.name);
                stage.future.instrument(span)
            };
            #[cfg(not(feature = "tracing"))]
            let future = stage.future;

            tasks.spawn_on(future, &handle);
        }

        Ok(Self {
            entry,
            shared,
            stages: names,
            tasks,
        })
    }

    /// Stage names in chain order, entry first.
    pub fn stage_names(&self) -> &[&'static str] {
        &self.stages
    }

    pub fn is_faulted(&self) -> bool {
        self.shared.is_faulted()
    }

    /// Stops every stage. Pending and later sends are rejected and
    /// [`complete`](Self::complete) fails with [`Error::Cancelled`].
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.shared.cancel
    }

    /// Closes every entry point and waits for all stages to drain.
    ///
    /// Fails with the first fault recorded by any stage, or with
    /// [`Error::Cancelled`] if the pipeline was cancelled without a fault.
    pub async fn complete(self) -> Result<()> {
        let Self {
            entry,
            shared,
            mut tasks,
            ..
        } = self;
        drop(entry);

        while let Some(joined) = tasks.join_next().await {
            if let Err(error) = joined {
                shared.fault("pipeline", Error::Join(error));
            }
        }
        shared.outcome()
    }
}

impl<T: Send + 'static> Pipeline<Source<T>> {
    /// Offers `item` to the head stage, suspending while its queue is full.
    pub async fn send(&self, item: T) -> Result<()> {
        offer(&self.entry.tx, item, &self.shared, None).await
    }

    /// Like [`send`](Self::send), but gives up with [`Error::Cancelled`]
    /// once `cancel` fires. The pipeline itself keeps running.
    pub async fn send_with_cancel(&self, item: T, cancel: &CancelToken) -> Result<()> {
        offer(&self.entry.tx, item, &self.shared, Some(cancel)).await
    }
}
