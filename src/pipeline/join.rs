use parking_lot::Mutex;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::error::{Error, Result};
use crate::pipeline::runtime::{offer, Pipeline, StageTask};
use crate::pipeline::stage::{Outlet, StageContext};

/// Entry points of a two-source pipeline.
///
/// Each side is its own bounded FIFO queue; the join stage pairs the oldest
/// item of one with the oldest item of the other.
pub struct DualSource<A, B> {
    first: Mutex<Option<Sender<A>>>,
    second: Mutex<Option<Sender<B>>>,
}

impl<A, B> DualSource<A, B> {
    pub(crate) fn new(first: Sender<A>, second: Sender<B>) -> Self {
        Self {
            first: Mutex::new(Some(first)),
            second: Mutex::new(Some(second)),
        }
    }
}

pub(crate) fn join_task<A, B>(
    first: Receiver<A>,
    second: Receiver<B>,
    output: Outlet<(A, B)>,
    ctx: StageContext,
) -> StageTask
where
    A: Send + 'static,
    B: Send + 'static,
{
    let run_ctx = ctx.clone();
    StageTask::from_future(ctx, pair_fifo(first, second, output, run_ctx))
}

async fn pair_fifo<A, B>(
    mut first: Receiver<A>,
    mut second: Receiver<B>,
    output: Outlet<(A, B)>,
    ctx: StageContext,
) -> Result<()>
where
    A: Send + 'static,
    B: Send + 'static,
{
    let mut unpaired = 0usize;

    loop {
        let Some(a) = ctx.recv(&mut first).await else {
            break;
        };
        let Some(b) = ctx.recv(&mut second).await else {
            unpaired += 1;
            break;
        };
        output.send((a, b)).await?;
    }

    // One side is done; keep draining the other so its senders never block,
    // until both sides have completed.
    let (left, right) = tokio::join!(drain(&ctx, &mut first), drain(&ctx, &mut second));
    unpaired += left + right;

    if unpaired > 0 && !ctx.is_cancelled() {
        #[cfg(feature = "tracing")]
        tracing::event!(tracing::Level::DEBUG, event = "flowpipe.join.unpaired_dropped", stage = ctx.name(), items = unpaired, "flowpipe.join.unpaired_dropped");
    }
    Ok(())
}

async fn drain<T>(ctx: &StageContext, input: &mut Receiver<T>) -> usize {
    let mut dropped = 0;
    while ctx.recv(input).await.is_some() {
        dropped += 1;
    }
    dropped
}

impl<A, B> Pipeline<DualSource<A, B>>
where
    A: Send + 'static,
    B: Send + 'static,
{
    /// Offers `item` to the first side, suspending while its queue is full.
    pub async fn send1(&self, item: A) -> Result<()> {
        let tx = self.entry.first.lock().clone();
        match tx {
            Some(tx) => offer(&tx, item, &self.shared, None).await,
            None => Err(Error::Rejected(self.shared.reject_reason())),
        }
    }

    /// Offers `item` to the second side, suspending while its queue is full.
    pub async fn send2(&self, item: B) -> Result<()> {
        let tx = self.entry.second.lock().clone();
        match tx {
            Some(tx) => offer(&tx, item, &self.shared, None).await,
            None => Err(Error::Rejected(self.shared.reject_reason())),
        }
    }

    /// Closes the first side. The join keeps pairing whatever is already
    /// queued and completes once the second side is closed too.
    pub fn complete1(&self) {
        self.entry.first.lock().take();
    }

    /// Closes the second side.
    pub fn complete2(&self) {
        self.entry.second.lock().take();
    }
}
