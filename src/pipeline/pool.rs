use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc::Receiver;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::error::Result;
use crate::pipeline::stage::StageContext;

impl StageContext {
    /// Runs `work` on every queued item with up to `parallelism` concurrent
    /// workers, each on its own task.
    ///
    /// Workers take items in FIFO order. With a single worker outputs keep
    /// input order; with more, completion order decides. The first worker
    /// error aborts the siblings and is returned.
    pub async fn for_each_concurrent<I, W, Fut>(&self, input: Receiver<I>, work: W) -> Result<()>
    where
        I: Send + 'static,
        W: Fn(I) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let input = Arc::new(Mutex::new(input));
        if self.parallelism() <= 1 {
            return worker(input, self.clone(), work).await;
        }

        let mut workers = JoinSet::new();
        for _ in 0..self.parallelism() {
            let run = worker(Arc::clone(&input), self.clone(), work.clone());
            #[cfg(feature = "tracing")]
            let run = tracing::Instrument::in_current_span(run);
            workers.spawn(run);
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(done) => done?,
                // Re-raised so the stage task reports it as a panic.
                Err(error) if error.is_panic() => std::panic::resume_unwind(error.into_panic()),
                Err(error) => return Err(error.into()),
            }
        }
        Ok(())
    }
}

async fn worker<I, W, Fut>(input: Arc<Mutex<Receiver<I>>>, ctx: StageContext, work: W) -> Result<()>
where
    W: Fn(I) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.cancel_token().cancelled() => None,
            next = async { input.lock().await.recv().await } => next,
        };
        let Some(item) = next else { break };

        tokio::select! {
            biased;
            _ = ctx.cancel_token().cancelled() => {
                #[cfg(feature = "tracing")]
                tracing::event!(tracing::Level::DEBUG, event = "flowpipe.cancelled", stage = ctx.name(), where_ = "work", "flowpipe.cancelled");
                break
            },
            done = work(item) => done?,
        }
    }
    Ok(())
}
