use std::mem;

use async_trait::async_trait;
use tokio::sync::mpsc::Receiver;

use crate::error::{Error, Result};
use crate::pipeline::stage::{Outlet, Stage, StageContext};

/// Fixed-size batching: emits a `Vec` every `size` items, in arrival order.
///
/// Accumulation is single-owner whatever the configured parallelism. A
/// trailing partial batch is discarded when the input completes.
pub struct Batch {
    size: usize,
}

impl Batch {
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

#[async_trait]
impl<T: Send + 'static> Stage<T, Vec<T>> for Batch {
    fn stage_name(&self) -> &'static str {
        "batch"
    }

    fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(Error::build("batch size must be at least 1"));
        }
        Ok(())
    }

    async fn process(
        &self,
        mut input: Receiver<T>,
        output: Outlet<Vec<T>>,
        ctx: StageContext,
    ) -> Result<()> {
        let mut pending = Vec::with_capacity(self.size);

        while let Some(item) = ctx.recv(&mut input).await {
            pending.push(item);
            if pending.len() == self.size {
                let full = mem::replace(&mut pending, Vec::with_capacity(self.size));
                output.send(full).await?;
            }
        }

        if !pending.is_empty() && !ctx.is_cancelled() {
            #[cfg(feature = "tracing")]
            tracing::event!(tracing::Level::DEBUG, event = "flowpipe.batch.partial_dropped", stage = ctx.name(), items = pending.len(), "flowpipe.batch.partial_dropped");
        }
        Ok(())
    }
}
