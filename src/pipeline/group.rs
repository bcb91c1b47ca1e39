use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;

use async_trait::async_trait;
use tokio::sync::mpsc::Receiver;

use crate::error::{Error, Result};
use crate::pipeline::stage::{Outlet, Stage, StageContext};

/// Key-partitioned aggregation.
///
/// Items are appended to the bucket of their key; a bucket is emitted and
/// forgotten as soon as it holds `threshold` items. The bucket map lives on
/// the stage task alone, so configured parallelism does not apply here.
/// Buckets still short of the threshold when the input completes are dropped.
pub struct Group<F> {
    key: F,
    threshold: usize,
}

impl<F> Group<F> {
    pub fn new(key: F, threshold: usize) -> Self {
        Self { key, threshold }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

#[async_trait]
impl<T, K, F> Stage<T, Vec<T>> for Group<F>
where
    T: Send + 'static,
    K: Eq + Hash + Send + 'static,
    F: Fn(&T) -> K + Send + Sync + 'static,
{
    fn stage_name(&self) -> &'static str {
        "group"
    }

    fn validate(&self) -> Result<()> {
        if self.threshold == 0 {
            return Err(Error::build("group threshold must be at least 1"));
        }
        Ok(())
    }

    async fn process(
        &self,
        mut input: Receiver<T>,
        output: Outlet<Vec<T>>,
        ctx: StageContext,
    ) -> Result<()> {
        let mut buckets: HashMap<K, Vec<T>> = HashMap::new();

        while let Some(item) = ctx.recv(&mut input).await {
            let full = match buckets.entry((self.key)(&item)) {
                Entry::Occupied(mut bucket) => {
                    bucket.get_mut().push(item);
                    if bucket.get().len() >= self.threshold {
                        Some(bucket.remove())
                    } else {
                        None
                    }
                }
                Entry::Vacant(slot) => {
                    if self.threshold <= 1 {
                        Some(vec![item])
                    } else {
                        let mut bucket = Vec::with_capacity(self.threshold);
                        bucket.push(item);
                        slot.insert(bucket);
                        None
                    }
                }
            };

            if let Some(group) = full {
                output.send(group).await?;
            }
        }

        if !buckets.is_empty() && !ctx.is_cancelled() {
            #[cfg(feature = "tracing")]
            tracing::event!(
                tracing::Level::DEBUG,
                event = "flowpipe.group.partial_dropped",
                stage = ctx.name(),
                groups = buckets.len(),
                items = buckets.values().map(Vec::len).sum::<usize>(),
                "flowpipe.group.partial_dropped"
            );
        }
        Ok(())
    }
}
