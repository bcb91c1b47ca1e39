//! Splits lines into words, groups equal words, batches the groups and
//! prints each batch. A custom stage counts what reaches the end.
//!
//! Run with:
//! ```bash
//! RUST_LOG=flowpipe=debug cargo run --example word_batches
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flowpipe::error::{Error, Result};
use flowpipe::prelude::*;
use tokio::sync::mpsc::Receiver;
use tracing_subscriber::EnvFilter;

const TEXT: &[&str] = &[
    "the quick brown fox jumps over the lazy dog",
    "the dog barks and the fox runs",
    "a quick fox is a happy fox",
];

// ── Sink counting the batches it prints ─────────────────────────────────────

struct PrintBatches {
    printed: Arc<AtomicUsize>,
}

#[async_trait]
impl Stage<Vec<Vec<String>>, ()> for PrintBatches {
    fn stage_name(&self) -> &'static str {
        "print_batches"
    }

    async fn process(
        &self,
        mut input: Receiver<Vec<Vec<String>>>,
        _output: Outlet<()>,
        ctx: StageContext,
    ) -> Result<()> {
        while let Some(batch) = ctx.recv(&mut input).await {
            let n = self.printed.fetch_add(1, Ordering::SeqCst) + 1;
            let groups: Vec<String> = batch.iter().map(|group| group.join("+")).collect();
            println!("batch #{n}: {}", groups.join(", "));
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flowpipe=info")),
        )
        .init();

    let printed = Arc::new(AtomicUsize::new(0));
    let pipeline = from_source::<String>(4, CancelToken::new())
        .process_many(
            |line| {
                Ok(line
                    .split_whitespace()
                    .map(str::to_owned)
                    .collect::<Vec<_>>())
            },
            1,
        )
        .process_async(
            |word| async move {
                // Simulates a lookup per word.
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok::<_, Error>(word.to_lowercase())
            },
            4,
        )
        .group(|word| word.clone(), 2)
        .batch(2)
        .sink(
            PrintBatches {
                printed: printed.clone(),
            },
            StageOptions::new(),
        )
        .build()?;

    println!("stages: {}", pipeline.stage_names().join(" -> "));

    for line in TEXT {
        pipeline.send(line.to_string()).await?;
    }
    pipeline.complete().await?;

    println!("printed {} batches", printed.load(Ordering::SeqCst));
    Ok(())
}
