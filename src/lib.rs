//! # flowpipe
//!
//! **Typed, bounded, concurrent dataflow pipelines on Tokio.**
//!
//! `flowpipe` assembles multi-stage pipelines from independently typed and
//! independently concurrent stages. A pipeline is declared once with a fluent
//! builder, then fed item by item and finally drained.
//!
//! ---
//!
//! ## Core Model
//!
//! ```text
//! send ─▶ source ─▶ process ─▶ batch ─▶ … ─▶ target
//! ```
//!
//! Every stage owns a bounded queue and a pool of up to `parallelism`
//! workers. Each stage implements the [`Stage`] trait and forwards its
//! outputs through an [`Outlet`] into the next stage's queue. A full queue
//! suspends the sender; nothing is buffered beyond the configured capacity.
//!
//! ---
//!
//! ## Example
//!
//! ```no_run
//! use flowpipe::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> flowpipe::error::Result<()> {
//!     let pipeline = from_source::<String>(8, CancelToken::new())
//!         .process_many(|line| Ok(line.split_whitespace().map(str::to_owned).collect::<Vec<_>>()), 1)
//!         .filter(|word| word.len() > 3, 1)
//!         .batch(4)
//!         .to_target(|words| {
//!             println!("{words:?}");
//!             Ok(())
//!         }, 1)
//!         .build()?;
//!
//!     pipeline.send("the quick brown fox jumps over the lazy dog".into()).await?;
//!     pipeline.complete().await
//! }
//! ```
//!
//! Two independent sources can be paired FIFO with
//! [`from_sources`](pipeline::chain::from_sources):
//!
//! ```no_run
//! use flowpipe::prelude::*;
//!
//! # async fn demo() -> flowpipe::error::Result<()> {
//! let pipeline = from_sources::<u32, char>(4, CancelToken::new())
//!     .to_target(|(n, c)| {
//!         println!("{n}{c}");
//!         Ok(())
//!     }, 1)
//!     .build()?;
//!
//! pipeline.send1(1).await?;
//! pipeline.send2('a').await?;
//! pipeline.complete().await
//! # }
//! ```
//!
//! ---
//!
//! ## Completion and Faults
//!
//! - `complete()` closes the entry points, waits until every stage drained
//!   in chain order, and resolves with the first fault if any stage failed.
//! - The first worker error (or panic) wins. It stops every stage at its
//!   next suspension point and later `send` calls fail with
//!   [`Error::Rejected`](error::Error::Rejected).
//! - Partial batches, unfilled groups and unpaired join items are discarded
//!   on completion, never flushed.
//!
//! ---
//!
//! ## Cancellation
//!
//! The [`CancelToken`] passed to `from_source` is the parent of the
//! pipeline's own token: cancelling it stops the pipeline, while a fault
//! only cancels the pipeline's child token.
//!
//! ---
//!
//! ## Observability
//!
//! With the default `tracing` feature the crate emits a `flowpipe.stage`
//! span per stage task and events such as `flowpipe.fault`,
//! `flowpipe.fault.swallowed`, `flowpipe.cancelled`,
//! `flowpipe.send.rejected` and `flowpipe.batch.partial_dropped`.
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("flowpipe=debug")
//!     .init();
//! ```
//!
//! ---
//!
//! ## Feature Flags
//!
//! - `tracing` *(default)*: structured spans and events.
//!
//! [`Stage`]: pipeline::stage::Stage
//! [`Outlet`]: pipeline::stage::Outlet
//! [`CancelToken`]: pipeline::cancel::CancelToken

pub mod chunk;
pub mod error;
pub mod pipeline;

pub mod prelude {
    //! Convenient imports for most `flowpipe` users.

    pub use crate::chunk::range::RangeGroupExt;
    pub use crate::error::{Error, RejectReason};
    pub use crate::pipeline::cancel::CancelToken;
    pub use crate::pipeline::chain::{from_source, from_sources, PipelineBuilder, TerminalBuilder};
    pub use crate::pipeline::config::StageOptions;
    pub use crate::pipeline::runtime::Pipeline;
    pub use crate::pipeline::stage::{Outlet, Stage, StageContext};
}
