use flowpipe::error::{Error, Result};
use flowpipe::pipeline::cancel::CancelToken;
use flowpipe::pipeline::chain::from_source;
use flowpipe::pipeline::config::StageOptions;

mod common;
use common::{collected, snapshot, CollectSink};

async fn run_batches(items: u32, size: usize) -> Result<Vec<Vec<u32>>> {
    let out = collected();
    let pipeline = from_source::<u32>(2, CancelToken::new())
        .batch(size)
        .sink(CollectSink::new(out.clone()), StageOptions::new())
        .build()?;

    for i in 0..items {
        pipeline.send(i).await?;
    }
    pipeline.complete().await?;
    Ok(snapshot(&out))
}

#[tokio::test]
async fn full_batches_in_arrival_order_and_remainder_dropped() -> Result<()> {
    let batches = run_batches(10, 3).await?;
    assert_eq!(batches, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8]]);
    Ok(())
}

#[tokio::test]
async fn exact_multiple_leaves_nothing_behind() -> Result<()> {
    let batches = run_batches(8, 4).await?;
    assert_eq!(batches, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);
    Ok(())
}

#[tokio::test]
async fn fewer_items_than_size_emit_nothing() -> Result<()> {
    assert!(run_batches(4, 5).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn batch_of_one_wraps_each_item() -> Result<()> {
    let batches = run_batches(3, 1).await?;
    assert_eq!(batches, vec![vec![0], vec![1], vec![2]]);
    Ok(())
}

#[tokio::test]
async fn batches_feed_downstream_workers() -> Result<()> {
    let out = collected();
    let pipeline = from_source::<u32>(4, CancelToken::new())
        .batch(5)
        .process(|batch| Ok(batch.iter().sum::<u32>()), 1)
        .sink(CollectSink::new(out.clone()), StageOptions::new())
        .build()?;

    for i in 1..=10 {
        pipeline.send(i).await?;
    }
    pipeline.complete().await?;

    assert_eq!(snapshot(&out), vec![15, 40]);
    Ok(())
}

#[tokio::test]
async fn zero_batch_size_fails_build() {
    let result = from_source::<u32>(1, CancelToken::new())
        .batch(0)
        .to_target(|_| Ok(()), 1)
        .build();

    match result {
        Err(Error::Build { context }) => assert!(context.contains("batch size")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("zero batch size must not build"),
    }
}
