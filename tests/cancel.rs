use std::time::Duration;

use flowpipe::error::{Error, RejectReason, Result};
use flowpipe::pipeline::cancel::CancelToken;
use flowpipe::pipeline::chain::from_source;

#[tokio::test]
async fn cancelling_callers_token_stops_pipeline() -> Result<()> {
    let token = CancelToken::new();
    let pipeline = from_source::<u32>(4, token.clone())
        .process(|x| Ok(x), 1)
        .to_target(|_| Ok(()), 1)
        .build()?;

    pipeline.send(1).await?;
    token.cancel();

    let err = pipeline.send(2).await.unwrap_err();
    assert!(matches!(err, Error::Rejected(RejectReason::Cancelled)));
    assert!(matches!(pipeline.complete().await, Err(Error::Cancelled)));
    Ok(())
}

#[tokio::test]
async fn token_cancelled_before_build_rejects_everything() -> Result<()> {
    let token = CancelToken::new();
    token.cancel();

    let pipeline = from_source::<u32>(1, token)
        .to_target(|_| Ok(()), 1)
        .build()?;

    assert!(pipeline.cancel_token().is_cancelled());
    assert!(pipeline.send(1).await.unwrap_err().is_rejected());
    assert!(matches!(pipeline.complete().await, Err(Error::Cancelled)));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn pipeline_cancel_interrupts_blocked_workers() -> Result<()> {
    let token = CancelToken::new();
    let pipeline = from_source::<u32>(1, token.clone())
        .to_target_async(|_| std::future::pending::<Result<()>>(), 1)
        .build()?;

    pipeline.send(0).await?;
    tokio::time::sleep(Duration::from_millis(10)).await;
    pipeline.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(1), pipeline.complete())
        .await
        .expect("cancelled pipeline drains promptly");
    assert!(matches!(outcome, Err(Error::Cancelled)));

    // The pipeline's own token is a child; the caller's stays untouched.
    assert!(!token.is_cancelled());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn send_with_cancel_gives_up_without_stopping_the_pipeline() -> Result<()> {
    let pipeline = from_source::<u32>(1, CancelToken::new())
        .to_target_async(|_| std::future::pending::<Result<()>>(), 1)
        .build()?;

    // Fill every queue: the worker holds one item, each queue one more and
    // the source stage one it cannot hand over.
    for i in 0..4 {
        pipeline.send(i).await?;
    }

    let call = CancelToken::new();
    let trigger = call.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = pipeline.send_with_cancel(4, &call).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(!pipeline.cancel_token().is_cancelled());
    assert!(!pipeline.is_faulted());

    pipeline.cancel();
    assert!(matches!(pipeline.complete().await, Err(Error::Cancelled)));
    Ok(())
}

#[tokio::test]
async fn child_token_sees_parent_cancellation() {
    let parent = CancelToken::new();
    let child = parent.child();
    let grandchild = child.child();

    grandchild.cancel();
    assert!(!parent.is_cancelled());
    assert!(!child.is_cancelled());

    let waiter = {
        let child = child.clone();
        tokio::spawn(async move { child.cancelled().await })
    };
    parent.cancel();
    waiter.await.expect("waiter joins");

    assert!(child.is_cancelled());
    assert!(grandchild.is_cancelled());
}
