use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flowpipe::error::{Error, Result};
use flowpipe::pipeline::cancel::CancelToken;
use flowpipe::pipeline::chain::from_source;

#[derive(Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[tokio::test(start_paused = true)]
async fn sink_runs_at_most_its_parallelism() -> Result<()> {
    let expected = "1111-2222-3333-4444-5555-6666-7777-8888-9999";
    let in_flight = Arc::new(InFlight::default());
    let received = Arc::new(Mutex::new(Vec::new()));

    let tracker = in_flight.clone();
    let sink = received.clone();
    let pipeline = from_source::<String>(1, CancelToken::new())
        .process(|item| Ok(item), 1)
        .to_target_async(
            move |item| {
                let tracker = tracker.clone();
                let sink = sink.clone();
                async move {
                    tracker.enter();
                    sink.lock().expect("mutex poisoned").push(item);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    tracker.leave();
                    Ok::<_, Error>(())
                }
            },
            2,
        )
        .build()?;

    for segment in expected.split('-') {
        pipeline.send(segment.to_string()).await?;
    }
    pipeline.complete().await?;

    let mut seen = received.lock().expect("mutex poisoned").clone();
    seen.sort();
    assert_eq!(seen, expected.split('-').collect::<Vec<_>>());
    assert_eq!(in_flight.peak.load(Ordering::SeqCst), 2);
    assert_eq!(in_flight.current.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn parallel_transform_overlaps_async_work() -> Result<()> {
    let in_flight = Arc::new(InFlight::default());
    let tracker = in_flight.clone();

    let started = tokio::time::Instant::now();
    let pipeline = from_source::<u32>(4, CancelToken::new())
        .process_async(
            move |x| {
                let tracker = tracker.clone();
                async move {
                    tracker.enter();
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    tracker.leave();
                    Ok::<_, Error>(x)
                }
            },
            4,
        )
        .to_target(|_| Ok(()), 1)
        .build()?;

    for i in 0..8 {
        pipeline.send(i).await?;
    }
    pipeline.complete().await?;

    assert_eq!(in_flight.peak.load(Ordering::SeqCst), 4);
    assert!(started.elapsed() < Duration::from_millis(800));
    Ok(())
}
