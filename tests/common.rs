#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flowpipe::error::Result;
use flowpipe::pipeline::stage::{Outlet, Stage, StageContext};
use tokio::sync::mpsc::Receiver;

pub type Collected<T> = Arc<Mutex<Vec<T>>>;

pub fn collected<T>() -> Collected<T> {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn snapshot<T: Clone>(out: &Collected<T>) -> Vec<T> {
    out.lock().expect("mutex poisoned").clone()
}

/// Terminal stage pushing every item into a shared `Vec`, in arrival order.
pub struct CollectSink<T> {
    out: Collected<T>,
}

impl<T> CollectSink<T> {
    pub fn new(out: Collected<T>) -> Self {
        Self { out }
    }
}

#[async_trait]
impl<T: Send + 'static> Stage<T, ()> for CollectSink<T> {
    fn stage_name(&self) -> &'static str {
        "collect"
    }

    async fn process(
        &self,
        mut input: Receiver<T>,
        _output: Outlet<()>,
        ctx: StageContext,
    ) -> Result<()> {
        while let Some(item) = ctx.recv(&mut input).await {
            self.out.lock().expect("mutex poisoned").push(item);
        }
        Ok(())
    }
}
