use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::select_all;
use tokio::sync::Notify;

#[derive(Default)]
struct Flag {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cooperative cancellation signal.
///
/// A token created with [`CancelToken::child`] observes its own cancellation
/// and that of every ancestor. Cancelling a child leaves its parent untouched,
/// which is how a faulted pipeline stops itself without cancelling the
/// caller's token.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<Flag>,
    ancestors: Vec<Arc<Flag>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        let mut ancestors = self.ancestors.clone();
        ancestors.push(Arc::clone(&self.flag));
        Self {
            flag: Arc::new(Flag::default()),
            ancestors,
        }
    }

    pub fn cancel(&self) {
        self.flag.cancelled.store(true, Ordering::SeqCst);
        self.flag.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags()
            .any(|flag| flag.cancelled.load(Ordering::SeqCst))
    }

    pub async fn cancelled(&self) {
        // Register before checking the flags so a concurrent cancel() is never missed.
        let waiters: Vec<_> = self
            .flags()
            .map(|flag| Box::pin(flag.notify.notified()))
            .collect();
        if self.is_cancelled() {
            return;
        }
        select_all(waiters).await;
    }

    fn flags(&self) -> impl Iterator<Item = &Arc<Flag>> {
        std::iter::once(&self.flag).chain(self.ancestors.iter())
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
