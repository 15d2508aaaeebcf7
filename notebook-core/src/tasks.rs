//! Scoped background work
//!
//! Delayed completions are spawned into a [`TaskScope`] instead of being
//! fired and forgotten. Cancelling the scope aborts everything still pending,
//! and tasks that already woke up can check [`CancelToken::is_cancelled`]
//! before touching shared state.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::JoinSet;

#[derive(Clone, Debug)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the owning scope is cancelled or dropped.
    pub async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|c| *c).await;
    }
}

pub struct TaskScope {
    tasks: Mutex<JoinSet<()>>,
    cancel_tx: watch::Sender<bool>,
}

impl Default for TaskScope {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskScope {
    pub fn new() -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            tasks: Mutex::new(JoinSet::new()),
            cancel_tx,
        }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.cancel_tx.subscribe(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Spawn `fut` in this scope. Returns false, without spawning, once the
    /// scope has been cancelled.
    pub fn spawn<F>(&self, fut: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_cancelled() {
            return false;
        }
        let mut token = self.token();
        let mut tasks = self.lock();
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = fut => {}
            }
        });
        true
    }

    /// Number of tasks not yet finished.
    pub fn pending(&self) -> usize {
        let mut tasks = self.lock();
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Cancel every pending task. Idempotent.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
        self.lock().abort_all();
    }

    /// Wait until every task spawned so far, and any they spawn, has finished.
    pub async fn join_all(&self) {
        loop {
            let mut batch = std::mem::take(&mut *self.lock());
            if batch.is_empty() {
                return;
            }
            while batch.join_next().await.is_some() {}
        }
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for TaskScope {
    fn drop(&mut self) {
        self.cancel_tx.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tasks_run_to_completion() {
        let scope = TaskScope::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = hits.clone();
            scope.spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(scope.pending(), 3);
        scope.join_all().await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(scope.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_pending_work() {
        let scope = TaskScope::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        scope.spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            h.fetch_add(1, Ordering::SeqCst);
        });

        scope.cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(scope.token().is_cancelled());

        let h = hits.clone();
        assert!(!scope.spawn(async move {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        scope.join_all().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
