//! Bounded fan-out / fan-in over blocking collaborator calls.
//!
//! Each item runs on the blocking pool once it holds a semaphore permit, so
//! at most `max_concurrency` calls are in flight and the rest queue. Results
//! land in index-addressed slots: output order is input order whatever the
//! completion order.

use super::error::ScreenError;
use std::sync::Arc;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::debug;

/// Cancellation signal shared by every task of one batch operation.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close first.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `work` over `items` with at most `max_concurrency` in flight.
///
/// Fails with `Cancelled` if `cancel` fires before every item completes;
/// partial results are dropped. Fails with `TaskFailed` if a worker panics.
pub async fn fan_out<I, T, F>(
    items: Vec<I>,
    max_concurrency: usize,
    cancel: &CancelToken,
    work: F,
) -> Result<Vec<T>, ScreenError>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> T + Send + Sync + 'static,
{
    if cancel.is_cancelled() {
        return Err(ScreenError::Cancelled);
    }

    let total = items.len();
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let work = Arc::new(work);
    let mut join_set: JoinSet<(usize, Result<T, ScreenError>)> = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let work = Arc::clone(&work);
        join_set.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (index, Err(ScreenError::Cancelled)),
            };
            let result = tokio::task::spawn_blocking(move || work(item))
                .await
                .map_err(|e| ScreenError::TaskFailed {
                    reason: e.to_string(),
                });
            (index, result)
        });
    }

    let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
    let collected = async {
        while let Some(joined) = join_set.join_next().await {
            let (index, result) = joined.map_err(|e| ScreenError::TaskFailed {
                reason: e.to_string(),
            })?;
            slots[index] = Some(result?);
        }
        Ok::<(), ScreenError>(())
    };

    tokio::select! {
        done = collected => done?,
        _ = cancel.cancelled() => {
            debug!(total, "fan-out cancelled");
            semaphore.close();
            return Err(ScreenError::Cancelled);
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| ScreenError::TaskFailed {
                reason: format!("no result for item {index}"),
            })
        })
        .collect()
}
