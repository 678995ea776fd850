//! Per-query cancellation and deadlines

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::distributor::DistributorError;

/// Cancellation signal and optional deadline carried by one logical query
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    cancel: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Cancels every context cloned from the one it was created with
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl QueryContext {
    /// A context that is never canceled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    pub fn cancelable() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                cancel: Some(rx),
                deadline: None,
            },
            CancelHandle { tx },
        )
    }

    /// Bound the context to `timeout` from now; an earlier deadline is kept
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run a collaborator call, aborting it on cancellation or deadline
    pub async fn run<T, F>(&self, call: F) -> Result<T, DistributorError>
    where
        F: Future<Output = Result<T, DistributorError>>,
    {
        if self.is_canceled() {
            return Err(DistributorError::Canceled);
        }

        let canceled = async {
            match &self.cancel {
                Some(rx) => {
                    let mut rx = rx.clone();
                    let closed = rx.wait_for(|canceled| *canceled).await.is_err();
                    if closed {
                        // A dropped handle can no longer cancel
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };

        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = call => result,
            _ = canceled => Err(DistributorError::Canceled),
            _ = expired => Err(DistributorError::DeadlineExceeded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_runs_to_completion() {
        let ctx = QueryContext::background();
        let result = ctx.run(async { Ok::<_, DistributorError>(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_call() {
        let (ctx, handle) = QueryContext::cancelable();

        let call = ctx.run(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, DistributorError>(())
        });
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.cancel();
        };

        let (result, _) = tokio::join!(call, cancel);
        assert_eq!(result, Err(DistributorError::Canceled));
        assert!(ctx.is_canceled());
    }

    #[tokio::test]
    async fn test_already_canceled_skips_call() {
        let (ctx, handle) = QueryContext::cancelable();
        handle.cancel();

        let result = ctx.run(async { Ok::<_, DistributorError>(1) }).await;
        assert_eq!(result, Err(DistributorError::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let ctx = QueryContext::background().with_timeout(Duration::from_millis(50));

        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, DistributorError>(())
            })
            .await;
        assert_eq!(result, Err(DistributorError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_dropped_handle_never_cancels() {
        let (ctx, handle) = QueryContext::cancelable();
        drop(handle);

        let result = ctx.run(async { Ok::<_, DistributorError>(1) }).await;
        assert_eq!(result, Ok(1));
    }
}
