//! Racing an operation against a deadline.
//!
//! [`race`] spawns the operation onto the runtime and waits for whichever
//! comes first: the operation's own outcome, the deadline, or the caller's
//! cancellation token. When the deadline or the token wins, the spawned task is
//! detached rather than aborted. It runs to completion in the background and
//! its output is discarded. Cancellation is therefore best-effort: the caller
//! stops waiting, the network call underneath may not.

use std::{future::Future, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::error::ProbeError;

/// Run `op` bounded by `deadline`.
///
/// Returns the operation's value, or its error converted into a
/// [`ProbeError`] unchanged. A zero deadline fails with
/// [`ProbeError::Timeout`] without starting the operation.
pub async fn race<T, E, F>(deadline: Duration, op: F) -> Result<T, ProbeError>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<ProbeError> + Send + 'static,
{
    race_with_cancel(deadline, &CancellationToken::new(), op).await
}

/// Like [`race`], but also stops waiting when `cancel` fires.
pub async fn race_with_cancel<T, E, F>(
    deadline: Duration,
    cancel: &CancellationToken,
    op: F,
) -> Result<T, ProbeError>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<ProbeError> + Send + 'static,
{
    if deadline.is_zero() {
        return Err(ProbeError::Timeout(deadline));
    }
    if cancel.is_cancelled() {
        return Err(ProbeError::Cancelled);
    }

    let handle = tokio::spawn(op);

    // Prefer the operation when it and the timer are ready in the same poll.
    tokio::select! {
        biased;
        joined = handle => joined?.map_err(Into::into),
        _ = tokio::time::sleep(deadline) => {
            tracing::debug!(?deadline, "deadline elapsed; detaching operation");
            Err(ProbeError::Timeout(deadline))
        }
        _ = cancel.cancelled() => Err(ProbeError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    };

    use tokio::time::{sleep, Instant};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn returns_value_when_operation_beats_deadline() {
        let result = race(Duration::from_secs(1), async {
            sleep(Duration::from_millis(10)).await;
            Ok::<_, ProbeError>(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn propagates_original_error_unchanged() {
        let result: Result<(), _> = race(Duration::from_secs(1), async {
            Err(anyhow::anyhow!("connection refused"))
        })
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, ProbeError::Connection(_)));
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_at_the_deadline_not_after_the_operation() {
        let start = Instant::now();
        let deadline = Duration::from_millis(100);

        let result = race(deadline, async {
            sleep(Duration::from_secs(30)).await;
            Ok::<_, ProbeError>(())
        })
        .await;

        assert!(matches!(result, Err(ProbeError::Timeout(d)) if d == deadline));
        assert!(start.elapsed() < Duration::from_millis(110));
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_operation_still_finishes_in_background() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);

        let result = race(Duration::from_millis(10), async move {
            sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
            Ok::<_, ProbeError>(())
        })
        .await;
        assert!(result.unwrap_err().is_timeout());
        assert!(!finished.load(Ordering::SeqCst));

        sleep(Duration::from_millis(100)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_deadline_fails_without_starting_the_operation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let result = race(Duration::ZERO, async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ProbeError>(())
        })
        .await;

        assert!(result.unwrap_err().is_timeout());
        sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn operation_runs_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        race(Duration::from_secs(1), async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ProbeError>(())
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_wait() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result = race_with_cancel(Duration::from_secs(10), &cancel, async {
            sleep(Duration::from_secs(5)).await;
            Ok::<_, ProbeError>(())
        })
        .await;

        assert!(matches!(result, Err(ProbeError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn already_cancelled_token_fails_immediately() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = race_with_cancel(Duration::from_secs(1), &cancel, async {
            Ok::<_, ProbeError>(())
        })
        .await;
        assert!(matches!(result, Err(ProbeError::Cancelled)));
    }
}
