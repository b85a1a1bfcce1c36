//! Fixed-delay repeating jobs bound to a cancellation token.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Runs `action` repeatedly with a fixed delay between iterations.
///
/// The first iteration starts after `initial_delay`. Every following iteration
/// starts `delay` after the previous one *completed*, so a slow iteration pushes
/// back all later ones instead of causing a burst to catch up.
///
/// Cancelling `token` stops the schedule at the next checkpoint: before an
/// iteration starts, while sleeping, or at any suspension point inside the
/// action, in which case the in-flight action is dropped. The action can also
/// stop the schedule itself by returning [`ControlFlow::Break`].
///
/// The returned future must be spawned or awaited to run.
pub async fn schedule_repeating<F, Fut>(
    mut action: F,
    initial_delay: Duration,
    delay: Duration,
    token: CancellationToken,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ControlFlow<()>>,
{
    if !sleep_unless_cancelled(initial_delay, &token).await {
        return;
    }

    loop {
        if token.is_cancelled() {
            return;
        }

        let flow = tokio::select! {
            biased;
            () = token.cancelled() => return,
            flow = action() => flow,
        };

        if flow.is_break() || !sleep_unless_cancelled(delay, &token).await {
            return;
        }
    }
}

/// Sleeps for `duration`, returning `false` if the token was cancelled first.
async fn sleep_unless_cancelled(duration: Duration, token: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !token.is_cancelled();
    }

    tokio::select! {
        biased;
        () = token.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::Instant;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn delay_is_measured_from_completion() {
        let start = Instant::now();
        let starts = Arc::new(std::sync::Mutex::new(Vec::new()));
        let token = CancellationToken::new();

        let job = {
            let starts = Arc::clone(&starts);
            let inner = token.clone();
            schedule_repeating(
                move || {
                    let starts = Arc::clone(&starts);
                    let token = inner.clone();
                    async move {
                        let mut starts_guard = starts.lock().unwrap();
                        starts_guard.push(start.elapsed());
                        let done = starts_guard.len() == 3;
                        drop(starts_guard);

                        // Each iteration takes 30ms.
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        if done {
                            token.cancel();
                        }
                        ControlFlow::Continue(())
                    }
                },
                Duration::from_millis(10),
                Duration::from_millis(100),
                token.clone(),
            )
        };
        job.await;

        let starts = starts.lock().unwrap().clone();
        assert_eq!(
            starts,
            [
                Duration::from_millis(10),
                Duration::from_millis(140),
                Duration::from_millis(270),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_prevents_new_iterations() {
        let count = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();

        let handle = tokio::spawn(schedule_repeating(
            {
                let count = Arc::clone(&count);
                move || {
                    count.fetch_add(1, Ordering::SeqCst);
                    std::future::ready(ControlFlow::Continue(()))
                }
            },
            Duration::ZERO,
            Duration::from_millis(100),
            token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(250)).await;
        token.cancel();
        handle.await.unwrap();

        // Iterations at 0ms, 100ms and 200ms.
        assert_eq!(count.load(Ordering::SeqCst), 3);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_drops_inflight_action() {
        let finished = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();

        let handle = tokio::spawn(schedule_repeating(
            {
                let finished = Arc::clone(&finished);
                move || {
                    let finished = Arc::clone(&finished);
                    async move {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        finished.fetch_add(1, Ordering::SeqCst);
                        ControlFlow::Continue(())
                    }
                }
            },
            Duration::ZERO,
            Duration::ZERO,
            token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn break_stops_schedule() {
        let count = Arc::new(AtomicUsize::new(0));

        schedule_repeating(
            {
                let count = Arc::clone(&count);
                move || {
                    let n = count.fetch_add(1, Ordering::SeqCst) + 1;
                    let flow = if n == 2 {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    };
                    std::future::ready(flow)
                }
            },
            Duration::ZERO,
            Duration::from_millis(10),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_before_start_never_runs() {
        let token = CancellationToken::new();
        token.cancel();

        let mut ran = false;
        schedule_repeating(
            || {
                ran = true;
                std::future::ready(ControlFlow::Continue(()))
            },
            Duration::from_millis(10),
            Duration::from_millis(10),
            token,
        )
        .await;

        assert!(!ran);
    }
}
