//! Shared exponential-backoff probe loop used by the TTS and LLM drivers
//! (§9 "Exponential-backoff probe loops"): start at 150ms, multiply by 1.25
//! each miss, cap at 800ms, bounded by an overall timeout.

use std::future::Future;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub start: Duration,
    pub factor: f64,
    pub cap: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            start: Duration::from_millis(150),
            factor: 1.25,
            cap: Duration::from_millis(800),
        }
    }
}

/// Poll `check` with exponential backoff until it returns `true` or
/// `timeout` elapses. Returns `true` if readiness was observed in time.
///
/// `check` is an injectable async predicate so this loop is unit-testable
/// against a synthetic counter instead of a real probe.
pub async fn poll_until_ready<F, Fut>(mut check: F, timeout: Duration, backoff: Backoff) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    let mut interval = backoff.start;

    loop {
        if check().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        let sleep_for = interval.min(backoff.cap).min(
            deadline
                .saturating_duration_since(Instant::now())
                .max(Duration::from_millis(1)),
        );
        tokio::time::sleep(sleep_for).await;
        interval = interval.mul_f64(backoff.factor).min(backoff.cap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn succeeds_once_predicate_flips() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let a = attempts.clone();
        let ready = poll_until_ready(
            move || {
                let a = a.clone();
                async move { a.fetch_add(1, Ordering::SeqCst) >= 3 }
            },
            Duration::from_secs(5),
            Backoff::default(),
        )
        .await;
        assert!(ready);
        assert!(attempts.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_never_ready() {
        let ready = poll_until_ready(
            || async { false },
            Duration::from_millis(500),
            Backoff::default(),
        )
        .await;
        assert!(!ready);
    }
}
