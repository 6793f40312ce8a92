use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// How a timed retry ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T, E> {
    Ready(T),
    /// The probe kept answering "not yet" until the deadline.
    TimedOut,
    /// The deadline passed while the probe itself was failing.
    Exhausted(E),
}

impl<T, E> PollOutcome<T, E> {
    pub fn is_ready(&self) -> bool {
        matches!(self, PollOutcome::Ready(_))
    }
}

/// Calls `probe` every `interval` until it yields `Some`, or `deadline` has elapsed.
///
/// Probe errors do not stop the loop. The last sleep is clipped to the deadline.
pub async fn poll_until<T, E, F, Fut>(interval: Duration, deadline: Duration, mut probe: F) -> PollOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let end = Instant::now() + deadline;
    let mut last_err = None;

    while Instant::now() < end {
        match probe().await {
            Ok(Some(v)) => return PollOutcome::Ready(v),
            Ok(None) => last_err = None,
            Err(e) => last_err = Some(e),
        }

        let now = Instant::now();
        if now >= end {
            break;
        }
        sleep(interval.min(end - now)).await;
    }

    match last_err {
        Some(e) => PollOutcome::Exhausted(e),
        None => PollOutcome::TimedOut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test(start_paused = true)]
    async fn ready_on_third_attempt() {
        let calls = Cell::new(0);
        let out: PollOutcome<u32, ()> = poll_until(Duration::from_secs(2), Duration::from_secs(90), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { Ok(if n == 3 { Some(n) } else { None }) }
        })
        .await;
        assert_eq!(out, PollOutcome::Ready(3));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_and_respects_interval() {
        let calls = Cell::new(0);
        let start = Instant::now();
        let out: PollOutcome<(), ()> = poll_until(Duration::from_secs(3), Duration::from_secs(10), || {
            calls.set(calls.get() + 1);
            async { Ok(None) }
        })
        .await;
        assert_eq!(out, PollOutcome::TimedOut);
        // t = 0, 3, 6, 9
        assert_eq!(calls.get(), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_probe_exhausts() {
        let out: PollOutcome<(), &str> =
            poll_until(Duration::from_secs(1), Duration::from_secs(3), || async { Err("inspect failed") }).await;
        assert_eq!(out, PollOutcome::Exhausted("inspect failed"));
    }
}
