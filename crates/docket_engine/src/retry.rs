use std::time::Duration;

use tokio::time::{sleep, Instant};

/// Run `attempt` until it yields a value or `timeout` has elapsed, sleeping
/// `interval` between attempts.
///
/// `attempt` always runs at least once, and the last sleep is clipped to the
/// deadline so one final attempt happens right at it. Returns `None` on
/// timeout.
pub async fn retry_until<T, F>(interval: Duration, timeout: Duration, mut attempt: F) -> Option<T>
where
    F: FnMut() -> Option<T>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = attempt() {
            return Some(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        sleep(interval.min(deadline - now)).await;
    }
}
