use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant};

/// Forward the latest value from `input` once it has been quiet for
/// `window`.
///
/// Every upstream change restarts the timer; when the input finally goes
/// quiet, the newest value (and only that one) is published downstream. When
/// the upstream sender closes, the pending value is still delivered, so the
/// final state is never dropped. Must run inside a Tokio runtime.
pub fn debounce<T>(window: Duration, mut input: watch::Receiver<T>) -> watch::Receiver<T>
where
    T: Clone + Send + Sync + 'static,
{
    let (tx, rx) = watch::channel(input.borrow().clone());
    tokio::spawn(async move {
        loop {
            if input.changed().await.is_err() {
                break;
            }
            let mut closed = false;
            loop {
                tokio::select! {
                    _ = time::sleep(window) => break,
                    changed = input.changed() => {
                        if changed.is_err() {
                            closed = true;
                            break;
                        }
                    }
                }
            }
            let latest = input.borrow_and_update().clone();
            if tx.send(latest).is_err() {
                break;
            }
            if closed {
                break;
            }
        }
    });
    rx
}

/// Forward values from `input` at most once per `window`.
///
/// A change arriving outside an open window passes through immediately;
/// changes inside it coalesce, and the newest value is published when the
/// window closes. The last value seen is always delivered eventually. Must
/// run inside a Tokio runtime.
pub fn throttle<T>(window: Duration, mut input: watch::Receiver<T>) -> watch::Receiver<T>
where
    T: Clone + Send + Sync + 'static,
{
    let (tx, rx) = watch::channel(input.borrow().clone());
    tokio::spawn(async move {
        let mut window_opened: Option<Instant> = None;
        loop {
            if input.changed().await.is_err() {
                let latest = input.borrow_and_update().clone();
                let _ = tx.send(latest);
                break;
            }

            let now = Instant::now();
            if let Some(opened) = window_opened {
                let deadline = opened + window;
                if now < deadline {
                    // inside the window: wait it out, absorbing further input
                    let mut closed = false;
                    loop {
                        tokio::select! {
                            _ = time::sleep_until(deadline) => break,
                            changed = input.changed() => {
                                if changed.is_err() {
                                    closed = true;
                                    break;
                                }
                            }
                        }
                    }
                    let latest = input.borrow_and_update().clone();
                    if tx.send(latest).is_err() {
                        break;
                    }
                    window_opened = Some(Instant::now());
                    if closed {
                        break;
                    }
                    continue;
                }
            }

            let latest = input.borrow_and_update().clone();
            if tx.send(latest).is_err() {
                break;
            }
            window_opened = Some(now);
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn debounce_emits_only_the_last_of_a_burst() {
        let (tx, rx) = watch::channel(0u32);
        let mut out = debounce(WINDOW, rx);

        tx.send(1).unwrap();
        time::advance(Duration::from_millis(30)).await;
        tx.send(2).unwrap();
        time::advance(Duration::from_millis(30)).await;
        tx.send(3).unwrap();

        out.changed().await.unwrap();
        assert_eq!(*out.borrow_and_update(), 3);
        // one emission for the whole burst
        assert!(!out.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_passes_spaced_values_through() {
        let (tx, rx) = watch::channel(0u32);
        let mut out = debounce(WINDOW, rx);

        tx.send(1).unwrap();
        out.changed().await.unwrap();
        assert_eq!(*out.borrow_and_update(), 1);

        tx.send(2).unwrap();
        out.changed().await.unwrap();
        assert_eq!(*out.borrow_and_update(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_delivers_the_final_value_when_upstream_closes() {
        let (tx, rx) = watch::channel(0u32);
        let mut out = debounce(WINDOW, rx);

        tx.send(7).unwrap();
        drop(tx);

        out.changed().await.unwrap();
        assert_eq!(*out.borrow_and_update(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_coalesces_a_burst_to_leading_and_trailing() {
        let (tx, rx) = watch::channel(0u32);
        let mut out = throttle(WINDOW, rx);

        tx.send(1).unwrap();
        out.changed().await.unwrap();
        assert_eq!(*out.borrow_and_update(), 1);

        tx.send(2).unwrap();
        tx.send(3).unwrap();
        tx.send(4).unwrap();

        out.changed().await.unwrap();
        // trailing edge carries the newest value, in one publish
        assert_eq!(*out.borrow_and_update(), 4);
        assert!(!out.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_lets_spaced_input_through_immediately() {
        let (tx, rx) = watch::channel(0u32);
        let mut out = throttle(WINDOW, rx);

        tx.send(1).unwrap();
        out.changed().await.unwrap();
        time::advance(WINDOW * 2).await;

        tx.send(2).unwrap();
        out.changed().await.unwrap();
        assert_eq!(*out.borrow_and_update(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_never_drops_the_final_value() {
        let (tx, rx) = watch::channel(0u32);
        let mut out = throttle(WINDOW, rx);

        tx.send(1).unwrap();
        out.changed().await.unwrap();
        tx.send(2).unwrap();
        drop(tx);

        out.changed().await.unwrap();
        assert_eq!(*out.borrow_and_update(), 2);
    }
}
