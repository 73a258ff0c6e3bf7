//! Watchdog supervisor.
//!
//! A recurring timer that nudges the client's event loop at a fixed
//! period. The loop decides what a tick means; the watchdog only owns the
//! timer and its cancellation.

use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// Handle to a running watchdog timer.
///
/// The timer stops when the handle is cancelled or dropped.
#[derive(Debug)]
pub struct Watchdog {
    period: Duration,
    handle: JoinHandle<()>,
}

impl Watchdog {
    /// Spawn a timer that sends on `ticks` every `period`, first one
    /// `period` from now.
    ///
    /// A tick is skipped rather than queued if the previous one has not
    /// been consumed yet. The timer ends by itself once `ticks` is closed.
    #[must_use]
    pub fn spawn(period: Duration, ticks: mpsc::Sender<()>) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                match ticks.try_send(()) {
                    Ok(()) => trace!("Watchdog tick"),
                    Err(TrySendError::Full(())) => trace!("Watchdog tick skipped, previous pending"),
                    Err(TrySendError::Closed(())) => break,
                }
            }

            debug!("Watchdog receiver gone, stopping");
        });

        Self { period, handle }
    }

    /// The tick period.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether the timer task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the timer.
    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_fixed_period() {
        let (tx, mut rx) = mpsc::channel(1);
        let start = Instant::now();
        let watchdog = Watchdog::spawn(Duration::from_secs(60), tx);

        rx.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(60));

        rx.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(120));

        assert!(watchdog.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks() {
        let (tx, mut rx) = mpsc::channel(1);
        let watchdog = Watchdog::spawn(Duration::from_secs(60), tx);

        watchdog.cancel();
        // The aborted task drops its sender.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_ticks() {
        let (tx, mut rx) = mpsc::channel(1);
        drop(Watchdog::spawn(Duration::from_secs(60), tx));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconsumed_ticks_do_not_pile_up() {
        let (tx, mut rx) = mpsc::channel(1);
        let _watchdog = Watchdog::spawn(Duration::from_secs(60), tx);

        time::sleep(Duration::from_secs(600)).await;

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        let watchdog = Watchdog::spawn(Duration::from_secs(1), tx);
        drop(rx);

        time::sleep(Duration::from_secs(3)).await;
        tokio::task::yield_now().await;
        assert!(!watchdog.is_running());
    }
}
