// src/client/clock.rs

//! Server-authoritative countdown.
//!
//! The client clock may be skewed, so remaining time is measured against an
//! estimate of the server clock: `drift = localNow - serverNow` is taken once
//! per server timestamp, and every later reading is `localNow - drift`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::{sync::watch, task::JoinHandle};

use crate::utils::time::parse_timestamp;

/// How often the countdown re-reads the clock.
pub const TICK: Duration = Duration::from_millis(500);

pub trait LocalClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl LocalClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriftClock {
    drift_ms: i64,
}

impl DriftClock {
    /// Measures drift against an ISO-8601 server timestamp. An unparseable
    /// timestamp means zero drift.
    pub fn calibrate(server_now: &str, local_now: DateTime<Utc>) -> Self {
        match parse_timestamp(server_now) {
            Some(server_now) => Self::calibrate_at(server_now, local_now),
            None => {
                tracing::debug!("Unparseable server timestamp {:?}, assuming no drift", server_now);
                Self::default()
            }
        }
    }

    pub fn calibrate_at(server_now: DateTime<Utc>, local_now: DateTime<Utc>) -> Self {
        Self {
            drift_ms: (local_now - server_now).num_milliseconds(),
        }
    }

    pub fn drift_ms(&self) -> i64 {
        self.drift_ms
    }

    pub fn estimated_server_now(&self, local_now: DateTime<Utc>) -> DateTime<Utc> {
        local_now - chrono::Duration::milliseconds(self.drift_ms)
    }

    /// Whole seconds left until `end_at`, never negative. An unparseable
    /// end timestamp counts as already expired.
    pub fn remaining_secs(&self, end_at: &str, local_now: DateTime<Utc>) -> u64 {
        match parse_timestamp(end_at) {
            Some(end_at) => self.remaining_at(end_at, local_now),
            None => 0,
        }
    }

    pub fn remaining_at(&self, end_at: DateTime<Utc>, local_now: DateTime<Utc>) -> u64 {
        let left_ms = (end_at - self.estimated_server_now(local_now)).num_milliseconds();
        if left_ms <= 0 { 0 } else { (left_ms / 1000) as u64 }
    }
}

/// Background countdown to an attempt's end.
///
/// Publishes remaining seconds on a `watch` channel every [`TICK`] and runs
/// `on_expire` exactly once when it first reaches zero. Dropping the
/// countdown stops it.
#[derive(Debug)]
pub struct Countdown {
    drift_tx: watch::Sender<DriftClock>,
    remaining_rx: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

impl Countdown {
    pub fn spawn<F>(end_at: DateTime<Utc>, drift: DriftClock, clock: Arc<dyn LocalClock>, on_expire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (drift_tx, drift_rx) = watch::channel(drift);
        let (remaining_tx, remaining_rx) = watch::channel(drift.remaining_at(end_at, clock.now()));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK);
            loop {
                ticker.tick().await;
                let drift = *drift_rx.borrow();
                let remaining = drift.remaining_at(end_at, clock.now());
                remaining_tx.send_replace(remaining);
                if remaining == 0 {
                    on_expire();
                    break;
                }
            }
        });

        Self {
            drift_tx,
            remaining_rx,
            task,
        }
    }

    /// Replaces the drift after a new server timestamp arrived.
    pub fn recalibrate(&self, drift: DriftClock) {
        self.drift_tx.send_replace(drift);
    }

    pub fn remaining(&self) -> u64 {
        *self.remaining_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.remaining_rx.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Wall clock that follows tokio's (pausable) clock.
    pub(crate) struct TokioClock {
        origin: DateTime<Utc>,
        started: tokio::time::Instant,
    }

    impl TokioClock {
        pub(crate) fn starting_at(origin: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self {
                origin,
                started: tokio::time::Instant::now(),
            })
        }
    }

    impl LocalClock for TokioClock {
        fn now(&self) -> DateTime<Utc> {
            let elapsed = chrono::Duration::from_std(self.started.elapsed()).unwrap_or_else(|_| chrono::Duration::zero());
            self.origin + elapsed
        }
    }

    fn at(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn drift_compensates_a_fast_local_clock() {
        // local clock runs 5 s ahead of the server
        let drift = DriftClock::calibrate("2026-01-01T12:00:00Z", at("2026-01-01T12:00:05Z"));
        assert_eq!(drift.drift_ms(), 5000);

        let local = at("2026-01-01T12:00:15Z");
        assert_eq!(drift.estimated_server_now(local), at("2026-01-01T12:00:10Z"));
        assert_eq!(drift.remaining_secs("2026-01-01T12:01:00Z", local), 50);
    }

    #[test]
    fn unparseable_server_time_means_no_drift() {
        let drift = DriftClock::calibrate("yesterday-ish", at("2026-01-01T12:00:05Z"));
        assert_eq!(drift, DriftClock::default());
    }

    #[test]
    fn unparseable_end_time_is_expired() {
        let drift = DriftClock::default();
        assert_eq!(drift.remaining_secs("soon", at("2026-01-01T12:00:00Z")), 0);
    }

    #[test]
    fn remaining_is_floored_and_never_negative() {
        let drift = DriftClock::default();
        let end = at("2026-01-01T12:00:10Z");
        assert_eq!(drift.remaining_at(end, at("2026-01-01T12:00:00.600Z")), 9);
        assert_eq!(drift.remaining_at(end, at("2026-01-01T12:00:11Z")), 0);
    }

    #[test]
    fn readings_in_one_epoch_differ_only_by_elapsed_time() {
        let drift = DriftClock::calibrate("2026-01-01T12:00:00Z", at("2026-01-01T11:59:58Z"));
        let end = "2026-01-01T12:10:00Z";
        let first = drift.remaining_secs(end, at("2026-01-01T12:00:00Z"));
        let later = drift.remaining_secs(end, at("2026-01-01T12:00:30Z"));
        assert_eq!(first - later, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_fires_exactly_once() {
        let origin = at("2026-01-01T12:00:00Z");
        let clock = TokioClock::starting_at(origin);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let countdown = Countdown::spawn(
            origin + chrono::Duration::seconds(3),
            DriftClock::default(),
            clock,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert_eq!(countdown.remaining(), 3);

        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert_eq!(countdown.remaining(), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(countdown.remaining(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(countdown.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn recalibration_moves_the_deadline() {
        let origin = at("2026-01-01T12:00:00Z");
        let clock = TokioClock::starting_at(origin);
        let countdown = Countdown::spawn(
            origin + chrono::Duration::seconds(60),
            DriftClock::default(),
            clock,
            || {},
        );

        // server turns out to be 10 s ahead of us
        countdown.recalibrate(DriftClock::calibrate_at(origin + chrono::Duration::seconds(10), origin));
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(countdown.remaining(), 49);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_stops_the_countdown() {
        let origin = at("2026-01-01T12:00:00Z");
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let countdown = Countdown::spawn(
            origin + chrono::Duration::seconds(2),
            DriftClock::default(),
            TokioClock::starting_at(origin),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        drop(countdown);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
