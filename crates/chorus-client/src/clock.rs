//! Server clock offset smoothing
//!
//! Each server time report yields a new target offset (server minus local).
//! Instead of jumping there, the offset walks toward the target in
//! [`SMOOTHING_STEPS`] equal steps spread over [`SMOOTHING_DURATION`], then
//! lands on the target exactly. A report that arrives mid-run replaces the
//! run: the old ticker is dropped and a new run starts from wherever the
//! offset currently is.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tokio::time::{self, Instant, Interval};

/// Number of increments per smoothing run
pub const SMOOTHING_STEPS: u32 = 50;

/// Total length of a smoothing run
pub const SMOOTHING_DURATION: Duration = Duration::from_millis(1000);

/// Local wall-clock time in milliseconds since the Unix epoch
pub fn local_time_millis() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// One server time report, as received
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerTimeReport {
    pub server_time: f64,
    /// Echoed client send time. Recorded, not used for round-trip correction.
    pub client_time: Option<f64>,
}

/// An in-flight smoothing run
#[derive(Debug)]
struct SmoothingRun {
    target: f64,
    increment: f64,
    steps_taken: u32,
    ticker: Interval,
}

/// Smooths server-reported time into a local offset
#[derive(Debug)]
pub struct ClockSynchronizer {
    offset: f64,
    run: Option<SmoothingRun>,
    last_report: Option<ServerTimeReport>,
    published: watch::Sender<f64>,
}

impl Default for ClockSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSynchronizer {
    /// Create a synchronizer with a zero offset
    pub fn new() -> Self {
        let (published, _) = watch::channel(0.0);
        Self {
            offset: 0.0,
            run: None,
            last_report: None,
            published,
        }
    }

    /// Current offset in milliseconds (server minus local)
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Local time shifted by the current offset
    pub fn server_time(&self) -> f64 {
        local_time_millis() + self.offset
    }

    /// Observe every change to the offset
    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.published.subscribe()
    }

    /// The most recent report, if any
    pub fn last_report(&self) -> Option<ServerTimeReport> {
        self.last_report
    }

    /// Target of the in-flight run
    pub fn target(&self) -> Option<f64> {
        self.run.as_ref().map(|run| run.target)
    }

    pub fn is_smoothing(&self) -> bool {
        self.run.is_some()
    }

    /// Start smoothing toward `server_time - now`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn report_server_time(&mut self, server_time: f64, client_time: Option<f64>) {
        self.report_server_time_at(server_time, client_time, local_time_millis());
    }

    /// Same as [`report_server_time`](Self::report_server_time) with an
    /// explicit local time.
    pub fn report_server_time_at(&mut self, server_time: f64, client_time: Option<f64>, now: f64) {
        self.last_report = Some(ServerTimeReport {
            server_time,
            client_time,
        });

        let target = server_time - now;
        let increment = (target - self.offset) / f64::from(SMOOTHING_STEPS);
        let period = SMOOTHING_DURATION / SMOOTHING_STEPS;

        let run = SmoothingRun {
            target,
            increment,
            steps_taken: 0,
            ticker: time::interval_at(Instant::now() + period, period),
        };

        if let Some(previous) = self.run.replace(run) {
            tracing::debug!(
                "Re-targeting clock offset from {:.1}ms to {:.1}ms after {} steps",
                previous.target,
                target,
                previous.steps_taken
            );
        } else {
            tracing::debug!("Smoothing clock offset {:.1}ms -> {:.1}ms", self.offset, target);
        }
    }

    /// Wait for and apply the next step of the in-flight run.
    ///
    /// Pends forever while no run is in flight. Cancel-safe: dropping the
    /// future before it completes applies nothing.
    pub async fn next_step(&mut self) {
        match self.run.as_mut() {
            Some(run) => {
                run.ticker.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
        self.advance();
    }

    /// Cancel the in-flight run and land on its target
    pub fn settle(&mut self) {
        if let Some(run) = self.run.take() {
            self.set_offset(run.target);
        }
    }

    fn advance(&mut self) {
        let (finished, target, increment) = match self.run.as_mut() {
            Some(run) => {
                run.steps_taken += 1;
                (run.steps_taken >= SMOOTHING_STEPS, run.target, run.increment)
            }
            None => return,
        };

        if finished {
            // Land exactly; summed increments drift.
            self.run = None;
            self.set_offset(target);
        } else {
            self.set_offset(self.offset + increment);
        }
    }

    fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
        self.published.send_replace(offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run_steps(clock: &mut ClockSynchronizer, steps: u32) {
        for _ in 0..steps {
            clock.next_step().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_run_lands_exactly_on_target() {
        let mut clock = ClockSynchronizer::new();
        clock.report_server_time_at(1500.0, None, 1000.0);
        assert_eq!(clock.target(), Some(500.0));

        run_steps(&mut clock, SMOOTHING_STEPS).await;

        assert_eq!(clock.offset(), 500.0);
        assert!(!clock.is_smoothing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_awkward_target_is_exact_after_run() {
        let mut clock = ClockSynchronizer::new();
        clock.report_server_time_at(1000.0, None, 0.1);

        run_steps(&mut clock, SMOOTHING_STEPS).await;

        assert_eq!(clock.offset(), 1000.0 - 0.1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_steps_move_gradually() {
        let mut clock = ClockSynchronizer::new();
        clock.report_server_time_at(1500.0, None, 1000.0);

        run_steps(&mut clock, 1).await;
        assert!((clock.offset() - 10.0).abs() < 1e-9);

        run_steps(&mut clock, 24).await;
        assert!((clock.offset() - 250.0).abs() < 1e-9);
        assert!(clock.is_smoothing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_takes_one_second() {
        let mut clock = ClockSynchronizer::new();
        let start = Instant::now();
        clock.report_server_time_at(100.0, None, 0.0);

        run_steps(&mut clock, SMOOTHING_STEPS).await;

        assert_eq!(start.elapsed(), SMOOTHING_DURATION);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retarget_converges_to_latest_report() {
        let mut clock = ClockSynchronizer::new();
        clock.report_server_time_at(1500.0, None, 1000.0);
        run_steps(&mut clock, 10).await;
        let partial = clock.offset();
        assert!(partial > 0.0 && partial < 500.0);

        clock.report_server_time_at(-200.0, None, 0.0);
        assert_eq!(clock.target(), Some(-200.0));

        // The new run starts from the partial offset and needs a full run.
        run_steps(&mut clock, SMOOTHING_STEPS - 1).await;
        assert!(clock.is_smoothing());
        run_steps(&mut clock, 1).await;

        assert_eq!(clock.offset(), -200.0);
        assert!(!clock.is_smoothing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_clock_never_steps() {
        let mut clock = ClockSynchronizer::new();
        let result = time::timeout(Duration::from_secs(5), clock.next_step()).await;
        assert!(result.is_err());
        assert_eq!(clock.offset(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_cancels_run() {
        let mut clock = ClockSynchronizer::new();
        clock.report_server_time_at(300.0, None, 0.0);
        run_steps(&mut clock, 3).await;

        clock.settle();

        assert_eq!(clock.offset(), 300.0);
        assert!(!clock.is_smoothing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_offset_changes() {
        let mut clock = ClockSynchronizer::new();
        let rx = clock.subscribe();
        clock.report_server_time_at(50.0, Some(10.0), 0.0);

        run_steps(&mut clock, SMOOTHING_STEPS).await;

        assert_eq!(*rx.borrow(), 50.0);
        assert_eq!(
            clock.last_report(),
            Some(ServerTimeReport {
                server_time: 50.0,
                client_time: Some(10.0)
            })
        );
    }
}
