//! Fixed-rate tick scheduler for the Fracas server loop.
//!
//! The lobby core is purely reactive: it advances waiter clocks by whatever
//! `dt` it is handed. This crate produces that `dt`. Each tick reports the
//! time that actually elapsed since the previous tick, so a loop that falls
//! behind still expires deadlines on wall-clock time instead of drifting.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(event) = inbox.recv() => { /* route RPC */ }
//!         tick = scheduler.wait_for_tick() => {
//!             server_data.tick(tick.dt);
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```

use std::time::{Duration, Instant};

use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the loop wakes up late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Schedule the next tick one period from now. Missed ticks are
    /// folded into the next `dt`.
    #[default]
    Skip,
    /// Keep the original cadence; the next tick fires at its original
    /// slot even if that is already in the past.
    Drop,
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Tick rate in Hz, clamped to `1..=MAX_TICK_RATE_HZ`.
    pub tick_rate_hz: u32,
    pub policy: TickPolicy,
    /// Fraction of the tick period (0.0–1.0) the tick body may use before
    /// a warning is logged.
    pub budget_warn_threshold: f64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 10,
            policy: TickPolicy::default(),
            budget_warn_threshold: 0.80,
        }
    }
}

impl TickConfig {
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values. Called by [`TickScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.tick_rate_hz == 0 || self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            let clamped = self.tick_rate_hz.clamp(1, Self::MAX_TICK_RATE_HZ);
            warn!(
                rate = self.tick_rate_hz,
                clamped, "tick_rate_hz out of range, clamping"
            );
            self.tick_rate_hz = clamped;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }

    /// Length of one tick period.
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz.max(1) as f64)
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// What [`TickScheduler::wait_for_tick`] returns.
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Starts at 1.
    pub tick: u64,
    /// Time elapsed since the previous tick (or since the scheduler was
    /// created, for the first tick).
    pub dt: Duration,
    /// The tick fired more than 10% of a period late.
    pub overrun: bool,
}

/// Counters kept by the scheduler.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    /// Longest tick body reported via `record_tick_end`.
    pub max_tick_time: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-rate scheduler. One per server loop.
pub struct TickScheduler {
    config: TickConfig,
    period: Duration,
    tick_count: u64,
    next_tick: TokioInstant,
    last_tick: TokioInstant,
    tick_start: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let period = config.period();
        let now = TokioInstant::now();

        debug!(
            rate_hz = config.tick_rate_hz,
            period_ms = period.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            "tick scheduler created"
        );

        Self {
            config,
            period,
            tick_count: 0,
            next_tick: now + period,
            last_tick: now,
            tick_start: None,
            metrics: TickMetrics::default(),
        }
    }

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Sleeps until the next tick is due.
    ///
    /// Cancel-safe: if the future is dropped inside `select!` the schedule
    /// is unchanged and the next call waits for the same deadline.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let due = self.next_tick;
        time::sleep_until(due).await;

        let now = TokioInstant::now();
        let late_by = now.saturating_duration_since(due);
        let overrun = late_by > self.period / 10;

        self.next_tick = match self.config.policy {
            TickPolicy::Skip => now + self.period,
            TickPolicy::Drop => due + self.period,
        };

        let dt = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        self.metrics.total_ticks += 1;
        if overrun {
            self.metrics.total_overruns += 1;
            warn!(
                tick = self.tick_count,
                late_ms = late_by.as_secs_f64() * 1000.0,
                policy = ?self.config.policy,
                "tick overrun"
            );
        }
        trace!(tick = self.tick_count, dt_ms = dt.as_secs_f64() * 1000.0, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt,
            overrun,
        }
    }

    /// Marks the end of the tick body for budget monitoring.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        if elapsed > self.metrics.max_tick_time {
            self.metrics.max_tick_time = elapsed;
        }

        let utilization = elapsed.as_secs_f64() / self.period.as_secs_f64();
        if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = self.period.as_secs_f64() * 1000.0,
                "tick approaching budget limit"
            );
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }
}
