use crate::types::{per_minute, HumanDuration};
use std::fmt;
use std::time::Duration;
use time::macros::format_description;
use time::OffsetDateTime;
use tokio::time::Instant;
use tracing::info;

/// How often the dispatcher logs progress.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(15);

/// Throughput over one reporting interval, seen from the feeding loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// Zero-based index of the port just handed to a worker.
    pub index: usize,
    pub total: usize,
    pub interval: Duration,
    pub ports_in_interval: usize,
    pub open: u64,
}

impl ProgressSnapshot {
    pub fn ports_per_minute(&self) -> f64 {
        per_minute(self.ports_in_interval, self.interval)
    }

    /// Linear estimate of time left, from the average time per port in this
    /// interval. `None` when no port went out during the interval.
    pub fn remaining(&self) -> Option<Duration> {
        let done = u32::try_from(self.ports_in_interval).unwrap_or(u32::MAX);
        let left = u32::try_from(self.total.saturating_sub(self.index)).unwrap_or(u32::MAX);
        self.interval.checked_div(done)?.checked_mul(left)
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (est, etc) = match self.remaining() {
            Some(rem) => (HumanDuration(rem).to_string(), completion_clock(rem)),
            None => ("forever".to_string(), "never".to_string()),
        };
        write!(
            f,
            "Working on port {}/{} ({:.2} ports/min, {} open, {} remaining, est. completion: {})",
            self.index + 1,
            self.total,
            self.ports_per_minute(),
            self.open,
            est,
            etc
        )
    }
}

/// Wall-clock time `rem` from now, as `HH:MM:SS` local time (UTC if the offset is unknown).
fn completion_clock(rem: Duration) -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    (now + rem)
        .format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| String::from("??:??:??"))
}

/// Tracks the last report and emits a snapshot once per interval.
#[derive(Debug)]
pub struct ProgressReporter {
    interval: Duration,
    total: usize,
    last_at: Instant,
    last_index: usize,
}

impl ProgressReporter {
    pub fn new(total: usize, interval: Duration) -> Self {
        Self::starting_at(total, interval, Instant::now())
    }

    pub fn starting_at(total: usize, interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            total,
            last_at: now,
            last_index: 0,
        }
    }

    /// Called after port `index` was handed off. Returns a snapshot when the
    /// interval has passed, and starts the next interval.
    pub fn observe(&mut self, index: usize, open: u64, now: Instant) -> Option<ProgressSnapshot> {
        let interval = now.saturating_duration_since(self.last_at);
        if interval <= self.interval {
            return None;
        }
        let snapshot = ProgressSnapshot {
            index,
            total: self.total,
            interval,
            ports_in_interval: index.saturating_sub(self.last_index),
            open,
        };
        self.last_at = now;
        self.last_index = index;
        Some(snapshot)
    }

    /// [`observe`](Self::observe) at the current time, logging any snapshot.
    pub fn tick(&mut self, index: usize, open: u64) {
        if let Some(snapshot) = self.observe(index, open, Instant::now()) {
            info!("INFO {}", snapshot);
        }
    }
}
