use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Classified result of one connection attempt.
///
/// Every variant except `NoRouteToHost` is terminal for its port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Connected; `bytes_read` banner bytes were captured (possibly zero).
    Success { bytes_read: usize },
    Refused { message: String },
    TimedOut { message: String },
    /// Retryable when the retry workaround is enabled.
    NoRouteToHost { message: String },
    OtherError { message: String },
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::NoRouteToHost { .. })
    }
}

/// Payload-free tag of an [`Outcome`], as recorded by [`crate::sink::MemorySink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Success,
    Refused,
    TimedOut,
    OtherError,
}

/// Per-scan state created when scanning starts and handed to both the
/// dispatcher and the summary step.
#[derive(Debug, Clone, Copy)]
pub struct ScanContext {
    started: Instant,
}

impl ScanContext {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn summarize(&self, ports_scanned: usize, open: u64) -> ScanSummary {
        ScanSummary {
            ports_scanned,
            elapsed: self.elapsed(),
            open,
        }
    }
}

/// Final figures for a completed scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSummary {
    pub ports_scanned: usize,
    pub elapsed: Duration,
    pub open: u64,
}

impl ScanSummary {
    pub fn ports_per_minute(&self) -> f64 {
        per_minute(self.ports_scanned, self.elapsed)
    }
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scanned {} ports in {} ({:.2} ports per minute), found {} open",
            self.ports_scanned,
            HumanDuration(self.elapsed),
            self.ports_per_minute(),
            self.open
        )
    }
}

/// Rate of `count` events over `elapsed`, in events per minute.
pub fn per_minute(count: usize, elapsed: Duration) -> f64 {
    let minutes = elapsed.as_secs_f64() / 60.0;
    if minutes > 0.0 {
        count as f64 / minutes
    } else {
        0.0
    }
}

/// Compact `1h2m3.5s` rendering for log lines.
#[derive(Debug, Clone, Copy)]
pub struct HumanDuration(pub Duration);

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Round to the precision shown before splitting, so 119.96s is 2m0.0s.
        let nanos = self.0.as_nanos();
        let millis = (nanos + 500_000) / 1_000_000;
        if millis < 60_000 {
            return write!(f, "{}.{:03}s", millis / 1000, millis % 1000);
        }
        let tenths = (nanos + 50_000_000) / 100_000_000;
        if tenths < 36_000 {
            let (m, rest) = (tenths / 600, tenths % 600);
            return write!(f, "{m}m{}.{}s", rest / 10, rest % 10);
        }
        let secs = (nanos + 500_000_000) / 1_000_000_000;
        write!(f, "{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
