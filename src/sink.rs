use crate::probe::quote_banner;
use crate::types::{Outcome, OutcomeKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{info, warn, Metadata};

/// Tracing target of `SUCCESS` lines, so they can be routed apart from diagnostics.
pub const SUCCESS_TARGET: &str = "success";

/// True for events emitted by [`LogSink::success`].
pub fn is_success_event(meta: &Metadata<'_>) -> bool {
    meta.target() == SUCCESS_TARGET
}

/// Receives the terminal outcome of every scanned port.
///
/// Implementations are shared by all workers and must tolerate concurrent calls.
pub trait ResultSink: Send + Sync {
    /// Port is open. Counts towards [`ResultSink::open_count`].
    fn success(&self, target: &str, banner: &[u8]);
    fn refused(&self, target: &str, detail: &str);
    fn timed_out(&self, target: &str, detail: &str);
    /// Unexpected dial error, including "no route to host" when not retrying.
    fn error(&self, target: &str, detail: &str);
    fn open_count(&self) -> u64;

    /// Dispatch a terminal outcome to the matching method.
    fn record(&self, target: &str, outcome: &Outcome, banner: &[u8]) {
        match outcome {
            Outcome::Success { .. } => self.success(target, banner),
            Outcome::Refused { message } => self.refused(target, message),
            Outcome::TimedOut { message } => self.timed_out(target, message),
            Outcome::NoRouteToHost { message } | Outcome::OtherError { message } => {
                self.error(target, message)
            }
        }
    }
}

/// Logs outcomes through `tracing`. `FAIL` lines only appear with `verbose_failures`.
#[derive(Debug, Default)]
pub struct LogSink {
    open: AtomicU64,
    verbose_failures: bool,
}

impl LogSink {
    pub fn new(verbose_failures: bool) -> Self {
        Self {
            open: AtomicU64::new(0),
            verbose_failures,
        }
    }
}

impl ResultSink for LogSink {
    fn success(&self, target: &str, banner: &[u8]) {
        self.open.fetch_add(1, Ordering::Relaxed);
        info!(target: SUCCESS_TARGET, "SUCCESS {} {}", target, quote_banner(banner));
    }

    fn refused(&self, target: &str, detail: &str) {
        if self.verbose_failures {
            info!("FAIL {} {}", target, detail);
        }
    }

    fn timed_out(&self, target: &str, detail: &str) {
        if self.verbose_failures {
            info!("FAIL {} {}", target, detail);
        }
    }

    fn error(&self, target: &str, detail: &str) {
        warn!("ERROR {} {}", target, detail);
    }

    fn open_count(&self) -> u64 {
        self.open.load(Ordering::Relaxed)
    }
}

/// One outcome captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub target: String,
    pub kind: OutcomeKind,
    pub banner: Vec<u8>,
    pub detail: String,
}

/// Keeps every outcome in memory, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    open: AtomicU64,
    records: Mutex<Vec<Recorded>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Recorded> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.records().iter().filter(|r| r.kind == kind).count()
    }

    fn push(&self, target: &str, kind: OutcomeKind, banner: &[u8], detail: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push(Recorded {
                target: target.to_string(),
                kind,
                banner: banner.to_vec(),
                detail: detail.to_string(),
            });
        }
    }
}

impl ResultSink for MemorySink {
    fn success(&self, target: &str, banner: &[u8]) {
        self.open.fetch_add(1, Ordering::Relaxed);
        self.push(target, OutcomeKind::Success, banner, "");
    }

    fn refused(&self, target: &str, detail: &str) {
        self.push(target, OutcomeKind::Refused, &[], detail);
    }

    fn timed_out(&self, target: &str, detail: &str) {
        self.push(target, OutcomeKind::TimedOut, &[], detail);
    }

    fn error(&self, target: &str, detail: &str) {
        self.push(target, OutcomeKind::OtherError, &[], detail);
    }

    fn open_count(&self) -> u64 {
        self.open.load(Ordering::Relaxed)
    }
}
