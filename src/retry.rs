//! Classification of attempt results and the "no route to host" workaround.

use crate::entropy;
use crate::error::Result;
use crate::types::Outcome;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// Longest pause before re-attempting a port after "no route to host".
pub const RETRY_WAIT: Duration = Duration::from_secs(30);

/// What a worker does next with a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Sleep, then attempt the same port again.
    Retry(Duration),
    /// Report this outcome and move on.
    Done(Outcome),
}

/// Draws a pause in `[0, upper)`. Defaults to [`entropy::duration_below`].
pub type BackoffSource = Arc<dyn Fn(Duration) -> Result<Duration> + Send + Sync>;

#[derive(Clone)]
pub struct RetryPolicy {
    retry_no_route: bool,
    max_backoff: Duration,
    draw: BackoffSource,
}

impl RetryPolicy {
    pub fn new(retry_no_route: bool) -> Self {
        Self {
            retry_no_route,
            max_backoff: RETRY_WAIT,
            draw: Arc::new(entropy::duration_below),
        }
    }

    /// Override the backoff window.
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Replace the random source used for backoff pauses.
    pub fn with_backoff_source(mut self, draw: BackoffSource) -> Self {
        self.draw = draw;
        self
    }

    /// Decide whether `outcome` ends the port or calls for another attempt.
    ///
    /// There is no retry cap: a route that never comes back keeps its worker busy.
    /// Only a failing random source makes this an error.
    pub fn decide(&self, outcome: Outcome) -> Result<Decision> {
        match outcome {
            Outcome::NoRouteToHost { .. } if self.retry_no_route => {
                Ok(Decision::Retry(self.backoff()?))
            }
            Outcome::NoRouteToHost { message } => Ok(Decision::Done(Outcome::OtherError { message })),
            other => Ok(Decision::Done(other)),
        }
    }

    /// Random pause in `[0, max_backoff)`.
    pub fn backoff(&self) -> Result<Duration> {
        (self.draw)(self.max_backoff)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("retry_no_route", &self.retry_no_route)
            .field("max_backoff", &self.max_backoff)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Map an attempt result onto an [`Outcome`].
///
/// Only an expired connect deadline ("i/o timeout") is `TimedOut`; an OS-level
/// `ETIMEDOUT` ("connection timed out") is an unexpected error.
pub fn classify(result: io::Result<usize>) -> Outcome {
    let err = match result {
        Ok(bytes_read) => return Outcome::Success { bytes_read },
        Err(err) => err,
    };
    let message = err.to_string();
    let lower = message.to_ascii_lowercase();

    if err.kind() == io::ErrorKind::HostUnreachable || lower.contains("no route to host") {
        Outcome::NoRouteToHost { message }
    } else if lower.ends_with("i/o timeout") {
        Outcome::TimedOut { message }
    } else if err.kind() == io::ErrorKind::ConnectionRefused || lower.contains("connection refused") {
        Outcome::Refused { message }
    } else {
        Outcome::OtherError { message }
    }
}
