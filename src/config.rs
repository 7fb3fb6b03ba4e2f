use crate::error::{Result, ScanError};
use crate::progress::PROGRESS_INTERVAL;
use crate::retry::RETRY_WAIT;
use std::time::Duration;

/// Validated scan parameters. Fixed for the lifetime of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Number of workers, and therefore the cap on in-flight attempts.
    pub parallelism: usize,
    /// Log refused and timed-out ports too.
    pub verbose_failures: bool,
    /// Applies to both connect and banner read.
    pub timeout: Duration,
    /// Banner buffer size in bytes.
    pub banner_len: usize,
    /// Retry ports that fail with "no route to host".
    pub retry_no_route: bool,
    /// Upper bound of the random pause before a "no route to host" retry.
    pub max_backoff: Duration,
    /// How often the dispatcher logs a progress line.
    pub progress_interval: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            parallelism: 128,
            verbose_failures: false,
            timeout: Duration::from_secs(1),
            banner_len: 128,
            retry_no_route: false,
            max_backoff: RETRY_WAIT,
            progress_interval: PROGRESS_INTERVAL,
        }
    }
}

impl ScanConfig {
    pub fn validate(self) -> Result<Self> {
        if self.parallelism == 0 {
            return Err(ScanError::Config("parallelism must be at least 1".into()));
        }
        if self.banner_len == 0 {
            return Err(ScanError::Config("banner length must be at least 1 byte".into()));
        }
        if self.timeout.is_zero() {
            return Err(ScanError::Config("timeout must be greater than zero".into()));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ScanConfig::default().validate().unwrap();
        assert_eq!(cfg.parallelism, 128);
        assert_eq!(cfg.banner_len, 128);
        assert_eq!(cfg.timeout, Duration::from_secs(1));
    }

    #[test]
    fn zero_values_rejected() {
        for cfg in [
            ScanConfig { parallelism: 0, ..Default::default() },
            ScanConfig { banner_len: 0, ..Default::default() },
            ScanConfig { timeout: Duration::ZERO, ..Default::default() },
        ] {
            assert!(matches!(cfg.validate(), Err(ScanError::Config(_))));
        }
    }
}
