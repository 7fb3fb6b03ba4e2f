//! Cryptographically strong randomness for port ordering and retry backoff.

use crate::error::Result;
use rand::rngs::{OsRng, StdRng};
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Seed a CSPRNG from the operating system. Fails if the OS source is unavailable.
pub fn secure_rng() -> Result<StdRng> {
    Ok(StdRng::from_rng(OsRng)?)
}

/// Draw a duration uniformly from `[0, upper)`. A zero upper bound yields zero.
pub fn duration_below(upper: Duration) -> Result<Duration> {
    let nanos = u64::try_from(upper.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return Ok(Duration::ZERO);
    }
    let mut rng = secure_rng()?;
    Ok(Duration::from_nanos(rng.gen_range(0..nanos)))
}
