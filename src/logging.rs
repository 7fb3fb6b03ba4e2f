//! Log routing: `SUCCESS` lines go to one writer, everything else to another.

use crate::sink::is_success_event;
use tracing::Subscriber;
use tracing_subscriber::filter::{filter_fn, EnvFilter};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::prelude::*;

/// Build the process subscriber. `main` passes stdout for `results` and stderr
/// for `diagnostics`, so redirecting stdout captures only open ports.
pub fn subscriber<R, D>(
    filter: EnvFilter,
    ansi: bool,
    results: R,
    diagnostics: D,
) -> impl Subscriber + Send + Sync + 'static
where
    R: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    D: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let results = fmt::layer()
        .with_writer(results)
        .with_ansi(ansi)
        .with_target(false)
        .with_level(false)
        .with_filter(filter_fn(is_success_event));
    let diagnostics = fmt::layer()
        .with_writer(diagnostics)
        .with_ansi(ansi)
        .with_target(false)
        .with_level(false)
        .with_filter(filter_fn(|meta| !is_success_event(meta)));

    tracing_subscriber::registry()
        .with(filter)
        .with(results)
        .with(diagnostics)
}
