use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::time::Duration;

use fastscan_rs::config::ScanConfig;
use fastscan_rs::logging;
use fastscan_rs::ports;
use fastscan_rs::scanner::Scanner;
use fastscan_rs::sink::LogSink;
use fastscan_rs::types::ScanContext;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// fastscan-rs — Determines which of the ports on the given target are listening.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "fastscan-rs",
    version,
    about = "Determines which of the ports on the given target are listening.",
    long_about = None
)]
struct Cli {
    /// Host name or IP address to scan.
    target: String,

    /// Scan N ports in parallel.
    #[arg(short = 'n', long, value_name = "N", default_value_t = 128)]
    parallelism: usize,

    /// Show failed connection attempts (refused, timed out).
    #[arg(short = 'f', long = "fails", default_value_t = false)]
    fails: bool,

    /// Connection and banner-grab timeout in milliseconds.
    #[arg(short = 'w', long = "timeout-ms", value_name = "MS", default_value_t = 1000)]
    timeout_ms: u64,

    /// Comma-separated list of ports and port ranges to scan.
    #[arg(short = 'p', long, value_name = "LIST", default_value = "1-65535")]
    ports: String,

    /// Max banner length, in bytes.
    #[arg(short = 'l', long = "banner-len", value_name = "BYTES", default_value_t = 128)]
    banner_len: usize,

    /// Work around "no route to host" errors by retrying after a random pause.
    #[arg(short = 'r', long, default_value_t = false)]
    retry: bool,
}

impl Cli {
    fn scan_config(&self) -> Result<ScanConfig> {
        let config = ScanConfig {
            parallelism: self.parallelism,
            verbose_failures: self.fails,
            timeout: Duration::from_millis(self.timeout_ms),
            banner_len: self.banner_len,
            retry_no_route: self.retry,
            ..ScanConfig::default()
        };
        Ok(config.validate()?)
    }
}

/// Open ports on stdout, progress and errors on stderr.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let ansi = io::stdout().is_terminal() && io::stderr().is_terminal();
    logging::subscriber(filter, ansi, io::stdout, io::stderr).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let ctx = ScanContext::start();
    let config = cli.scan_config()?;
    let ports = ports::port_list(&cli.ports).context("unable to build port list")?;

    let sink = Arc::new(LogSink::new(config.verbose_failures));
    let scanner = Scanner::new(config, sink);
    let summary = scanner
        .run(&ctx, &cli.target, ports)
        .await
        .with_context(|| format!("scan of {} aborted", cli.target))?;

    info!("INFO {}", summary);
    info!("Done.");
    Ok(())
}
