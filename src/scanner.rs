use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use crate::ports::{join_host_port, PortSequence};
use crate::probe::{Probe, TcpProbe};
use crate::progress::ProgressReporter;
use crate::retry::{classify, BackoffSource, Decision, RetryPolicy};
use crate::sink::ResultSink;
use crate::types::{Outcome, ScanContext, ScanSummary};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Producer half of the handoff queue.
///
/// There is no buffer: a port only leaves [`HandoffSender::send`] once an idle
/// worker has taken it, so in-flight attempts never exceed the worker count.
#[derive(Debug)]
pub struct HandoffSender {
    ready: mpsc::Receiver<oneshot::Sender<u32>>,
}

/// Worker half of the handoff queue.
#[derive(Debug, Clone)]
pub struct HandoffReceiver {
    ready: mpsc::Sender<oneshot::Sender<u32>>,
}

/// Create a handoff queue for up to `workers` receivers.
pub fn handoff(workers: usize) -> (HandoffSender, HandoffReceiver) {
    let (tx, rx) = mpsc::channel(workers.max(1));
    (HandoffSender { ready: rx }, HandoffReceiver { ready: tx })
}

impl HandoffSender {
    /// Wait for an idle worker and hand it `port`. Gives the port back if no
    /// receiver is left.
    pub async fn send(&mut self, mut port: u32) -> std::result::Result<(), u32> {
        loop {
            let Some(slot) = self.ready.recv().await else {
                return Err(port);
            };
            match slot.send(port) {
                Ok(()) => return Ok(()),
                // That worker went away after announcing itself; try the next one.
                Err(p) => port = p,
            }
        }
    }
}

impl HandoffReceiver {
    /// Announce readiness and wait for a port. `None` once the sender is dropped.
    pub async fn recv(&self) -> Option<u32> {
        let (tx, rx) = oneshot::channel();
        self.ready.send(tx).await.ok()?;
        rx.await.ok()
    }
}

struct Worker<P> {
    id: usize,
    host: Arc<str>,
    probe: Arc<P>,
    policy: RetryPolicy,
    timeout: Duration,
    buf: Vec<u8>,
    sink: Arc<dyn ResultSink>,
}

impl<P: Probe> Worker<P> {
    async fn run(mut self, queue: HandoffReceiver, cancel: CancellationToken) -> Result<()> {
        while let Some(port) = queue.recv().await {
            if let Err(e) = self.scan_port(port).await {
                cancel.cancel();
                return Err(e);
            }
        }
        debug!(worker = self.id, "queue closed, worker exiting");
        Ok(())
    }

    /// Attempt `port` until it reaches a terminal outcome, then report it once.
    async fn scan_port(&mut self, port: u32) -> Result<Outcome> {
        let target = join_host_port(&self.host, port);
        let outcome = loop {
            let result = self.probe.attempt(&target, &mut self.buf, self.timeout).await;
            match self.policy.decide(classify(result))? {
                Decision::Done(outcome) => break outcome,
                Decision::Retry(delay) => {
                    debug!(worker = self.id, %target, ?delay, "no route to host, will retry");
                    time::sleep(delay).await;
                }
            }
        };
        debug_assert!(outcome.is_terminal());

        let banner: &[u8] = match outcome {
            Outcome::Success { bytes_read } => &self.buf[..bytes_read.min(self.buf.len())],
            _ => &[],
        };
        self.sink.record(&target, &outcome, banner);
        Ok(outcome)
    }
}

/// Fixed-size worker pool that scans one host.
pub struct Scanner<P = TcpProbe> {
    config: ScanConfig,
    probe: Arc<P>,
    sink: Arc<dyn ResultSink>,
    backoff: Option<BackoffSource>,
}

impl Scanner<TcpProbe> {
    pub fn new(config: ScanConfig, sink: Arc<dyn ResultSink>) -> Self {
        Self::with_probe(config, TcpProbe, sink)
    }
}

impl<P: Probe> Scanner<P> {
    pub fn with_probe(config: ScanConfig, probe: P, sink: Arc<dyn ResultSink>) -> Self {
        Self {
            config,
            probe: Arc::new(probe),
            sink,
            backoff: None,
        }
    }

    /// Draw "no route to host" pauses from `source` instead of the OS random source.
    pub fn with_backoff_source(mut self, source: BackoffSource) -> Self {
        self.backoff = Some(source);
        self
    }

    /// Scan every port in `ports` on `host`.
    ///
    /// - spawns `parallelism` workers, each owning a `banner_len` read buffer
    /// - feeds ports in order through the handoff queue, logging progress inline
    /// - closes the queue and waits for every worker before summarizing
    ///
    /// Per-port failures go to the sink. Only a failing random source (or a
    /// crashed worker) aborts the scan, in which case no summary is produced.
    pub async fn run(
        &self,
        ctx: &ScanContext,
        host: &str,
        ports: PortSequence,
    ) -> Result<ScanSummary> {
        let config = self.config.clone().validate()?;
        let total = ports.len();
        let host: Arc<str> = Arc::from(host);
        let mut policy = RetryPolicy::new(config.retry_no_route).with_max_backoff(config.max_backoff);
        if let Some(source) = &self.backoff {
            policy = policy.with_backoff_source(source.clone());
        }
        let cancel = CancellationToken::new();
        let (mut queue, worker_queue) = handoff(config.parallelism);

        let mut set = JoinSet::new();
        for id in 0..config.parallelism {
            let worker = Worker {
                id,
                host: host.clone(),
                probe: self.probe.clone(),
                policy: policy.clone(),
                timeout: config.timeout,
                buf: vec![0u8; config.banner_len],
                sink: self.sink.clone(),
            };
            set.spawn(worker.run(worker_queue.clone(), cancel.clone()));
        }
        drop(worker_queue);

        let mut progress = ProgressReporter::new(total, config.progress_interval);
        for (index, port) in ports.into_iter().enumerate() {
            let handed_off = tokio::select! {
                biased;
                _ = cancel.cancelled() => false,
                sent = queue.send(port) => sent.is_ok(),
            };
            if !handed_off {
                break;
            }
            progress.tick(index, self.sink.open_count());
        }
        drop(queue);
        if !cancel.is_cancelled() {
            info!("INFO Waiting for the workers to finish");
        }

        let mut failure = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failure.get_or_insert(e);
                    set.abort_all();
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    failure.get_or_insert(ScanError::Worker(e));
                    set.abort_all();
                }
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        Ok(ctx.summarize(total, self.sink.open_count()))
    }
}
