use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fastscan_rs::config::ScanConfig;
use fastscan_rs::error::{Result as ScanResult, ScanError};
use fastscan_rs::ports::PortSequence;
use fastscan_rs::probe::Probe;
use fastscan_rs::scanner::Scanner;
use fastscan_rs::sink::{MemorySink, ResultSink};
use fastscan_rs::types::{OutcomeKind, ScanContext};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

/// Probe whose answer is computed from the target and the attempt number.
struct ScriptedProbe<F> {
    answer: F,
    attempts: Mutex<HashMap<String, u32>>,
}

impl<F> ScriptedProbe<F>
where
    F: Fn(u32, u32, &mut [u8]) -> io::Result<usize> + Send + Sync + 'static,
{
    fn new(answer: F) -> Self {
        Self {
            answer,
            attempts: Mutex::new(HashMap::new()),
        }
    }
}

impl<F> Probe for ScriptedProbe<F>
where
    F: Fn(u32, u32, &mut [u8]) -> io::Result<usize> + Send + Sync + 'static,
{
    async fn attempt(&self, target: &str, buf: &mut [u8], _timeout: Duration) -> io::Result<usize> {
        let port: u32 = target.rsplit(':').next().unwrap().parse().unwrap();
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(target.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        (self.answer)(port, attempt, buf)
    }
}

fn config(parallelism: usize) -> ScanConfig {
    ScanConfig {
        parallelism,
        max_backoff: Duration::from_millis(5),
        ..ScanConfig::default()
    }
}

/// Odd ports answer with a two-byte banner, even ports refuse.
fn odd_ports_open(port: u32, _attempt: u32, buf: &mut [u8]) -> io::Result<usize> {
    if port % 2 == 1 {
        buf[..2].copy_from_slice(b"ok");
        Ok(2)
    } else {
        Err(io::Error::from(io::ErrorKind::ConnectionRefused))
    }
}

#[tokio::test]
async fn one_terminal_outcome_per_port_for_any_pool_size() {
    for (n, workers) in [(1u32, 1usize), (40, 1), (40, 7), (5, 64), (0, 3), (300, 32)] {
        let sink = Arc::new(MemorySink::new());
        let scanner = Scanner::with_probe(config(workers), ScriptedProbe::new(odd_ports_open), sink.clone());
        let ports: PortSequence = (1..=n).collect::<Vec<_>>().into();

        let summary = scanner
            .run(&ScanContext::start(), "10.0.0.1", ports)
            .await
            .expect("scan completes");

        let records = sink.records();
        assert_eq!(records.len(), n as usize, "n={n} workers={workers}");
        let unique: HashSet<_> = records.iter().map(|r| r.target.clone()).collect();
        assert_eq!(unique.len(), n as usize);

        let successes = sink.count(OutcomeKind::Success);
        assert_eq!(successes, ((n + 1) / 2) as usize);
        assert_eq!(sink.open_count(), successes as u64);
        assert_eq!(summary.ports_scanned, n as usize);
        assert_eq!(summary.open, successes as u64);
        assert!(records
            .iter()
            .filter(|r| r.kind == OutcomeKind::Success)
            .all(|r| r.banner == b"ok"));
    }
}

#[tokio::test]
async fn no_route_is_retried_until_it_clears() {
    let sink = Arc::new(MemorySink::new());
    let probe = ScriptedProbe::new(|_port, attempt, _buf| {
        if attempt <= 3 {
            Err(io::Error::other("dial tcp: connect: no route to host"))
        } else {
            Err(io::Error::from(io::ErrorKind::ConnectionRefused))
        }
    });
    let cfg = ScanConfig {
        retry_no_route: true,
        ..config(4)
    };
    let scanner = Scanner::with_probe(cfg, probe, sink.clone());

    scanner
        .run(&ScanContext::start(), "10.0.0.1", vec![21, 22, 23].into())
        .await
        .unwrap();

    assert_eq!(sink.records().len(), 3);
    assert_eq!(sink.count(OutcomeKind::Refused), 3);
}

#[tokio::test]
async fn no_route_without_retry_is_an_error() {
    let sink = Arc::new(MemorySink::new());
    let probe = ScriptedProbe::new(|_port, attempt, _buf| {
        assert_eq!(attempt, 1, "no retries expected");
        Err(io::Error::from(io::ErrorKind::HostUnreachable))
    });
    let scanner = Scanner::with_probe(config(2), probe, sink.clone());

    let summary = scanner
        .run(&ScanContext::start(), "10.0.0.1", vec![80, 443].into())
        .await
        .unwrap();

    assert_eq!(sink.count(OutcomeKind::OtherError), 2);
    assert_eq!(summary.open, 0);
}

#[tokio::test]
async fn entropy_failure_during_backoff_aborts_the_scan() {
    let sink = Arc::new(MemorySink::new());
    let probe = ScriptedProbe::new(|port, _attempt, _buf| {
        if port == 7 {
            Err(io::Error::from(io::ErrorKind::HostUnreachable))
        } else {
            Err(io::Error::from(io::ErrorKind::ConnectionRefused))
        }
    });
    let cfg = ScanConfig {
        retry_no_route: true,
        ..config(3)
    };
    let scanner = Scanner::with_probe(cfg, probe, sink.clone()).with_backoff_source(Arc::new(
        |_: Duration| -> ScanResult<Duration> {
            Err(rand::Error::new(io::Error::other("random source unavailable")).into())
        },
    ));

    let res = scanner
        .run(&ScanContext::start(), "10.0.0.1", (1..=500).collect::<Vec<u32>>().into())
        .await;

    assert!(matches!(res, Err(ScanError::Entropy(_))), "got {res:?}");
    // Port 7 never reached a terminal outcome, and feeding stopped early.
    let records = sink.records();
    assert!(records.iter().all(|r| r.target != "10.0.0.1:7"));
    assert!(records.len() < 499);
}

#[tokio::test]
async fn injected_backoff_keeps_retrying() {
    let sink = Arc::new(MemorySink::new());
    let probe = ScriptedProbe::new(|_port, attempt, _buf| {
        if attempt < 5 {
            Err(io::Error::from(io::ErrorKind::HostUnreachable))
        } else {
            Ok(0)
        }
    });
    let cfg = ScanConfig {
        retry_no_route: true,
        ..config(2)
    };
    let scanner = Scanner::with_probe(cfg, probe, sink.clone())
        .with_backoff_source(Arc::new(|_: Duration| -> ScanResult<Duration> { Ok(Duration::ZERO) }));

    let summary = scanner
        .run(&ScanContext::start(), "10.0.0.1", vec![1, 2, 3].into())
        .await
        .unwrap();
    assert_eq!(summary.open, 3);
    assert_eq!(sink.count(OutcomeKind::Success), 3);
}

#[tokio::test]
async fn panicking_connector_is_reported_as_worker_failure() {
    let sink = Arc::new(MemorySink::new());
    let probe = ScriptedProbe::new(|_port, _attempt, _buf| -> io::Result<usize> {
        panic!("connector exploded")
    });
    let scanner = Scanner::with_probe(config(3), probe, sink.clone());

    let res = scanner
        .run(&ScanContext::start(), "10.0.0.1", (1..=20).collect::<Vec<u32>>().into())
        .await;

    assert!(matches!(res, Err(ScanError::Worker(_))), "got {res:?}");
    assert!(sink.records().is_empty());
}

#[tokio::test]
async fn invalid_config_is_rejected_before_scanning() {
    let sink = Arc::new(MemorySink::new());
    let scanner = Scanner::with_probe(config(0), ScriptedProbe::new(odd_ports_open), sink.clone());
    let res = scanner
        .run(&ScanContext::start(), "10.0.0.1", vec![1, 2].into())
        .await;
    assert!(res.is_err());
    assert!(sink.records().is_empty());
}

#[tokio::test]
async fn loopback_scan_reports_banner_and_refused_port() {
    let open = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open_port = open.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut sock, _)) = open.accept().await {
            let _ = sock.write_all(b"HELLO").await;
        }
    });

    let silent = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let silent_port = silent.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((sock, _)) = silent.accept().await {
            held.push(sock);
        }
    });

    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed_port = closed.local_addr().unwrap().port();
    drop(closed);

    let sink = Arc::new(MemorySink::new());
    let scanner = Scanner::new(config(4), sink.clone());
    let ports: PortSequence = vec![open_port as u32, silent_port as u32, closed_port as u32].into();
    let summary = scanner
        .run(&ScanContext::start(), "127.0.0.1", ports)
        .await
        .unwrap();

    let by_target: HashMap<_, _> = sink
        .records()
        .into_iter()
        .map(|r| (r.target.clone(), r))
        .collect();

    let hello = &by_target[&format!("127.0.0.1:{open_port}")];
    assert_eq!(hello.kind, OutcomeKind::Success);
    assert_eq!(hello.banner, b"HELLO");

    let quiet = &by_target[&format!("127.0.0.1:{silent_port}")];
    assert_eq!(quiet.kind, OutcomeKind::Success);
    assert!(quiet.banner.is_empty());

    assert_eq!(by_target[&format!("127.0.0.1:{closed_port}")].kind, OutcomeKind::Refused);
    assert_eq!(summary.open, 2);
}
