use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time;

/// A single connect-and-banner-grab against one `host:port` target.
pub trait Probe: Send + Sync + 'static {
    /// Connect to `target` and read at most `buf.len()` banner bytes.
    ///
    /// Returns the number of bytes placed in `buf`, or the dial error.
    fn attempt(
        &self,
        target: &str,
        buf: &mut [u8],
        timeout: Duration,
    ) -> impl Future<Output = io::Result<usize>> + Send;
}

/// Plain TCP connect probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProbe;

impl Probe for TcpProbe {
    async fn attempt(&self, target: &str, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let mut stream = match time::timeout(timeout, TcpStream::connect(target)).await {
            Ok(res) => res?,
            Err(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("dial tcp {target}: i/o timeout"),
                ))
            }
        };
        // A read error, deadline or EOF still means the port is open.
        let n = match time::timeout(timeout, stream.read(buf)).await {
            Ok(Ok(n)) => n,
            _ => 0,
        };
        Ok(n)
    }
}

/// Escape banner bytes for a single log line, e.g. `"SSH-2.0\r\n"`.
pub fn quote_banner(banner: &[u8]) -> String {
    format!("\"{}\"", banner.escape_ascii())
}
