//! Sink role: append every received byte, verbatim, to a local file.
//!
//! Each accepted connection opens the output file in append mode and writes
//! chunks as they arrive, with no reordering or transformation. A file
//! write failure drops that connection; the data for the failed write is
//! lost and the failure is reported.

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, error, info, warn};

/// Statistics for a sink.
#[derive(Debug, Default)]
pub struct SinkStats {
    /// Connections accepted.
    pub connections_accepted: AtomicU64,
    /// Bytes appended to the output file.
    pub bytes_written: AtomicU64,
}

/// The sink role: one listening socket, one append-only output file.
pub struct Sink {
    listener: TcpListener,
    file: PathBuf,
    stats: Arc<SinkStats>,
}

impl Sink {
    /// Bind the listening socket.
    pub async fn bind<A: ToSocketAddrs>(addr: A, file: PathBuf) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(
            bind_addr = %listener.local_addr()?,
            file = %file.display(),
            "Sink bound"
        );
        Ok(Self {
            listener,
            file,
            stats: Arc::new(SinkStats::default()),
        })
    }

    /// Local address of the listening socket.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Sink counters.
    pub fn stats(&self) -> Arc<SinkStats> {
        Arc::clone(&self.stats)
    }

    /// Accept connections and append their bytes to the output file.
    pub async fn run(self) -> io::Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    self.stats
                        .connections_accepted
                        .fetch_add(1, Ordering::Relaxed);
                    debug!(peer_addr = %peer_addr, "Sink connection accepted");

                    let file = self.file.clone();
                    let stats = Arc::clone(&self.stats);
                    tokio::spawn(async move {
                        match append_stream(stream, &file, &stats).await {
                            Ok(bytes) => {
                                debug!(peer_addr = %peer_addr, bytes, "Sink connection ended");
                            }
                            Err(e) => {
                                warn!(peer_addr = %peer_addr, error = %e, "Sink connection failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Accept error");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}

/// Drain one connection into the output file.
async fn append_stream(mut stream: TcpStream, path: &Path, stats: &SinkStats) -> io::Result<u64> {
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .await?;

    let mut buf = vec![0u8; 8192];
    let mut total = 0u64;
    loop {
        match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                file.write_all(&buf[..n]).await?;
                stats.bytes_written.fetch_add(n as u64, Ordering::Relaxed);
                total += n as u64;
            }
            Err(e) => return Err(e),
        }
    }
    file.flush().await?;
    Ok(total)
}
