//! Test harness for splitter integration tests.
//!
//! Provides capture sinks that record every byte they receive, a spawnable
//! splitter handle, and chunked senders for exercising boundary and
//! backpressure behavior.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, Mutex};

use linefan::splitter::{PoolStats, Splitter, SplitterStats};
use linefan::Target;

/// A sink stand-in that records every byte received on every connection.
#[allow(dead_code)]
pub struct CaptureSink {
    pub addr: SocketAddr,
    pub connections: Arc<AtomicU64>,
    data: Arc<Mutex<Vec<u8>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

#[allow(dead_code)]
impl CaptureSink {
    pub async fn spawn() -> io::Result<Self> {
        Self::spawn_with_delay(None).await
    }

    /// Spawn a sink that sleeps `delay` between reads (a slow consumer).
    pub async fn spawn_with_delay(delay: Option<Duration>) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let data = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicU64::new(0));

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let data_clone = Arc::clone(&data);
        let conn_clone = Arc::clone(&connections);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok((mut stream, _)) => {
                                conn_clone.fetch_add(1, Ordering::Relaxed);
                                let data = Arc::clone(&data_clone);
                                tokio::spawn(async move {
                                    let mut buf = vec![0u8; 4096];
                                    loop {
                                        match stream.read(&mut buf).await {
                                            Ok(0) => break,
                                            Ok(n) => {
                                                data.lock().await.extend_from_slice(&buf[..n]);
                                                if let Some(d) = delay {
                                                    tokio::time::sleep(d).await;
                                                }
                                            }
                                            Err(_) => break,
                                        }
                                    }
                                });
                            }
                            Err(_) => break,
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
        });

        Ok(Self {
            addr,
            connections,
            data,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Spawn a sink that resets its connection once `limit` bytes have
    /// arrived, simulating a downstream failure mid-stream. Linger is set
    /// to zero so the close is an RST and later writes fail fast.
    pub async fn spawn_resetting_after(limit: usize) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let data = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicU64::new(0));

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let data_clone = Arc::clone(&data);
        let conn_clone = Arc::clone(&connections);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok((mut stream, _)) => {
                                conn_clone.fetch_add(1, Ordering::Relaxed);
                                let data = Arc::clone(&data_clone);
                                tokio::spawn(async move {
                                    let mut buf = vec![0u8; 4096];
                                    let mut total = 0usize;
                                    loop {
                                        match stream.read(&mut buf).await {
                                            Ok(0) => break,
                                            Ok(n) => {
                                                total += n;
                                                data.lock().await.extend_from_slice(&buf[..n]);
                                                if total >= limit {
                                                    let _ = stream.set_linger(Some(Duration::ZERO));
                                                    break;
                                                }
                                            }
                                            Err(_) => break,
                                        }
                                    }
                                });
                            }
                            Err(_) => break,
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
        });

        Ok(Self {
            addr,
            connections,
            data,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn target(&self) -> Target {
        Target {
            host: "127.0.0.1".to_string(),
            port: self.addr.port(),
        }
    }

    pub async fn received(&self) -> Vec<u8> {
        self.data.lock().await.clone()
    }

    /// Wait until at least `n` bytes have arrived, panicking on timeout.
    pub async fn wait_for_bytes(&self, n: usize, timeout: Duration) -> Vec<u8> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let data = self.received().await;
            if data.len() >= n {
                return data;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "timed out waiting for {} bytes on {} (got {})",
                    n,
                    self.addr,
                    data.len()
                );
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl Drop for CaptureSink {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// A running splitter plus handles to its counters.
#[allow(dead_code)]
pub struct SplitterHandle {
    pub addr: SocketAddr,
    pub stats: Arc<SplitterStats>,
    pub pool_stats: Arc<PoolStats>,
}

#[allow(dead_code)]
pub async fn spawn_splitter(targets: &[Target], high_water_mark: usize) -> io::Result<SplitterHandle> {
    let splitter = Splitter::bind("127.0.0.1:0", targets, high_water_mark).await?;
    let addr = splitter.local_addr()?;
    let stats = splitter.stats();
    let pool_stats = splitter.pool_stats();

    tokio::spawn(async move {
        let _ = splitter.run().await;
    });

    Ok(SplitterHandle {
        addr,
        stats,
        pool_stats,
    })
}

/// Send `payload` to `addr` in one connection, split into `chunk_size`-byte
/// writes with a short pause between them, then half-close.
#[allow(dead_code)]
pub async fn send_chunked(addr: SocketAddr, payload: &[u8], chunk_size: usize) -> io::Result<()> {
    let mut stream = TcpStream::connect(addr).await?;
    for chunk in payload.chunks(chunk_size) {
        stream.write_all(chunk).await?;
        stream.flush().await?;
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    stream.shutdown().await?;
    Ok(())
}

/// Send `payload` in one write, then half-close.
#[allow(dead_code)]
pub async fn send_all(addr: SocketAddr, payload: &[u8]) -> io::Result<()> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(payload).await?;
    stream.shutdown().await?;
    Ok(())
}
