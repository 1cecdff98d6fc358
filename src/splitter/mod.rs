//! Splitter core.
//!
//! Terminates one inbound TCP stream, splits it into newline-terminated
//! lines, and fans the lines out across a fixed pool of downstream
//! connections in round-robin order. A line is the atomic routing unit:
//! it is never divided between two downstream connections, and line `j` of
//! the stream always lands on slot `(start + j) mod pool_len`.
//!
//! ## Architecture
//!
//! ```text
//! Source -> Listener -> Scanner -> Cursor -> Pool slot 0 -> Sink
//!              ^                         \-> Pool slot 1 -> Sink
//!              |                                 |
//!         ReadGate  <---- saturation / drain ----/
//! ```
//!
//! One relay task owns the cursor and the pending tail, so the forwarding
//! algorithm is serialized without locks: all inbound chunks are processed
//! strictly in arrival order. The pool's writer tasks only feed back
//! saturation results and drain wakeups.

mod cursor;
mod gate;
mod pool;
pub mod scanner;

pub use pool::{OutboundPool, PoolStats, WriteOutcome, DEFAULT_HIGH_WATER_MARK};

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::config::Target;

use cursor::Cursor;
use gate::ReadGate;

/// Inbound read buffer size.
const READ_BUF_SIZE: usize = 8192;

/// Statistics for a splitter.
#[derive(Debug, Default)]
pub struct SplitterStats {
    /// Inbound connections accepted.
    pub connections_accepted: AtomicU64,
    /// Bytes read from inbound streams.
    pub bytes_in: AtomicU64,
    /// Complete lines forwarded downstream.
    pub lines_forwarded: AtomicU64,
    /// Unterminated tails flushed at stream end.
    pub tail_flushes: AtomicU64,
    /// Times inbound reads were paused by a saturated slot.
    pub pauses: AtomicU64,
    /// Times inbound reads resumed after a drain.
    pub resumes: AtomicU64,
}

/// The splitter role: one listening socket, one fixed outbound pool.
pub struct Splitter {
    listener: TcpListener,
    pool: OutboundPool,
    cursor: Cursor,
    gate: ReadGate,
    stats: Arc<SplitterStats>,
}

impl Splitter {
    /// Bind the listening socket and connect the outbound pool.
    ///
    /// The pool is built once, in target-list order, before any inbound
    /// connection is accepted; a connect failure here is fatal.
    pub async fn bind<A: ToSocketAddrs>(
        listen_addr: A,
        targets: &[Target],
        high_water_mark: usize,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(listen_addr).await?;

        let drained = Arc::new(Notify::new());
        let pool = OutboundPool::connect(targets, high_water_mark, Arc::clone(&drained)).await?;
        let cursor = Cursor::new(pool.len());

        info!(
            bind_addr = %listener.local_addr()?,
            targets = pool.len(),
            high_water_mark,
            "Splitter bound"
        );

        Ok(Self {
            listener,
            pool,
            cursor,
            gate: ReadGate::new(drained),
            stats: Arc::new(SplitterStats::default()),
        })
    }

    /// Local address of the listening socket.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Splitter counters.
    pub fn stats(&self) -> Arc<SplitterStats> {
        Arc::clone(&self.stats)
    }

    /// Outbound pool counters.
    pub fn pool_stats(&self) -> Arc<PoolStats> {
        self.pool.stats()
    }

    /// Accept and relay inbound connections, one at a time.
    ///
    /// The design assumes a single concurrent inbound connection; a second
    /// connection waits in the accept backlog until the current one ends.
    /// The cursor position persists across successive connections.
    pub async fn run(mut self) -> io::Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    self.stats
                        .connections_accepted
                        .fetch_add(1, Ordering::Relaxed);
                    info!(peer_addr = %peer_addr, "Inbound connection");
                    self.relay(stream, peer_addr).await;
                }
                Err(e) => {
                    error!(error = %e, "Accept error");
                    // Brief sleep to avoid a tight loop on persistent errors
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    /// Relay one inbound stream until it ends.
    ///
    /// An inbound read error is treated the same as a clean end of stream:
    /// the pending tail is flushed and the connection is released.
    async fn relay(&mut self, mut stream: TcpStream, peer_addr: SocketAddr) {
        let mut pending = BytesMut::new();
        let mut buf = vec![0u8; READ_BUF_SIZE];
        let mut conn_bytes_in = 0u64;
        let mut conn_lines = 0u64;

        loop {
            if self.gate.is_paused() {
                self.gate.wait_resume().await;
                self.stats.resumes.fetch_add(1, Ordering::Relaxed);
                debug!(peer_addr = %peer_addr, "Inbound reads resumed");
            }

            let n = match stream.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!(peer_addr = %peer_addr, error = %e, "Inbound read failed; treating as end of stream");
                    break;
                }
            };

            self.stats.bytes_in.fetch_add(n as u64, Ordering::Relaxed);
            conn_bytes_in += n as u64;
            pending.extend_from_slice(&buf[..n]);
            conn_lines += self.forward_complete_lines(&mut pending);
        }

        // Whatever never got a terminator goes out as one final unit, to the
        // slot the cursor currently points at, without advancing it.
        if !pending.is_empty() {
            let tail = pending.split().freeze();
            debug!(
                peer_addr = %peer_addr,
                bytes = tail.len(),
                slot = self.cursor.current(),
                "Flushing unterminated tail at stream end"
            );
            self.stats.tail_flushes.fetch_add(1, Ordering::Relaxed);
            self.pool.write(self.cursor.current(), tail);
        }

        info!(
            peer_addr = %peer_addr,
            lines = conn_lines,
            bytes_in = conn_bytes_in,
            "Inbound stream ended"
        );
    }

    /// Forward every complete line buffered in `pending`.
    ///
    /// Splits off everything up to and including the last newline, routes
    /// each line to `pool[cursor]`, and advances the cursor once per line,
    /// after the write, never per chunk. The remainder stays in `pending`
    /// as the tail for the next chunk. If a write saturates its slot, the
    /// read gate pauses; lines later in the same chunk are still written to
    /// their own slots. Returns the number of lines forwarded.
    fn forward_complete_lines(&mut self, pending: &mut BytesMut) -> u64 {
        let Some(last_newline) = pending.iter().rposition(|&b| b == b'\n') else {
            return 0;
        };
        let complete = pending.split_to(last_newline + 1).freeze();

        let scan = scanner::scan(&complete);
        debug_assert!(scan.tail.is_empty());
        let forwarded = scan.lines.len() as u64;

        for line in scan.lines {
            let line = complete.slice_ref(line);
            let outcome = self.pool.write(self.cursor.current(), line);
            self.cursor.advance();
            self.stats.lines_forwarded.fetch_add(1, Ordering::Relaxed);

            if outcome == WriteOutcome::Saturated && !self.gate.is_paused() {
                self.stats.pauses.fetch_add(1, Ordering::Relaxed);
                self.gate.pause();
                debug!("Slot saturated; pausing inbound reads");
            }
        }

        forwarded
    }
}
