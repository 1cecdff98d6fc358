//! Outbound connection pool.
//!
//! The pool is an ordered, fixed-size sequence of downstream connections,
//! one per configured target, connected once at startup in target-list
//! order. The sequence is never reordered, shrunk, or grown; a slot whose
//! connection dies keeps its position (and its round-robin turns) for the
//! process lifetime.
//!
//! Each slot owns a writer task that drains a queue of line-sized chunks
//! into its socket. Queueing a write never blocks and never drops data; the
//! slot instead reports saturation once its queued-but-unflushed byte count
//! reaches the high-water mark, and signals a drain when the queue empties.

use std::io;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info};

use crate::config::Target;

/// Default per-slot high-water mark in bytes.
///
/// Matches the 16 KiB write-buffer threshold the relay's transport has
/// always used as its saturation point.
pub const DEFAULT_HIGH_WATER_MARK: usize = 16 * 1024;

/// Outcome of queueing a write on a slot.
///
/// The data is queued in both cases; `Saturated` additionally tells the
/// caller that the slot's queue is now at or above the high-water mark and
/// inbound reads should pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Accepted,
    Saturated,
}

/// Counters shared by all slots of a pool.
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Bytes handed to slot queues.
    pub bytes_queued: AtomicU64,
    /// Bytes flushed to downstream sockets.
    pub bytes_flushed: AtomicU64,
    /// Bytes discarded because the slot's connection had failed.
    pub bytes_dropped: AtomicU64,
    /// Queue-empty transitions signalled to the read gate.
    pub drains: AtomicU64,
}

#[derive(Debug)]
struct Slot {
    target: Target,
    tx: mpsc::UnboundedSender<Bytes>,
    queued: Arc<AtomicUsize>,
}

/// Ordered set of outbound connections with per-slot write queues.
#[derive(Debug)]
pub struct OutboundPool {
    slots: Vec<Slot>,
    high_water_mark: usize,
    stats: Arc<PoolStats>,
}

impl OutboundPool {
    /// Connect to every target, in configured order.
    ///
    /// Any connect failure is fatal: the pool's order and size are fixed at
    /// startup, so a missing slot cannot be papered over. `drained` receives
    /// a coalescing wakeup whenever any slot's queue empties.
    pub async fn connect(
        targets: &[Target],
        high_water_mark: usize,
        drained: Arc<Notify>,
    ) -> io::Result<Self> {
        if targets.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "outbound target list is empty",
            ));
        }

        let stats = Arc::new(PoolStats::default());
        let mut slots = Vec::with_capacity(targets.len());

        for target in targets {
            let stream = TcpStream::connect((target.host.as_str(), target.port)).await?;
            info!(target = %target, "Connected to downstream target");

            let (tx, rx) = mpsc::unbounded_channel();
            let queued = Arc::new(AtomicUsize::new(0));

            tokio::spawn(writer_task(
                target.clone(),
                stream,
                rx,
                Arc::clone(&queued),
                Arc::clone(&drained),
                Arc::clone(&stats),
            ));

            slots.push(Slot {
                target: target.clone(),
                tx,
                queued,
            });
        }

        Ok(Self {
            slots,
            high_water_mark,
            stats,
        })
    }

    /// Number of slots; fixed for the pool's lifetime.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Pool-wide counters.
    pub fn stats(&self) -> Arc<PoolStats> {
        Arc::clone(&self.stats)
    }

    /// Queue `data` on slot `idx`.
    ///
    /// Never blocks and never rejects data; backpressure is expressed only
    /// through the returned [`WriteOutcome`].
    pub fn write(&self, idx: usize, data: Bytes) -> WriteOutcome {
        let slot = &self.slots[idx];
        let len = data.len();

        let queued = slot.queued.fetch_add(len, Ordering::Relaxed) + len;
        self.stats.bytes_queued.fetch_add(len as u64, Ordering::Relaxed);

        if slot.tx.send(data).is_err() {
            // Writer task is gone; only possible during teardown.
            slot.queued.fetch_sub(len, Ordering::Relaxed);
            self.stats
                .bytes_dropped
                .fetch_add(len as u64, Ordering::Relaxed);
            debug!(target = %slot.target, "Write after slot teardown discarded");
            return WriteOutcome::Accepted;
        }

        if queued >= self.high_water_mark {
            WriteOutcome::Saturated
        } else {
            WriteOutcome::Accepted
        }
    }
}

/// Drain one slot's queue into its socket.
///
/// A failed connection does not remove the slot: the task keeps consuming
/// (and discarding) queued data so saturation accounting and drain signals
/// stay live, per the fixed-pool policy. The first failure is reported at
/// error level, subsequent discards at debug.
async fn writer_task(
    target: Target,
    mut stream: TcpStream,
    mut rx: mpsc::UnboundedReceiver<Bytes>,
    queued: Arc<AtomicUsize>,
    drained: Arc<Notify>,
    stats: Arc<PoolStats>,
) {
    let mut open = true;

    while let Some(chunk) = rx.recv().await {
        let len = chunk.len();

        if open {
            match stream.write_all(&chunk).await {
                Ok(()) => {
                    stats.bytes_flushed.fetch_add(len as u64, Ordering::Relaxed);
                }
                Err(e) => {
                    error!(
                        target = %target,
                        error = %e,
                        "Downstream write failed; slot keeps its position, further data for it is discarded"
                    );
                    open = false;
                    stats.bytes_dropped.fetch_add(len as u64, Ordering::Relaxed);
                }
            }
        } else {
            stats.bytes_dropped.fetch_add(len as u64, Ordering::Relaxed);
            debug!(target = %target, bytes = len, "Discarded data for failed slot");
        }

        let remaining = queued.fetch_sub(len, Ordering::Relaxed) - len;
        if remaining == 0 {
            stats.drains.fetch_add(1, Ordering::Relaxed);
            drained.notify_one();
        }
    }

    debug!(target = %target, "Writer task finished");
}
