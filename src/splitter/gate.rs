//! Backpressure coordination for the inbound read side.
//!
//! Exactly one inbound stream is gated against the outbound pool: when a
//! write saturates the slot it targeted, the gate pauses inbound reads;
//! when any slot reports its queue drained, reads resume. Resuming on any
//! drain (not specifically the slot that caused the pause) is deliberately
//! best-effort: the next write that hits a still-saturated slot re-pauses
//! immediately.

use std::sync::Arc;

use tokio::sync::Notify;

/// Read-side gate for the inbound stream.
///
/// The drain signal is a [`Notify`], so a drain that fires before the relay
/// task starts waiting is stored as a permit rather than lost; a pause can
/// therefore never deadlock against a drain that already happened.
#[derive(Debug)]
pub struct ReadGate {
    paused: bool,
    drained: Arc<Notify>,
}

impl ReadGate {
    pub fn new(drained: Arc<Notify>) -> Self {
        Self {
            paused: false,
            drained,
        }
    }

    /// Whether inbound reads are currently paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Pause inbound reads until a slot drains.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Wait for a drain signal from any outbound slot, then resume reads.
    ///
    /// No-op if the gate is not paused.
    pub async fn wait_resume(&mut self) {
        if !self.paused {
            return;
        }
        self.drained.notified().await;
        self.paused = false;
    }
}
