//! Round-robin cursor over the outbound pool.

/// Index of the pool slot the next completed line is routed to.
///
/// The cursor is the only mutable piece of routing state. It advances by
/// exactly one position per line boundary crossed and never otherwise, so
/// line `j` of the stream lands on slot `(start + j) mod pool_len`. It is
/// owned by the relay task; there is no shared mutation.
#[derive(Debug)]
pub struct Cursor {
    pos: usize,
    pool_len: usize,
}

impl Cursor {
    /// Create a cursor over a pool of `pool_len` slots, starting at slot 0.
    ///
    /// `pool_len` must be non-zero; an empty target list is rejected during
    /// configuration validation before a cursor is ever built.
    pub fn new(pool_len: usize) -> Self {
        assert!(pool_len > 0, "cursor requires a non-empty pool");
        Self { pos: 0, pool_len }
    }

    /// Slot index the next line is routed to.
    pub fn current(&self) -> usize {
        self.pos
    }

    /// Advance one position, wrapping past the end of the pool.
    pub fn advance(&mut self) {
        self.pos = (self.pos + 1) % self.pool_len;
    }
}
