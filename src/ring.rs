//! The memory delay ring: a fixed-size, period-indexed byte buffer owned
//! exclusively by the I/O engine thread.
//!
//! Only the engine ever touches `buffer`, `cap`, or `play` — the control
//! surface only ever sees a snapshot of `cap`/`play` copied out under the
//! shared-state mutex in `engine.rs`, never the bytes themselves. That
//! single-writer discipline is what lets the bytes go unprotected; see the
//! "two writers turning into one" design note.

pub struct RingBuffer {
    buffer: Box<[u8]>,
    n: usize,
    period_bytes: usize,
    cap: usize,
    play: usize,
}

impl RingBuffer {
    pub fn new(n: usize, period_bytes: usize) -> Self {
        RingBuffer {
            buffer: vec![0u8; n * period_bytes].into_boxed_slice(),
            n,
            period_bytes,
            cap: 0,
            play: 0,
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn play(&self) -> usize {
        self.play
    }

    /// `(idx + 1) mod N`.
    pub fn advance(&self, idx: usize) -> usize {
        (idx + 1) % self.n
    }

    fn cap_ptr(&self) -> usize {
        self.cap * self.period_bytes
    }

    fn play_ptr(&self) -> usize {
        self.play * self.period_bytes
    }

    /// The slot the engine is about to capture into.
    pub fn cap_slot_mut(&mut self) -> &mut [u8] {
        let start = self.cap_ptr();
        &mut self.buffer[start..start + self.period_bytes]
    }

    /// The slot the engine is about to play back from.
    pub fn play_slot(&self) -> &[u8] {
        let start = self.play_ptr();
        &self.buffer[start..start + self.period_bytes]
    }

    pub fn advance_cap(&mut self) {
        self.cap = self.advance(self.cap);
    }

    pub fn advance_play(&mut self) {
        self.play = self.advance(self.play);
    }

    /// Whether the playback side has caught up to capture — nothing left
    /// to draw.
    pub fn is_empty_for_playback(&self) -> bool {
        self.play == self.cap
    }

    /// Periods currently held in the memory ring: `(cap - play) mod N`.
    pub fn periods_in_mem_ring(&self) -> usize {
        (self.cap + self.n - self.play) % self.n
    }
}
