//! Wire-level counters: the cyclic DMX sequence number, the poll-reply round
//! counter, and the per-round bind index.
//!
//! # Why these ranges? (for beginners)
//!
//! Each counter cycles over the exact range its wire field allows:
//!
//! - The ArtDmx **sequence** byte lets receivers re-order or de-duplicate
//!   frames.  The value 0 means "sequence disabled", so a transmitting node
//!   cycles 1..=255 and must never emit 0.
//! - The **poll-reply counter** feeds the four-digit decimal field inside the
//!   node-report string, so it cycles 0..=9999.
//! - The **bind index** is a single byte identifying one port binding within
//!   a broadcast round; it is 1-based and wraps back to 1 past 255.
//!
//! The two shared counters use atomics so a sender's periodic timer task and
//! a manual `transmit()` caller can advance the same counter without a lock.

use std::sync::atomic::{AtomicU16, AtomicU8, Ordering};

/// Cyclic ArtDmx sequence counter: produces 1, 2, …, 255, 1, 2, …
///
/// # Examples
///
/// ```rust
/// use artnet_core::protocol::sequence::DmxSequence;
///
/// let seq = DmxSequence::new();
/// assert_eq!(seq.next(), 1);
/// assert_eq!(seq.next(), 2);
/// ```
pub struct DmxSequence {
    inner: AtomicU8,
}

impl DmxSequence {
    /// Creates a counter whose first [`next`](Self::next) call returns 1.
    pub fn new() -> Self {
        Self {
            inner: AtomicU8::new(0),
        }
    }

    /// Advances the counter and returns the new value, wrapping 255 → 1.
    ///
    /// `Ordering::Relaxed` is sufficient: the counter orders frames on the
    /// wire, it does not synchronise memory between threads.
    pub fn next(&self) -> u8 {
        let old = self
            .inner
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(if v >= 255 { 1 } else { v + 1 })
            })
            .expect("closure always returns Some");
        if old >= 255 {
            1
        } else {
            old + 1
        }
    }
}

impl Default for DmxSequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll-reply round counter, cyclic over 0..=9999.
///
/// Incremented exactly once per broadcast round, regardless of how many
/// interfaces or bindings that round described.
pub struct PollReplyCounter {
    inner: AtomicU16,
}

impl PollReplyCounter {
    pub fn new() -> Self {
        Self {
            inner: AtomicU16::new(0),
        }
    }

    /// The current round number, 0..=9999.
    pub fn current(&self) -> u16 {
        self.inner.load(Ordering::Relaxed)
    }

    /// Advances to the next round, wrapping 9999 → 0.
    pub fn advance(&self) {
        self.inner
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(if v >= 9999 { 0 } else { v + 1 })
            })
            .expect("closure always returns Some");
    }
}

impl Default for PollReplyCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// 1-based bind index handed out per poll-reply packet within one
/// interface-broadcast round.  Not shared between tasks, so no atomics.
pub struct BindIndex {
    next: u16,
}

impl BindIndex {
    /// Starts a fresh round at index 1.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Returns the current index and post-increments, wrapping past 255
    /// back to 1 so that 256 can never appear in the single-byte wire field.
    pub fn take(&mut self) -> u8 {
        let value = self.next as u8;
        self.next += 1;
        if self.next > 255 {
            self.next = 1;
        }
        value
    }
}

impl Default for BindIndex {
    fn default() -> Self {
        Self::new()
    }
}
