//! The 512-channel DMX buffer and its mutation rules.
//!
//! Index errors are rejected; value errors are not.  An out-of-range channel
//! index is a caller bug and surfaces as a [`ChannelError`], while an
//! out-of-range *value* is clamped to the nearest bound — a dimmer driven to
//! 300 simply pins at full, matching how lighting consoles behave.

use thiserror::Error;

use crate::protocol::packets::DMX_CHANNELS;

/// Validation errors for channel mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// The channel index is outside 0..=511.
    #[error("channel must be 0..=511, got {0}")]
    ChannelOutOfRange(usize),

    /// The start of a fill range lies after its end.
    #[error("start channel {start} must not exceed end channel {end}")]
    InvertedRange { start: usize, end: usize },
}

/// One universe's worth of channel state: exactly 512 bytes, zero-initialized.
///
/// The length invariant is structural — the backing store is a fixed array,
/// so no mutation can change it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelBuffer {
    values: [u8; DMX_CHANNELS],
}

impl ChannelBuffer {
    /// A fully dark universe.
    pub fn new() -> Self {
        Self {
            values: [0u8; DMX_CHANNELS],
        }
    }

    /// Sets one channel.  `value` is clamped to 0..=255; `index` must be
    /// 0..=511.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::ChannelOutOfRange`] for a bad index.  The
    /// buffer is untouched on error.
    pub fn set(&mut self, index: usize, value: i32) -> Result<(), ChannelError> {
        if index >= DMX_CHANNELS {
            return Err(ChannelError::ChannelOutOfRange(index));
        }
        self.values[index] = clamp_value(value);
        Ok(())
    }

    /// Sets every channel in the inclusive range `start..=end` to the clamped
    /// `value`, leaving all other channels untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] when either bound exceeds 511 or
    /// `start > end`.  The buffer is untouched on error.
    pub fn fill(&mut self, start: usize, end: usize, value: i32) -> Result<(), ChannelError> {
        if start >= DMX_CHANNELS {
            return Err(ChannelError::ChannelOutOfRange(start));
        }
        if end >= DMX_CHANNELS {
            return Err(ChannelError::ChannelOutOfRange(end));
        }
        if start > end {
            return Err(ChannelError::InvertedRange { start, end });
        }
        let clamped = clamp_value(value);
        self.values[start..=end].fill(clamped);
        Ok(())
    }

    /// Zeroes all 512 channels.
    pub fn reset(&mut self) {
        self.values = [0u8; DMX_CHANNELS];
    }

    /// Read access to one channel, for tests and diagnostics.
    pub fn get(&self, index: usize) -> Option<u8> {
        self.values.get(index).copied()
    }

    /// The raw frame handed to the codec.
    pub fn as_array(&self) -> &[u8; DMX_CHANNELS] {
        &self.values
    }
}

impl Default for ChannelBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamps a requested channel value to the DMX byte range.
fn clamp_value(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_all_zero_and_512_long() {
        let buf = ChannelBuffer::new();
        assert_eq!(buf.as_array().len(), 512);
        assert!(buf.as_array().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_set_in_range_value_passes_through_unchanged() {
        let mut buf = ChannelBuffer::new();
        buf.set(0, 0).unwrap();
        buf.set(1, 128).unwrap();
        buf.set(511, 255).unwrap();
        assert_eq!(buf.get(0), Some(0));
        assert_eq!(buf.get(1), Some(128));
        assert_eq!(buf.get(511), Some(255));
    }

    #[test]
    fn test_set_clamps_value_to_nearest_bound() {
        let mut buf = ChannelBuffer::new();
        buf.set(5, 300).unwrap();
        assert_eq!(buf.get(5), Some(255));
        buf.set(5, -42).unwrap();
        assert_eq!(buf.get(5), Some(0));
    }

    #[test]
    fn test_set_rejects_index_past_511() {
        let mut buf = ChannelBuffer::new();
        assert_eq!(buf.set(512, 1), Err(ChannelError::ChannelOutOfRange(512)));
        // The buffer must be untouched by a failed set.
        assert!(buf.as_array().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_fill_sets_inclusive_range_only() {
        let mut buf = ChannelBuffer::new();
        buf.fill(10, 12, 200).unwrap();
        assert_eq!(buf.get(9), Some(0));
        assert_eq!(buf.get(10), Some(200));
        assert_eq!(buf.get(11), Some(200));
        assert_eq!(buf.get(12), Some(200));
        assert_eq!(buf.get(13), Some(0));
    }

    #[test]
    fn test_fill_single_channel_range() {
        let mut buf = ChannelBuffer::new();
        buf.fill(7, 7, 9).unwrap();
        assert_eq!(buf.get(7), Some(9));
        assert_eq!(buf.get(6), Some(0));
        assert_eq!(buf.get(8), Some(0));
    }

    #[test]
    fn test_fill_clamps_value() {
        let mut buf = ChannelBuffer::new();
        buf.fill(0, 511, 1000).unwrap();
        assert!(buf.as_array().iter().all(|&v| v == 255));
    }

    #[test]
    fn test_fill_rejects_out_of_range_bounds() {
        let mut buf = ChannelBuffer::new();
        assert_eq!(buf.fill(512, 512, 1), Err(ChannelError::ChannelOutOfRange(512)));
        assert_eq!(buf.fill(0, 600, 1), Err(ChannelError::ChannelOutOfRange(600)));
    }

    #[test]
    fn test_fill_rejects_inverted_range() {
        let mut buf = ChannelBuffer::new();
        assert_eq!(
            buf.fill(10, 5, 1),
            Err(ChannelError::InvertedRange { start: 10, end: 5 })
        );
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut buf = ChannelBuffer::new();
        buf.fill(0, 511, 255).unwrap();
        buf.reset();
        assert!(buf.as_array().iter().all(|&v| v == 0));
    }
}
