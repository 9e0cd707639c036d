//! Channel buffer - the authoritative "last commanded" state for one universe.
//!
//! One universe is 512 independently addressable 8-bit channels. The buffer is
//! created zero-filled at service start and lives for the process lifetime.
//! It is mutated only by the dispatcher; every external read gets a snapshot
//! copy, never a shared reference, so observers cannot alias authoritative
//! state.

/// Number of channels in one universe.
pub const UNIVERSE_CHANNELS: usize = 512;

/// Fixed-size store of the last commanded value per channel.
///
/// Channels are 1-based: index `i` holds global channel `i + 1`. The buffer
/// itself performs no range validation; callers must pass channels in
/// `1..=512` or `set` will panic. The dispatcher is the only mutator and
/// guards its inputs.
#[derive(Debug, Clone)]
pub struct ChannelBuffer {
    values: [u8; UNIVERSE_CHANNELS],
}

impl ChannelBuffer {
    /// Create a zero-filled buffer.
    pub fn new() -> Self {
        Self {
            values: [0; UNIVERSE_CHANNELS],
        }
    }

    /// Write `value` at 1-based `channel`.
    pub fn set(&mut self, channel: u16, value: u8) {
        self.values[channel as usize - 1] = value;
    }

    /// Zero every channel.
    pub fn clear(&mut self) {
        self.values = [0; UNIVERSE_CHANNELS];
    }

    /// Independent copy of all 512 values.
    pub fn snapshot(&self) -> [u8; UNIVERSE_CHANNELS] {
        self.values
    }
}

impl Default for ChannelBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_zero_filled() {
        let buffer = ChannelBuffer::new();
        assert!(buffer.snapshot().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_set_is_one_based() {
        let mut buffer = ChannelBuffer::new();
        buffer.set(1, 10);
        buffer.set(512, 255);

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot[0], 10);
        assert_eq!(snapshot[511], 255);
    }

    #[test]
    fn test_clear_zeroes_everything() {
        let mut buffer = ChannelBuffer::new();
        for channel in 1..=512u16 {
            buffer.set(channel, 200);
        }
        buffer.clear();
        assert!(buffer.snapshot().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut buffer = ChannelBuffer::new();
        buffer.set(7, 99);

        let mut snapshot = buffer.snapshot();
        snapshot[6] = 0;

        assert_eq!(buffer.snapshot()[6], 99);
    }
}
