//! Bit-by-bit reconstruction of a host bus command.
//!
//! The host shifts a command out LSB first, one bit per rising clock edge,
//! and marks the end of the word with a falling edge on its latch line. No
//! word length is announced up front: whatever accumulated between two
//! latch edges is the command.

/// Number of bit positions the accumulator can hold.
pub const ACCUMULATOR_BITS: u32 = u32::BITS;

/// Accumulator for the command word currently being clocked in.
///
/// Bits arriving past [`ACCUMULATOR_BITS`] are discarded while the bit
/// counter keeps counting (saturating), so an overlong burst leaves the low
/// 32 bits intact instead of wrapping back over them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EdgeCapture {
    accumulator: u32,
    bit_count: u32,
}

impl EdgeCapture {
    pub const fn new() -> Self {
        Self {
            accumulator: 0,
            bit_count: 0,
        }
    }

    /// Records one sampled data bit on a clock edge.
    pub fn on_clock_edge(&mut self, sampled_bit: bool) {
        if sampled_bit && self.bit_count < ACCUMULATOR_BITS {
            self.accumulator |= 1 << self.bit_count;
        }
        self.bit_count = self.bit_count.saturating_add(1);
    }

    /// Freezes the accumulated word and resets for the next transaction.
    pub fn on_latch_edge(&mut self) -> u32 {
        let word = self.accumulator;
        *self = Self::new();
        word
    }

    /// Value accumulated so far.
    pub fn word(&self) -> u32 {
        self.accumulator
    }

    /// Clock edges seen since the last latch edge.
    pub fn bit_count(&self) -> u32 {
        self.bit_count
    }

    /// True while at least one clock edge has been seen since the last latch.
    pub fn is_accumulating(&self) -> bool {
        self.bit_count != 0
    }
}
