//! Tracking balance and gain override values.
//!
//! The pair is read by the bus interrupt on every transaction and written by
//! the configuration service from task context. Each field is a single
//! aligned 16-bit atomic, so neither side can observe a torn value; the two
//! fields are independent and are not updated as a unit.

use portable_atomic::{AtomicU16, Ordering};
use serde::{Deserialize, Serialize};

/// Override value meaning "leave the host's command untouched".
pub const INACTIVE: u16 = 0;

/// Factory tracking balance written to storage on first boot.
pub const DEFAULT_BALANCE: u16 = 0x80A;

/// Factory tracking gain written to storage on first boot.
pub const DEFAULT_GAIN: u16 = 0x827;

/// Which of the two override registers a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OverrideSlot {
    Balance,
    Gain,
}

/// Plain copy of the override pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrackingValues {
    pub balance: u16,
    pub gain: u16,
}

impl TrackingValues {
    pub const DEFAULT: Self = Self {
        balance: DEFAULT_BALANCE,
        gain: DEFAULT_GAIN,
    };

    /// Decodes `[balance, gain]` as two little-endian words.
    pub fn from_le_bytes(bytes: [u8; 4]) -> Self {
        Self {
            balance: u16::from_le_bytes([bytes[0], bytes[1]]),
            gain: u16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }

    pub fn get(&self, slot: OverrideSlot) -> u16 {
        match slot {
            OverrideSlot::Balance => self.balance,
            OverrideSlot::Gain => self.gain,
        }
    }

    /// Active (non-zero) values in slot order.
    pub fn active(&self) -> impl Iterator<Item = (OverrideSlot, u16)> {
        [
            (OverrideSlot::Balance, self.balance),
            (OverrideSlot::Gain, self.gain),
        ]
        .into_iter()
        .filter(|&(_, value)| value != INACTIVE)
    }
}

impl Default for TrackingValues {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Shared handle to the live override pair.
pub struct TrackingOverrides {
    balance: AtomicU16,
    gain: AtomicU16,
}

impl TrackingOverrides {
    pub const fn new(values: TrackingValues) -> Self {
        Self {
            balance: AtomicU16::new(values.balance),
            gain: AtomicU16::new(values.gain),
        }
    }

    pub fn get(&self, slot: OverrideSlot) -> u16 {
        self.cell(slot).load(Ordering::Relaxed)
    }

    pub fn set(&self, slot: OverrideSlot, value: u16) {
        self.cell(slot).store(value, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TrackingValues {
        TrackingValues {
            balance: self.get(OverrideSlot::Balance),
            gain: self.get(OverrideSlot::Gain),
        }
    }

    pub fn store(&self, values: TrackingValues) {
        self.set(OverrideSlot::Balance, values.balance);
        self.set(OverrideSlot::Gain, values.gain);
    }

    fn cell(&self, slot: OverrideSlot) -> &AtomicU16 {
        match slot {
            OverrideSlot::Balance => &self.balance,
            OverrideSlot::Gain => &self.gain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_little_endian_pair() {
        let values = TrackingValues::from_le_bytes([0x00, 0x09, 0x30, 0x09]);
        assert_eq!(
            values,
            TrackingValues {
                balance: 0x900,
                gain: 0x930
            }
        );
    }

    #[test]
    fn active_skips_zero_sentinel() {
        let values = TrackingValues {
            balance: 0,
            gain: 0x827,
        };
        let active: Vec<_> = values.active().collect();
        assert_eq!(active, vec![(OverrideSlot::Gain, 0x827)]);
    }

    #[test]
    fn slots_are_independent() {
        let overrides = TrackingOverrides::new(TrackingValues::DEFAULT);
        overrides.set(OverrideSlot::Gain, 0x830);

        assert_eq!(overrides.get(OverrideSlot::Balance), DEFAULT_BALANCE);
        assert_eq!(overrides.snapshot().gain, 0x830);
    }
}
