//! Command classification and substitution.
//!
//! A captured command is matched against an ordered table of command ranges.
//! The first rule whose range contains the command and whose override slot
//! holds an active value replaces the command with that value. Anything else
//! is relayed unchanged.

use crate::overrides::{INACTIVE, OverrideSlot, TrackingValues};

/// Level driven on the side-channel tap when a substitution happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TapLevel {
    High,
    Low,
}

/// One entry of the classification table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    /// First command of the range, inclusive.
    pub first: u32,
    /// Last command of the range, inclusive.
    pub last: u32,
    pub slot: OverrideSlot,
    pub tap: TapLevel,
}

impl Rule {
    pub const fn contains(&self, word: u32) -> bool {
        word >= self.first && word <= self.last
    }
}

/// Tracking balance and tracking gain command ranges of the servo controller.
pub const TRACKING_RULES: [Rule; 2] = [
    Rule {
        first: 0x800,
        last: 0x81F,
        slot: OverrideSlot::Balance,
        tap: TapLevel::High,
    },
    Rule {
        first: 0x820,
        last: 0x83F,
        slot: OverrideSlot::Gain,
        tap: TapLevel::Low,
    },
];

/// Outcome of classifying one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Classification {
    /// Word to put on the outbound bus.
    pub word: u32,
    /// Substitution performed, if any.
    pub substituted: Option<Substitution>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Substitution {
    pub slot: OverrideSlot,
    pub tap: TapLevel,
}

/// Classifies `word` against `rules` with the given override values.
pub fn classify(word: u32, rules: &[Rule], values: &TrackingValues) -> Classification {
    for rule in rules {
        if !rule.contains(word) {
            continue;
        }

        let value = values.get(rule.slot);
        if value == INACTIVE {
            continue;
        }

        return Classification {
            word: u32::from(value),
            substituted: Some(Substitution {
                slot: rule.slot,
                tap: rule.tap,
            }),
        };
    }

    Classification {
        word,
        substituted: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALUES: TrackingValues = TrackingValues {
        balance: 0x80A,
        gain: 0x827,
    };

    #[test]
    fn balance_range_substitutes_and_taps_high() {
        for word in 0x800..=0x81F {
            let result = classify(word, &TRACKING_RULES, &VALUES);
            assert_eq!(result.word, 0x80A);
            assert_eq!(
                result.substituted,
                Some(Substitution {
                    slot: OverrideSlot::Balance,
                    tap: TapLevel::High
                })
            );
        }
    }

    #[test]
    fn gain_range_substitutes_and_taps_low() {
        for word in 0x820..=0x83F {
            let result = classify(word, &TRACKING_RULES, &VALUES);
            assert_eq!(result.word, 0x827);
            assert_eq!(result.substituted.map(|s| s.tap), Some(TapLevel::Low));
        }
    }

    #[test]
    fn neighbours_of_ranges_pass_through() {
        for word in [0x7FF, 0x840, 0x0, 0xFF, 0x1000, 0xFFFF_FFFF] {
            let result = classify(word, &TRACKING_RULES, &VALUES);
            assert_eq!(result.word, word);
            assert_eq!(result.substituted, None);
        }
    }

    #[test]
    fn inactive_override_passes_through() {
        let values = TrackingValues {
            balance: 0,
            gain: 0,
        };

        let balance = classify(0x810, &TRACKING_RULES, &values);
        assert_eq!(balance.word, 0x810);
        assert_eq!(balance.substituted, None);

        let gain = classify(0x830, &TRACKING_RULES, &values);
        assert_eq!(gain.word, 0x830);
        assert_eq!(gain.substituted, None);
    }

    #[test]
    fn first_active_match_wins() {
        let rules = [
            Rule {
                first: 0x10,
                last: 0x20,
                slot: OverrideSlot::Balance,
                tap: TapLevel::High,
            },
            Rule {
                first: 0x18,
                last: 0x28,
                slot: OverrideSlot::Gain,
                tap: TapLevel::Low,
            },
        ];

        let both = TrackingValues {
            balance: 0x111,
            gain: 0x222,
        };
        assert_eq!(classify(0x19, &rules, &both).word, 0x111);

        let gain_only = TrackingValues {
            balance: 0,
            gain: 0x222,
        };
        assert_eq!(classify(0x19, &rules, &gain_only).word, 0x222);
    }

    #[test]
    fn classification_is_deterministic() {
        let first = classify(0x815, &TRACKING_RULES, &VALUES);
        let second = classify(0x815, &TRACKING_RULES, &VALUES);
        assert_eq!(first, second);
    }
}
