//! Blink schedule for the status indicator.

use core::time::Duration;

/// Time the indicator stays lit per cycle.
pub const LED_ON: Duration = Duration::from_millis(40);
/// Time the indicator stays dark per cycle.
pub const LED_OFF: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkTiming {
    pub on: Duration,
    pub off: Duration,
}

impl Default for BlinkTiming {
    fn default() -> Self {
        Self {
            on: LED_ON,
            off: LED_OFF,
        }
    }
}

/// Alternates the indicator between lit and dark.
#[derive(Debug, Default)]
pub struct StatusIndicator {
    timing: BlinkTiming,
    lit: bool,
}

impl StatusIndicator {
    pub fn new(timing: BlinkTiming) -> Self {
        Self { timing, lit: false }
    }

    /// Flips the indicator. Returns the new state and how long to hold it.
    pub fn toggle(&mut self) -> (bool, Duration) {
        self.lit = !self.lit;
        let hold = if self.lit {
            self.timing.on
        } else {
            self.timing.off
        };
        (self.lit, hold)
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternates_with_configured_holds() {
        let mut indicator = StatusIndicator::default();

        assert_eq!(indicator.toggle(), (true, LED_ON));
        assert_eq!(indicator.toggle(), (false, LED_OFF));
        assert_eq!(indicator.toggle(), (true, LED_ON));
    }

    #[test]
    fn custom_timing() {
        let timing = BlinkTiming {
            on: Duration::from_millis(5),
            off: Duration::from_millis(7),
        };
        let mut indicator = StatusIndicator::new(timing);

        indicator.toggle();
        assert!(indicator.is_lit());
        assert_eq!(indicator.toggle().1, Duration::from_millis(7));
    }
}
