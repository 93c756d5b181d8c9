//! Long-press detection on the mode switch.
//!
//! Holding the switch for [`LONG_PRESS`] brings up the configuration
//! service. The detector only decides; arming the countdown and reacting to
//! its expiry is left to the caller so the same logic runs from an executor
//! task or a test.

use core::time::Duration;

/// How long the switch must be held.
pub const LONG_PRESS: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PressState {
    #[default]
    Idle,
    Armed,
    /// Terminal until reset.
    Fired,
}

/// What the caller must do with its countdown after a switch edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CountdownAction {
    /// (Re)start the countdown from [`LONG_PRESS`].
    Start,
    Cancel,
    Keep,
}

#[derive(Debug, Default)]
pub struct LongPressDetector {
    state: PressState,
}

impl LongPressDetector {
    pub const fn new() -> Self {
        Self {
            state: PressState::Idle,
        }
    }

    pub fn state(&self) -> PressState {
        self.state
    }

    /// Feeds the switch level observed on an edge.
    pub fn on_switch(&mut self, asserted: bool) -> CountdownAction {
        match (self.state, asserted) {
            (PressState::Fired, _) => CountdownAction::Keep,
            (_, true) => {
                self.state = PressState::Armed;
                CountdownAction::Start
            }
            (PressState::Armed, false) => {
                self.state = PressState::Idle;
                CountdownAction::Cancel
            }
            (PressState::Idle, false) => CountdownAction::Keep,
        }
    }

    /// Countdown elapsed. Returns true exactly once, on the transition to
    /// [`PressState::Fired`].
    pub fn on_countdown_expired(&mut self) -> bool {
        if self.state == PressState::Armed {
            self.state = PressState::Fired;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays `(switch level, time held)` steps against a simulated clock.
    fn replay(steps: &[(bool, Duration)]) -> usize {
        let mut detector = LongPressDetector::new();
        let mut deadline: Option<Duration> = None;
        let mut now = Duration::ZERO;
        let mut fired = 0;

        for &(level, hold) in steps {
            match detector.on_switch(level) {
                CountdownAction::Start => deadline = Some(now + LONG_PRESS),
                CountdownAction::Cancel => deadline = None,
                CountdownAction::Keep => {}
            }

            now += hold;
            if let Some(at) = deadline {
                if now >= at {
                    deadline = None;
                    if detector.on_countdown_expired() {
                        fired += 1;
                    }
                }
            }
        }

        fired
    }

    #[test]
    fn short_press_never_fires() {
        let steps = [
            (true, Duration::from_millis(999)),
            (false, Duration::from_secs(5)),
        ];
        assert_eq!(replay(&steps), 0);
    }

    #[test]
    fn long_press_fires_once_even_if_held() {
        let steps = [
            (true, Duration::from_secs(1)),
            (true, Duration::from_secs(10)),
            (false, Duration::from_millis(10)),
            (true, Duration::from_secs(2)),
        ];
        assert_eq!(replay(&steps), 1);
    }

    #[test]
    fn repeated_short_presses_do_not_accumulate() {
        let steps = [
            (true, Duration::from_millis(600)),
            (false, Duration::from_millis(10)),
            (true, Duration::from_millis(600)),
            (false, Duration::from_millis(10)),
        ];
        assert_eq!(replay(&steps), 0);
    }

    #[test]
    fn release_disarms() {
        let mut detector = LongPressDetector::new();
        assert_eq!(detector.on_switch(true), CountdownAction::Start);
        assert_eq!(detector.state(), PressState::Armed);
        assert_eq!(detector.on_switch(false), CountdownAction::Cancel);
        assert_eq!(detector.state(), PressState::Idle);
        assert!(!detector.on_countdown_expired());
    }

    #[test]
    fn fired_is_terminal() {
        let mut detector = LongPressDetector::new();
        detector.on_switch(true);
        assert!(detector.on_countdown_expired());

        assert_eq!(detector.on_switch(false), CountdownAction::Keep);
        assert_eq!(detector.on_switch(true), CountdownAction::Keep);
        assert!(!detector.on_countdown_expired());
        assert_eq!(detector.state(), PressState::Fired);
    }
}
