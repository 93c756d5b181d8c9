//! Latch pulse telling the servo controller a new word is ready.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

/// Width of the low pulse on the latch line.
pub const LATCH_PULSE_NS: u32 = 1_000;

/// Pulses the latch line low for [`LATCH_PULSE_NS`].
///
/// The delay must be a calibrated busy-wait, never a timer or scheduler
/// sleep: the pulse is emitted from the bus interrupt.
pub struct LatchSequencer<P, D> {
    line: P,
    delay: D,
}

impl<P: OutputPin, D: DelayNs> LatchSequencer<P, D> {
    /// Takes the latch line and parks it at its idle (high) level.
    pub fn new(mut line: P, delay: D) -> Self {
        line.set_high().ok();
        Self { line, delay }
    }

    pub fn pulse(&mut self) {
        // Pin errors have no reporting channel at interrupt priority.
        self.line.set_low().ok();
        self.delay.delay_ns(LATCH_PULSE_NS);
        self.line.set_high().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Event, EventLog, RecordingDelay, RecordingPin};

    #[test]
    fn pulse_is_low_then_high() {
        let log = EventLog::default();
        let mut latch = LatchSequencer::new(
            RecordingPin::new(&log, "latch"),
            RecordingDelay::new(&log),
        );
        log.clear();

        latch.pulse();

        assert_eq!(
            log.events(),
            vec![
                Event::Pin("latch", false),
                Event::Delay(LATCH_PULSE_NS),
                Event::Pin("latch", true),
            ]
        );
    }

    #[test]
    fn new_parks_line_high() {
        let log = EventLog::default();
        let _latch = LatchSequencer::new(
            RecordingPin::new(&log, "latch"),
            RecordingDelay::new(&log),
        );

        assert_eq!(log.events(), vec![Event::Pin("latch", true)]);
    }
}
