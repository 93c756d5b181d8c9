//! Mode switch handling.
//!
//! Switch edges arrive from the EXTI handler through
//! [`SWITCH_SIGNAL`](crate::intercept::SWITCH_SIGNAL). Holding the switch for
//! [`LONG_PRESS`] raises [`SERVICE_REQUEST`] once; the task ends after that.

use embassy_futures::select::{Either, select};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};
use embassy_time::Timer;
use tracking_core::long_press::{LONG_PRESS, LongPressDetector, PressState};

use crate::intercept::SWITCH_SIGNAL;

/// Raised once the switch has been held long enough.
pub static SERVICE_REQUEST: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Async task watching the mode switch.
///
/// While a press is armed, every new switch edge races the countdown. A
/// release cancels it, a repeated assert restarts it from the full
/// duration.
///
/// # Example
///
/// ```no_run
/// spawner.spawn(mode_switch_task()).unwrap();
/// ```
#[embassy_executor::task]
pub async fn mode_switch_task() {
    let mut detector = LongPressDetector::new();

    loop {
        let asserted = match detector.state() {
            PressState::Idle => SWITCH_SIGNAL.wait().await,
            PressState::Armed => {
                match select(Timer::after(crate::to_ticks(LONG_PRESS)), SWITCH_SIGNAL.wait()).await
                {
                    Either::First(()) => {
                        if detector.on_countdown_expired() {
                            #[cfg(feature = "debug-mode")]
                            defmt::info!("Long press, starting configuration service");
                            SERVICE_REQUEST.signal(());
                        }
                        continue;
                    }
                    Either::Second(asserted) => asserted,
                }
            }
            PressState::Fired => return,
        };

        let _action = detector.on_switch(asserted);

        #[cfg(feature = "debug-mode")]
        defmt::info!("Switch {} -> {}", asserted, _action);
    }
}
