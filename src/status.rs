//! Status indicator driver.

use embassy_stm32::gpio::{Level, Output};
use embassy_time::Timer;
use tracking_core::status::StatusIndicator;

/// Blinks the indicator forever on the default schedule.
///
/// Runs on the main task once the configuration service is up.
///
/// # Arguments
///
/// * `led` - Indicator output, active high
pub async fn run(mut led: Output<'static>) -> ! {
    let mut indicator = StatusIndicator::default();

    loop {
        let (lit, hold) = indicator.toggle();
        led.set_level(Level::from(lit));
        Timer::after(crate::to_ticks(hold)).await;
    }
}
