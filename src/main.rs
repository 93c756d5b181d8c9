//! Firmware for the tracking balance/gain interposer.
//!
//! # Overview
//!
//! The interposer sits on the three-wire command bus between a host
//! microcontroller and a servo controller. Every command the host clocks in
//! is captured on the host's clock and latch edges, then re-driven to the
//! controller:
//! - Tracking balance commands (0x800-0x81F) are replaced by the configured
//!   balance value
//! - Tracking gain commands (0x820-0x83F) are replaced by the configured
//!   gain value
//! - Everything else is relayed unchanged
//!
//! # Hardware
//!
//! - **MCU**: STM32L432KC (Cortex-M4F) on a NUCLEO-L432KC
//! - **Host bus**: clock, data and latch inputs on PA8/PA10/PA9
//! - **Controller bus**: SPI1 (PA5/PA7) plus latch on PA4
//! - **Mode switch**: PB5, long press starts the configuration service
//! - **USB**: CDC-NCM network link for the configuration service
//!
//! # Modes
//!
//! The firmware boots into pure interception. A one second hold of the mode
//! switch brings up the USB network link and the HTTP configuration service
//! at 172.16.1.1, and the status LED starts blinking. Interception keeps
//! running in both modes.
//!
//! # Module Organization
//!
//! - [`hardware`] - Pin mappings and peripheral initialization
//! - [`bus`] - Register-level SPI towards the controller and the latch delay
//! - [`intercept`] - EXTI interrupt driving the interceptor
//! - [`mode_switch`] - Long-press detection task
//! - [`network`] - USB network link and stack tasks
//! - [`http_server`] - HTTP transport of the configuration service
//! - [`status`] - Status indicator blinking

#![no_std]
#![no_main]

mod bus;
mod hardware;
mod http_server;
mod intercept;
mod mode_switch;
mod network;
mod status;

use embassy_executor::Spawner;
use embassy_stm32::Config;
use static_cell::StaticCell;
use tracking_core::interceptor::Interceptor;
use tracking_core::latch::LatchSequencer;
use tracking_core::overrides::{TrackingOverrides, TrackingValues};
use tracking_core::service::ConfigService;
use tracking_core::storage::TrackingStore;
use tracking_core::transmit::BusTransmitter;
use {defmt_rtt as _, panic_probe as _};

use bus::CycleDelay;
use hardware::Peripherals;
use intercept::PausedBusFlash;
use mode_switch::{SERVICE_REQUEST, mode_switch_task};

/// Core clock produced by [`create_clock_config`].
const SYSCLK_HZ: u32 = 80_000_000;

/// Flash offset of the override record: the last 2 KiB page, left out of
/// the FLASH region in `memory.x`.
const STORE_OFFSET: u32 = 0x3_F800;

/// Page served at `/`.
static INDEX_HTML: &[u8] = include_bytes!("../assets/index.html");

static OVERRIDES: StaticCell<TrackingOverrides> = StaticCell::new();

/// Converts a core duration to executor ticks.
pub(crate) fn to_ticks(duration: core::time::Duration) -> embassy_time::Duration {
    embassy_time::Duration::from_micros(duration.as_micros() as u64)
}

/// Creates the clock configuration for STM32L432.
///
/// # Clock Settings
///
/// - **HSI**: 16 MHz, PLL input
/// - **PLL**: x10 / 2 on the R output, 80 MHz system clock
/// - **HSI48**: USB clock, trimmed from USB start-of-frame packets
/// - **Prescalers**: AHB, APB1 and APB2 undivided
///
/// The bus interrupt has to re-drive a word between two host commands, so
/// the core runs at its maximum frequency.
///
/// # Returns
///
/// Configured RCC settings for embassy-stm32 initialization
fn create_clock_config() -> embassy_stm32::rcc::Config {
    use embassy_stm32::rcc::*;

    let mut rcc = embassy_stm32::rcc::Config::default();
    rcc.hsi = true;
    rcc.pll = Some(Pll {
        source: PllSource::HSI,
        prediv: PllPreDiv::DIV1,
        mul: PllMul::MUL10,
        divp: None,
        divq: None,
        divr: Some(PllRDiv::DIV2),
    });
    rcc.sys = Sysclk::PLL1_R;
    rcc.ahb_pre = AHBPrescaler::DIV1;
    rcc.apb1_pre = APBPrescaler::DIV1;
    rcc.apb2_pre = APBPrescaler::DIV1;
    rcc.hsi48 = Some(Hsi48Config {
        sync_from_usb: true,
    });
    rcc.mux.clk48sel = mux::Clk48sel::HSI48;
    rcc
}

/// Main entry point for the interposer firmware.
///
/// # Initialization Sequence
///
/// 1. Configure clocks (80 MHz core, 48 MHz USB)
/// 2. Initialize STM32 peripherals
/// 3. Load the override values from flash, seeding defaults on first boot
/// 4. Install the interceptor and enable the bus interrupt
/// 5. Spawn the mode switch task
/// 6. Wait for a long press, then start the configuration service
/// 7. Blink the status indicator
///
/// # Spawned Tasks
///
/// - **mode_switch_task**: Long-press detection
/// - **usb_task**, **ncm_task**, **net_task**, **http_task**: Configuration
///   service, after the long press
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let mut config = Config::default();
    config.rcc = create_clock_config();

    let p = embassy_stm32::init(config);

    #[cfg(feature = "debug-mode")]
    defmt::info!("Tracking interposer starting...");

    let peripherals = Peripherals::new(p);

    let flash = PausedBusFlash::new(peripherals.flash);
    let mut store = TrackingStore::new(flash, STORE_OFFSET);
    let values = match store.load_or_init(TrackingValues::DEFAULT) {
        Ok(values) => values,
        Err(err) => {
            defmt::warn!("Override storage unavailable ({}), using defaults", err);
            TrackingValues::DEFAULT
        }
    };

    #[cfg(feature = "debug-mode")]
    defmt::info!(
        "Overrides: balance {:#x}, gain {:#x}",
        values.balance,
        values.gain
    );

    let overrides: &'static TrackingOverrides = OVERRIDES.init(TrackingOverrides::new(values));

    let servo = peripherals.servo;
    let engine = Interceptor::new(
        overrides,
        BusTransmitter::new(servo.bus),
        LatchSequencer::new(servo.latch, CycleDelay::new(SYSCLK_HZ)),
        servo.tap,
    );
    intercept::install(engine, peripherals.host.data, peripherals.host.switch);

    #[cfg(feature = "debug-mode")]
    defmt::info!("Spawning mode switch task...");

    spawner.spawn(mode_switch_task()).unwrap();

    SERVICE_REQUEST.wait().await;

    let service = ConfigService::new(store, overrides, INDEX_HTML);
    if let Err(err) = network::start(spawner, peripherals.usb, service) {
        defmt::error!("Configuration service failed to start: {}", err);
    }

    status::run(peripherals.indicator).await
}
