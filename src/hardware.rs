//! Hardware abstraction and peripheral initialization.
//!
//! This module defines the pin mappings and peripheral initialization
//! for the interposer board (NUCLEO-L432KC wired between the host MCU and
//! the servo controller).
//!
//! # Pin Assignments
//!
//! ## Host Bus (inputs, monitored through EXTI9_5)
//! - **PA8**: CLK_CPU - Host bus clock, rising edge samples DATA_CPU (EXTI8)
//! - **PA9**: XLT_CPU - Host latch, falling edge ends a command (EXTI9)
//! - **PA10**: DATA_CPU - Host bus data
//!
//! ## Servo Controller Bus (outputs)
//! - **PA5**: SPI1_SCK - Re-driven clock (CPOL=1, CPHA=1)
//! - **PA7**: SPI1_MOSI - Re-driven data, LSB first
//! - **PA4**: XLT_CONTROLLER - Latch towards the controller, idle high
//!
//! ## Board
//! - **PB0**: SENS - Side-channel tap: high after a balance substitution,
//!   low after a gain substitution
//! - **PB5**: SWITCH - Mode switch, long press starts the configuration
//!   service (EXTI5, both edges)
//! - **PB3**: LED - Status indicator (LD3, active high)
//!
//! ## USB (configuration service)
//! - **PA11**: USB_DM
//! - **PA12**: USB_DP
//!
//! ## Debug (SWD)
//! - **PA13**: SWDIO
//! - **PA14**: SWCLK

use embassy_stm32::Peri;
use embassy_stm32::flash::{Blocking as FlashBlocking, Flash};
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::peripherals::{PA11, PA12, USB};
use embassy_stm32::spi::{self, Spi};
use embassy_stm32::time::Hertz;

use crate::bus::ServoBus;

/// Outbound SPI clock. The controller samples on the rising edge.
const SERVO_BUS_FREQUENCY: Hertz = Hertz::mhz(1);

/// Host bus inputs sampled from the EXTI handler.
pub struct HostLines {
    /// DATA_CPU, read on every clock edge
    pub data: Input<'static>,
    /// SWITCH, read on every switch edge
    pub switch: Input<'static>,
    /// CLK_CPU, kept only so the pin stays configured as input
    pub _clock: Input<'static>,
    /// XLT_CPU, kept only so the pin stays configured as input
    pub _latch: Input<'static>,
}

/// Lines driven towards the servo controller.
pub struct ServoLines {
    pub bus: ServoBus,
    /// Active-low latch, idle high
    pub latch: Output<'static>,
    /// Side-channel substitution tap
    pub tap: Output<'static>,
}

/// USB peripheral and pins, consumed when the configuration service starts.
pub struct UsbParts {
    pub usb: Peri<'static, USB>,
    pub dp: Peri<'static, PA12>,
    pub dm: Peri<'static, PA11>,
}

/// Top-level peripheral container for the interposer.
pub struct Peripherals {
    pub host: HostLines,
    pub servo: ServoLines,
    pub indicator: Output<'static>,
    pub flash: Flash<'static, FlashBlocking>,
    pub usb: UsbParts,
}

impl Peripherals {
    /// Initializes all peripherals from the STM32 peripheral singleton.
    ///
    /// # Initial GPIO States
    ///
    /// - PA4 (XLT_CONTROLLER): High (latch idle)
    /// - PB0 (SENS): Low
    /// - PB3 (LED): Low (off)
    ///
    /// Host inputs are pulled to their idle levels (clock and latch high,
    /// data low) so a disconnected host produces no edges.
    pub fn new(p: embassy_stm32::Peripherals) -> Self {
        let mut spi_config = spi::Config::default();
        spi_config.mode = spi::MODE_3;
        spi_config.bit_order = spi::BitOrder::LsbFirst;
        spi_config.frequency = SERVO_BUS_FREQUENCY;

        Self {
            host: HostLines {
                data: Input::new(p.PA10, Pull::Down),
                switch: Input::new(p.PB5, Pull::None),
                _clock: Input::new(p.PA8, Pull::Up),
                _latch: Input::new(p.PA9, Pull::Up),
            },
            servo: ServoLines {
                bus: ServoBus::new(Spi::new_blocking_txonly(p.SPI1, p.PA5, p.PA7, spi_config)),
                latch: Output::new(p.PA4, Level::High, Speed::VeryHigh),
                tap: Output::new(p.PB0, Level::Low, Speed::Low),
            },
            indicator: Output::new(p.PB3, Level::Low, Speed::Low),
            flash: Flash::new_blocking(p.FLASH),
            usb: UsbParts {
                usb: p.USB,
                dp: p.PA12,
                dm: p.PA11,
            },
        }
    }
}
