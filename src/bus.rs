//! Register-level servo controller bus and the latch pulse delay.
//!
//! embassy's SPI driver configures pins, clocks and mode, but reprograms the
//! data size on every transfer and goes through its generic word path. The
//! bus interrupt needs neither, so transfers are issued directly on the SPI1
//! registers once the driver has set the peripheral up.

use core::ptr;

use embassy_stm32::mode::Blocking;
use embassy_stm32::pac;
use embassy_stm32::pac::spi::vals;
use embassy_stm32::spi::Spi;
use embedded_hal::delay::DelayNs;
use tracking_core::transmit::{FrameLength, SerialBus};

/// SPI1 driven at register level. The embassy driver is kept to own the
/// peripheral and its pins.
pub struct ServoBus {
    _spi: Spi<'static, Blocking>,
    frame: FrameLength,
}

impl ServoBus {
    pub fn new(spi: Spi<'static, Blocking>) -> Self {
        let mut bus = Self {
            _spi: spi,
            frame: FrameLength::Bits16,
        };
        bus.configure(FrameLength::Bits8);
        bus
    }
}

impl SerialBus for ServoBus {
    fn configure(&mut self, frame: FrameLength) {
        if frame == self.frame {
            return;
        }

        let ds = match frame {
            FrameLength::Bits8 => vals::Ds::BITS8,
            FrameLength::Bits12 => vals::Ds::BITS12,
            FrameLength::Bits16 => vals::Ds::BITS16,
        };

        // DS may only change while the peripheral is disabled.
        let regs = pac::SPI1;
        regs.cr1().modify(|w| w.set_spe(false));
        regs.cr2().modify(|w| w.set_ds(ds));
        regs.cr1().modify(|w| w.set_spe(true));

        self.frame = frame;
    }

    fn transmit(&mut self, value: u16) {
        let dr = pac::SPI1.dr().as_ptr();

        // Frames of 8 bits or less need a byte access, otherwise the FIFO
        // packs two frames out of one halfword write.
        unsafe {
            match self.frame {
                FrameLength::Bits8 => ptr::write_volatile(dr as *mut u8, value as u8),
                FrameLength::Bits12 | FrameLength::Bits16 => {
                    ptr::write_volatile(dr as *mut u16, value)
                }
            }
        }
    }

    /// Busy until the TX FIFO has drained and the last frame left the
    /// shift register. TXE alone is set again while one frame still sits in
    /// a half-full FIFO.
    fn is_busy(&self) -> bool {
        let sr = pac::SPI1.sr().read();
        sr.ftlvl() != vals::Ftlvl::EMPTY || sr.bsy()
    }
}

/// Busy-wait calibrated against the core clock.
///
/// Never yields and never touches a timer peripheral, so it is safe inside
/// the bus interrupt.
pub struct CycleDelay {
    cycles_per_us: u32,
}

impl CycleDelay {
    pub const fn new(sysclk_hz: u32) -> Self {
        Self {
            cycles_per_us: sysclk_hz / 1_000_000,
        }
    }
}

impl DelayNs for CycleDelay {
    fn delay_ns(&mut self, ns: u32) {
        let cycles = (u64::from(ns) * u64::from(self.cycles_per_us)).div_ceil(1_000);
        cortex_m::asm::delay(cycles.max(1) as u32);
    }
}
