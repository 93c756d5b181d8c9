//! Host bus interception driven from the EXTI9_5 interrupt.
//!
//! The three host-facing edges share one NVIC vector on the STM32L4:
//!
//! - **EXTI8** (PA8, rising): CLK_CPU, shift one DATA_CPU bit in
//! - **EXTI9** (PA9, falling): XLT_CPU, classify and re-drive the word
//! - **EXTI5** (PB5, both): mode switch, forwarded to the mode switch task
//!
//! The interceptor lives in a critical-section cell so the configuration
//! service can inject words from task context without racing a host
//! transaction.
//!
//! Flash erase and program run with interrupts disabled for milliseconds.
//! Host edges seen meanwhile collapse into single pending bits, so
//! [`PausedBusFlash`] takes the clock and latch lines out of the picture for
//! the duration and drops the half-captured word afterwards.

use core::cell::RefCell;

use cortex_m::peripheral::NVIC;
use critical_section::Mutex;
use embassy_stm32::gpio::{Input, Output};
use embassy_stm32::pac;
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};
use embassy_time::Timer;
use embedded_storage::nor_flash::{ErrorType, NorFlash, ReadNorFlash};
use pac::interrupt;
use tracking_core::interceptor::Interceptor;
use tracking_core::service::CommandSink;

use crate::bus::{CycleDelay, ServoBus};

/// Interceptor wired to the board's servo-side lines.
pub type Engine =
    Interceptor<'static, ServoBus, Output<'static>, CycleDelay, Output<'static>>;

/// EXTI line of CLK_CPU (PA8)
const CLOCK_LINE: usize = 8;

/// EXTI line of XLT_CPU (PA9)
const LATCH_LINE: usize = 9;

/// EXTI line of the mode switch (PB5)
const SWITCH_LINE: usize = 5;

/// Lines 0-31 live in the first EXTI register bank.
const EXTI_REG_IDX: usize = 0;

/// SYSCFG EXTICR port codes.
const PORT_A: u8 = 0;
const PORT_B: u8 = 1;

/// Everything the interrupt handler touches.
struct BusState {
    engine: Engine,
    data: Input<'static>,
    switch: Input<'static>,
}

static BUS: Mutex<RefCell<Option<BusState>>> = Mutex::new(RefCell::new(None));

/// Mode switch level on every switch edge (true = asserted).
pub static SWITCH_SIGNAL: Signal<CriticalSectionRawMutex, bool> = Signal::new();

/// Hands the interceptor to the interrupt handler and enables the EXTI lines.
///
/// # Arguments
///
/// * `engine` - Interceptor wired to the servo bus
/// * `data` - DATA_CPU input, sampled on every clock edge
/// * `switch` - Mode switch input, sampled on every switch edge
pub fn install(engine: Engine, data: Input<'static>, switch: Input<'static>) {
    critical_section::with(|cs| {
        BUS.borrow_ref_mut(cs).replace(BusState {
            engine,
            data,
            switch,
        });
    });

    setup_exti();

    #[cfg(feature = "debug-mode")]
    defmt::info!("Bus interception armed");
}

/// Routes the host bus and switch pins to their EXTI lines.
///
/// # Configuration
///
/// - EXTI8: rising edge (PA8)
/// - EXTI9: falling edge (PA9)
/// - EXTI5: rising and falling edges (PB5)
/// - NVIC: EXTI9_5 unmasked
fn setup_exti() {
    let exti = pac::EXTI;
    let syscfg = pac::SYSCFG;

    pac::RCC.apb2enr().modify(|w| w.set_syscfgen(true));

    for (line, port) in [(CLOCK_LINE, PORT_A), (LATCH_LINE, PORT_A), (SWITCH_LINE, PORT_B)] {
        syscfg
            .exticr(line / 4)
            .modify(|w| w.set_exti(line % 4, port));
    }

    exti.rtsr(EXTI_REG_IDX).modify(|w| {
        w.set_line(CLOCK_LINE, true);
        w.set_line(SWITCH_LINE, true);
    });
    exti.ftsr(EXTI_REG_IDX).modify(|w| {
        w.set_line(LATCH_LINE, true);
        w.set_line(SWITCH_LINE, true);
    });

    // Drop edges seen while the pins were being configured.
    exti.pr(EXTI_REG_IDX).write(|w| {
        w.set_line(CLOCK_LINE, true);
        w.set_line(LATCH_LINE, true);
        w.set_line(SWITCH_LINE, true);
    });

    exti.imr(EXTI_REG_IDX).modify(|w| {
        w.set_line(CLOCK_LINE, true);
        w.set_line(LATCH_LINE, true);
        w.set_line(SWITCH_LINE, true);
    });

    unsafe {
        NVIC::unmask(embassy_stm32::interrupt::EXTI9_5);
    };
}

/// Shared handler for EXTI lines 5 to 9.
///
/// Pending lines are served clock first, then latch, then switch. The
/// vector is masked for the duration so a late edge waits for the current
/// word to finish instead of nesting into it.
///
/// # Safety
///
/// This interrupt handler accesses PAC registers directly.
#[interrupt]
fn EXTI9_5() {
    NVIC::mask(embassy_stm32::interrupt::EXTI9_5);

    let exti = pac::EXTI;
    let pending = exti.pr(EXTI_REG_IDX).read();

    critical_section::with(|cs| {
        let mut bus = BUS.borrow_ref_mut(cs);

        if pending.line(CLOCK_LINE) {
            if let Some(bus) = bus.as_mut() {
                bus.engine.on_clock_edge(bus.data.is_high());
            }
            exti.pr(EXTI_REG_IDX).write(|w| w.set_line(CLOCK_LINE, true));
        }

        if pending.line(LATCH_LINE) {
            if let Some(bus) = bus.as_mut() {
                bus.engine.on_latch_edge();
            }
            exti.pr(EXTI_REG_IDX).write(|w| w.set_line(LATCH_LINE, true));
        }

        if pending.line(SWITCH_LINE) {
            if let Some(bus) = bus.as_ref() {
                SWITCH_SIGNAL.signal(bus.switch.is_high());
            }
            exti.pr(EXTI_REG_IDX).write(|w| w.set_line(SWITCH_LINE, true));
        }
    });

    unsafe {
        NVIC::unmask(embassy_stm32::interrupt::EXTI9_5);
    };
}

/// Drives one word to the servo controller from task context.
///
/// Returns false when the interceptor has not been installed.
pub fn inject(word: u16) -> bool {
    critical_section::with(|cs| {
        BUS.borrow_ref_mut(cs)
            .as_mut()
            .map(|bus| bus.engine.inject(word))
            .is_some()
    })
}

/// [`CommandSink`] backed by the installed interceptor.
pub struct BusSink;

impl CommandSink for BusSink {
    fn send(&mut self, word: u16) {
        if !inject(word) {
            defmt::warn!("Dropped {:#x}: bus not installed", word);
        }
    }

    async fn pause(&mut self, duration: core::time::Duration) {
        Timer::after(crate::to_ticks(duration)).await;
    }
}

/// Runs `op` with the host clock and latch lines masked, then discards any
/// partially captured word and stale pending edges before re-enabling them.
fn with_host_bus_paused<R>(op: impl FnOnce() -> R) -> R {
    let exti = pac::EXTI;

    let enabled = critical_section::with(|_| {
        let enabled = exti.imr(EXTI_REG_IDX).read();
        exti.imr(EXTI_REG_IDX).modify(|w| {
            w.set_line(CLOCK_LINE, false);
            w.set_line(LATCH_LINE, false);
        });
        enabled
    });

    let result = op();

    critical_section::with(|cs| {
        if let Some(bus) = BUS.borrow_ref_mut(cs).as_mut() {
            bus.engine.discard();
        }
        exti.pr(EXTI_REG_IDX).write(|w| {
            w.set_line(CLOCK_LINE, true);
            w.set_line(LATCH_LINE, true);
        });
        exti.imr(EXTI_REG_IDX).modify(|w| {
            w.set_line(CLOCK_LINE, enabled.line(CLOCK_LINE));
            w.set_line(LATCH_LINE, enabled.line(LATCH_LINE));
        });
    });

    result
}

/// Flash wrapper that pauses host bus capture around erase and program.
pub struct PausedBusFlash<F> {
    flash: F,
}

impl<F> PausedBusFlash<F> {
    pub fn new(flash: F) -> Self {
        Self { flash }
    }
}

impl<F: ErrorType> ErrorType for PausedBusFlash<F> {
    type Error = F::Error;
}

impl<F: ReadNorFlash> ReadNorFlash for PausedBusFlash<F> {
    const READ_SIZE: usize = F::READ_SIZE;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.flash.read(offset, bytes)
    }

    fn capacity(&self) -> usize {
        self.flash.capacity()
    }
}

impl<F: NorFlash> NorFlash for PausedBusFlash<F> {
    const WRITE_SIZE: usize = F::WRITE_SIZE;
    const ERASE_SIZE: usize = F::ERASE_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        with_host_bus_paused(|| self.flash.erase(from, to))
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        with_host_bus_paused(|| self.flash.write(offset, bytes))
    }
}
