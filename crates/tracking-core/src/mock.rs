//! Recording test doubles for the hardware seams.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};
use embedded_storage::nor_flash::{
    ErrorType as FlashErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

use crate::transmit::{FrameLength, SerialBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Configure(FrameLength),
    Transmit(u16),
    Idle,
    Pin(&'static str, bool),
    Delay(u32),
}

/// Ordered record of everything the doubles were asked to do.
#[derive(Debug, Default, Clone)]
pub struct EventLog(Rc<RefCell<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn transmitted(&self) -> Vec<u16> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Transmit(value) => Some(value),
                _ => None,
            })
            .collect()
    }
}

/// Serial bus that reports busy for a fixed number of polls per transfer.
pub struct RecordingBus {
    log: EventLog,
    busy_for: u32,
    remaining: Cell<u32>,
    polls: Cell<u32>,
    in_flight: Cell<bool>,
}

impl RecordingBus {
    pub fn new(log: &EventLog, busy_for: u32) -> Self {
        Self {
            log: log.clone(),
            busy_for,
            remaining: Cell::new(0),
            polls: Cell::new(0),
            in_flight: Cell::new(false),
        }
    }

    pub fn busy_polls(&self) -> u32 {
        self.polls.get()
    }
}

impl SerialBus for RecordingBus {
    fn configure(&mut self, frame: FrameLength) {
        self.log.push(Event::Configure(frame));
    }

    fn transmit(&mut self, value: u16) {
        self.log.push(Event::Transmit(value));
        self.remaining.set(self.busy_for);
        self.in_flight.set(true);
    }

    fn is_busy(&self) -> bool {
        self.polls.set(self.polls.get() + 1);
        if self.remaining.get() > 0 {
            self.remaining.set(self.remaining.get() - 1);
            return true;
        }
        if self.in_flight.replace(false) {
            self.log.push(Event::Idle);
        }
        false
    }
}

pub struct RecordingPin {
    log: EventLog,
    name: &'static str,
}

impl RecordingPin {
    pub fn new(log: &EventLog, name: &'static str) -> Self {
        Self {
            log: log.clone(),
            name,
        }
    }
}

impl ErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.log.push(Event::Pin(self.name, false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.log.push(Event::Pin(self.name, true));
        Ok(())
    }
}

pub struct RecordingDelay {
    log: EventLog,
}

impl RecordingDelay {
    pub fn new(log: &EventLog) -> Self {
        Self { log: log.clone() }
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.log.push(Event::Delay(ns));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashFault;

impl NorFlashError for FlashFault {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

/// RAM-backed flash with STM32L4 geometry and switchable faults.
pub struct RamFlash {
    pub memory: Vec<u8>,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl RamFlash {
    pub const PAGE: usize = 2048;

    pub fn new(pages: usize) -> Self {
        Self {
            memory: vec![0xFF; pages * Self::PAGE],
            fail_reads: false,
            fail_writes: false,
        }
    }
}

impl FlashErrorType for RamFlash {
    type Error = FlashFault;
}

impl ReadNorFlash for RamFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        if self.fail_reads {
            return Err(FlashFault);
        }
        let start = offset as usize;
        bytes.copy_from_slice(&self.memory[start..start + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.memory.len()
    }
}

impl NorFlash for RamFlash {
    const WRITE_SIZE: usize = 8;
    const ERASE_SIZE: usize = Self::PAGE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(FlashFault);
        }
        self.memory[from as usize..to as usize].fill(0xFF);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(FlashFault);
        }
        let start = offset as usize;
        for (cell, byte) in self.memory[start..start + bytes.len()].iter_mut().zip(bytes) {
            *cell &= *byte;
        }
        Ok(())
    }
}
