//! Outbound serial bus towards the servo controller.

/// Bit width of one outbound transfer.
///
/// The controller decodes commands by their length, so the frame must be no
/// wider than the command needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameLength {
    Bits8,
    Bits12,
    Bits16,
}

impl FrameLength {
    /// Smallest frame class that holds `word`.
    pub const fn for_word(word: u32) -> Self {
        if word <= 0xFF {
            Self::Bits8
        } else if word <= 0xFFF {
            Self::Bits12
        } else {
            Self::Bits16
        }
    }

    pub const fn bits(self) -> u8 {
        match self {
            Self::Bits8 => 8,
            Self::Bits12 => 12,
            Self::Bits16 => 16,
        }
    }
}

/// Synchronous serial peripheral driven from interrupt context.
///
/// Implementations must not yield to a scheduler: every method returns as
/// soon as the register access is done.
pub trait SerialBus {
    /// Programs the frame length of the next transfer.
    fn configure(&mut self, frame: FrameLength);

    /// Loads `value` and starts the transfer.
    fn transmit(&mut self, value: u16);

    /// True while the last transfer is still shifting out.
    fn is_busy(&self) -> bool;
}

/// Drives whole command words onto a [`SerialBus`].
pub struct BusTransmitter<B> {
    bus: B,
}

impl<B: SerialBus> BusTransmitter<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Sends `word` and spins until the peripheral is idle again.
    ///
    /// There is no timeout: a peripheral that never goes idle hangs the
    /// caller. Bits above the 16-bit frame are not representable on the wire
    /// and are dropped.
    pub fn transmit(&mut self, word: u32) -> FrameLength {
        let frame = FrameLength::for_word(word);

        self.bus.configure(frame);
        self.bus.transmit(word as u16);

        while self.bus.is_busy() {
            core::hint::spin_loop();
        }

        frame
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}
