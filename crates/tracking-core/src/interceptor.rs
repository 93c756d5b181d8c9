//! Man-in-the-middle engine for the host → servo controller command bus.
//!
//! # Transaction state machine
//!
//! ```text
//! IDLE --clock edge--> ACCUMULATING --clock edge--> ACCUMULATING
//!   ^                       |
//!   |                   latch edge
//!   |                       v
//!   +-- LATCH_PULSE <-- TRANSMIT <-- CLASSIFY
//! ```
//!
//! Only `IDLE` and `ACCUMULATING` persist between edges. Classification,
//! re-transmission and the latch pulse all run to completion inside
//! [`Interceptor::on_latch_edge`], which the firmware calls straight from the
//! latch interrupt: the host starts its next command soon after, so none of
//! it can be deferred.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::capture::EdgeCapture;
use crate::classify::{Classification, Rule, Substitution, TRACKING_RULES, TapLevel, classify};
use crate::latch::LatchSequencer;
use crate::overrides::TrackingOverrides;
use crate::transmit::{BusTransmitter, FrameLength, SerialBus};

/// Persistent phase between two edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    Idle,
    Accumulating,
}

/// Record of one completed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transaction {
    /// Word assembled from the host's clock edges.
    pub captured: u32,
    /// Clock edges seen for this word.
    pub bits: u32,
    /// Word re-driven to the servo controller.
    pub sent: u32,
    pub frame: FrameLength,
    pub substituted: Option<Substitution>,
}

pub struct Interceptor<'a, B, L, D, T> {
    capture: EdgeCapture,
    rules: &'static [Rule],
    overrides: &'a TrackingOverrides,
    transmitter: BusTransmitter<B>,
    latch: LatchSequencer<L, D>,
    tap: T,
}

impl<'a, B, L, D, T> Interceptor<'a, B, L, D, T>
where
    B: SerialBus,
    L: OutputPin,
    D: DelayNs,
    T: OutputPin,
{
    /// Creates an interceptor using the tracking balance/gain rule table.
    pub fn new(
        overrides: &'a TrackingOverrides,
        transmitter: BusTransmitter<B>,
        latch: LatchSequencer<L, D>,
        tap: T,
    ) -> Self {
        Self {
            capture: EdgeCapture::new(),
            rules: &TRACKING_RULES,
            overrides,
            transmitter,
            latch,
            tap,
        }
    }

    /// Replaces the classification table.
    pub fn with_rules(mut self, rules: &'static [Rule]) -> Self {
        self.rules = rules;
        self
    }

    pub fn phase(&self) -> Phase {
        if self.capture.is_accumulating() {
            Phase::Accumulating
        } else {
            Phase::Idle
        }
    }

    /// Host clock rising edge with the data line level sampled at that edge.
    pub fn on_clock_edge(&mut self, data: bool) {
        self.capture.on_clock_edge(data);
    }

    /// Host latch falling edge: classify, re-transmit and latch the word.
    pub fn on_latch_edge(&mut self) -> Transaction {
        let bits = self.capture.bit_count();
        let captured = self.capture.on_latch_edge();

        let Classification { word, substituted } =
            classify(captured, self.rules, &self.overrides.snapshot());

        if let Some(substitution) = substituted {
            match substitution.tap {
                TapLevel::High => self.tap.set_high().ok(),
                TapLevel::Low => self.tap.set_low().ok(),
            };
        }

        let frame = self.send(word);

        Transaction {
            captured,
            bits,
            sent: word,
            frame,
            substituted,
        }
    }

    /// Drives `word` to the servo controller outside of a host transaction.
    ///
    /// Used by the configuration service; the word is neither classified nor
    /// reflected on the tap line, and a partially captured host word is left
    /// untouched.
    pub fn inject(&mut self, word: u16) -> FrameLength {
        self.send(u32::from(word))
    }

    /// Drops a partially captured host word.
    ///
    /// For use after the edge interrupts were held off: the pending edges no
    /// longer describe a complete word, so whatever was accumulated before
    /// must not reach the controller.
    pub fn discard(&mut self) {
        self.capture = EdgeCapture::new();
    }

    fn send(&mut self, word: u32) -> FrameLength {
        let frame = self.transmitter.transmit(word);
        self.latch.pulse();
        frame
    }
}
