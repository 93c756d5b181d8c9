//! Hardware-independent core of the tracking interposer.
//!
//! The interposer sits on the serial command bus between a host
//! microcontroller and a servo controller. It relays every command unchanged
//! except the tracking balance and tracking gain commands, which it replaces
//! with user-configured values.
//!
//! # Module Organization
//!
//! - [`capture`] - Bit accumulation from host clock/latch edges
//! - [`classify`] - Rule table deciding which commands get substituted
//! - [`transmit`] - Serial bus seam and frame-length selection
//! - [`latch`] - Latch pulse towards the servo controller
//! - [`interceptor`] - The per-transaction state machine tying the above together
//! - [`overrides`] - Override values shared between interrupt and task context
//! - [`storage`] - Flash persistence of the override values
//! - [`long_press`] - Mode switch long-press detection
//! - [`status`] - Status indicator blink schedule
//! - [`http`] / [`service`] - Configuration service
//!
//! Everything here is `no_std` and free of target dependencies; the firmware
//! crate supplies the [`transmit::SerialBus`] implementation, GPIO lines, the
//! cycle-counted delay and the flash driver.

#![cfg_attr(not(test), no_std)]
// Async trait methods are only awaited on a single-threaded executor.
#![allow(async_fn_in_trait)]

pub mod capture;
pub mod classify;
pub mod http;
pub mod interceptor;
pub mod latch;
pub mod long_press;
pub mod overrides;
pub mod service;
pub mod status;
pub mod storage;
pub mod transmit;

#[cfg(test)]
mod mock;
