//! Flash-backed EEPROM emulation for microcontrollers whose non-volatile
//! storage is a NOR-style flash array: word-aligned programming that can
//! only clear bits, and bulk page erase that returns a whole page to
//! all-`1`s. On top of that, this crate presents a byte-addressable
//! key/value store of fixed-width 16-bit values, durable across power loss
//! at any point.
//!
//! The hard part, and the sole subject of this crate, is the wear-leveled,
//! crash-safe page rotation protocol: the page-header state machine, the
//! log-structured record format, the copy-compact transfer that moves live
//! values off a full page before erasing it, and the startup
//! reconstruction that converges to a consistent state after an unknown
//! interruption.
//!
//! # Examples
//! ```
//! # #[cfg(feature = "testutil")] {
//! use flash_eeprom::config::Config;
//! use flash_eeprom::testutil::SimFlash;
//! use flash_eeprom::Eeprom;
//!
//! const KEYS: [u16; 2] = [1, 2];
//! let flash = SimFlash::new(0, 1024, 3);
//! let config = Config::new(0, 1024, 3, &KEYS);
//! let mut eeprom = Eeprom::new(flash, config);
//!
//! eeprom.init().expect("init should never fail against a fresh array");
//! eeprom.write(1, 0xdead).expect("failed to write data");
//! eeprom.write(2, 0xbeef).expect("failed to write data");
//! assert_eq!(Some(0xdead), eeprom.read(1).unwrap());
//! assert_eq!(Some(0xbeef), eeprom.read(2).unwrap());
//! assert_eq!(None, eeprom.read(3).unwrap());
//! # }
//! ```
//!
//! # Non-goals
//! Arbitrary-length values, deletion (emulate it by overwriting), atomic
//! multi-key transactions, wear statistics, encryption, and concurrent
//! writers are all out of scope. The core is re-entrant only against power
//! loss, not against concurrent callers: the host must serialize `init`,
//! `read`, and `write` itself.
#![cfg_attr(not(any(test, feature = "testutil")), no_std)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod flash;
mod record;
mod status;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

mod eeprom;

/// The wear-leveled, crash-safe key/value controller. See the crate-level
/// docs for an overview and [`crate::error::Error`] for its failure modes.
pub use crate::eeprom::Eeprom;
/// The error type returned by `Eeprom`'s methods.
pub use crate::error::Error;
/// A page's decoded header state.
pub use crate::status::Status;
