//! Flash programming algorithm for the boot flash (BFLASH) of the K1921VK028.
//!
//! A host tool (probe-rs, Keil) loads the algorithm into RAM and calls the
//! FlashOS entry points `Init`, `EraseChip`, `EraseSector`, `ProgramPage` and
//! `UnInit`. [`BootFlash`] implements them on top of the controller register
//! block; the entry points themselves live in the `algorithm` binary.
//!
//! Host-side tests run the same driver against `sim::SimController`
//! (feature `sim`).
#![cfg_attr(not(any(test, feature = "sim")), no_std)]

#[macro_use]
mod fmt;

pub mod async_driver;
pub mod descriptor;
pub mod driver;
pub mod error;
pub mod poll;
pub mod regs;
pub mod session;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod traits;

pub use async_driver::AsyncBootFlash;
pub use descriptor::{DeviceDescriptor, DeviceType, SectorInfo, K1921VK028_BFLASH, SECTOR_END};
pub use driver::BootFlash;
pub use error::{status, Error};
pub use poll::Timing;
pub use regs::{Command, GRANULE};
pub use session::{Function, Session};
pub use traits::{ControllerRegisters, HardwareFlashDevice};
