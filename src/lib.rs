//! This crate provides an interface for reading and programming iCharger battery chargers over their USB HID link.
//!
//! It supports `no-std` environments by use of the `no_std` feature flag.
//!
//! Charger families which this should work with:
//! * 308 DUO, 406 DUO, 4010 DUO
//! * X6, X8, X12
//! * S6, DX6, DX8
//!
//! It speaks Modbus over 64 byte HID reports. Implement [`transport::HidTransport`] for your HID
//! stack, or enable the `hidapi` feature for [`hid::HidApiTransport`]. The charger enumerates as:
//! * Vendor ID: 0x0483
//! * Product ID: 0x5751
//!
//! [`charger::Charger`] is the entry point: it reads device info, live channel status, system
//! settings and program memories, and runs the firmware's orders.

#![cfg_attr(feature = "no_std", no_std)]

pub mod charger;
pub mod chemistry;
pub mod device;
pub mod directory;
pub mod error;
pub mod framer;
pub mod info;
pub mod master;
pub mod memory;
pub mod projection;
pub mod registers;
pub mod status;
pub mod system;
pub mod transport;

#[cfg(feature = "hidapi")]
pub mod hid;

#[cfg(test)]
mod mock_hid;
