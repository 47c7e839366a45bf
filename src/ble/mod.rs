//! Bluetooth Low Energy subsystem.
//!
//! This module drives the Nordic SoftDevice S140 in **Peripheral** role:
//!
//! 1. **Server** - Battery Service and the RMS monitor service, plus the
//!    telemetry sink that writes into them.
//! 2. **Peripheral** - advertises, accepts a single central, and turns GATT
//!    callbacks into link events for the monitor loop.
//!
//! Advertising payloads come from `sigmon::ble::adv_data`.

pub mod peripheral;
pub mod server;

pub use server::{GattSink, Server};
