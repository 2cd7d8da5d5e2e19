//! D-Bus proxy interfaces for BlueZ.
//!
//! This module contains low-level D-Bus proxy definitions for communicating
//! with the Bluetooth daemon over the system bus.

mod bluez;

pub(crate) use bluez::{BluezAdapterProxy, BluezDeviceProxy};
