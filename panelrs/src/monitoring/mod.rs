//! Change notifications from the system bus.
//!
//! Watchers turn bus signals into debounced rescans so the cached lists
//! follow the hardware without polling.

pub(crate) mod bluez;
