//! Constants for bus names, object paths and tool invocations.
//!
//! These correspond to the names used by BlueZ and NetworkManager on the
//! system bus and to the field lists passed to `nmcli` in terse mode.

/// BlueZ service, interface and path constants.
pub mod bluez {
    pub const SERVICE: &str = "org.bluez";
    pub const ROOT: &str = "/org/bluez";
    /// Child nodes under an adapter that represent remote devices.
    pub const DEVICE_PREFIX: &str = "dev_";
    pub const DEVICE_INTERFACE: &str = "org.bluez.Device1";
}

/// NetworkManager settings objects, used to delete saved profiles by name.
pub mod nm_settings {
    pub const SERVICE: &str = "org.freedesktop.NetworkManager";
    pub const PATH: &str = "/org/freedesktop/NetworkManager/Settings";
    pub const INTERFACE: &str = "org.freedesktop.NetworkManager.Settings";
    pub const CONNECTION_INTERFACE: &str = "org.freedesktop.NetworkManager.Settings.Connection";
}

/// Normalized keys of a gateway property map.
pub mod property {
    pub const ADDRESS: &str = "address";
    pub const NAME: &str = "name";
    pub const PAIRED: &str = "paired";
    pub const CONNECTED: &str = "connected";
    /// Signal strength already scaled to 0-100.
    pub const SIGNAL: &str = "signal";
}

/// Default signal estimates used when hardware reports nothing.
pub mod estimate {
    pub const CONNECTED: u8 = 75;
    pub const PAIRED: u8 = 60;
    pub const PRESENT: u8 = 40;
}

/// `nmcli` invocation constants.
pub mod nmcli {
    pub const PROGRAM: &str = "nmcli";
    pub const WIFI_LIST_FIELDS: &str = "IN-USE,SSID,SIGNAL,SECURITY";
    /// Marker in the IN-USE column for the active network.
    pub const IN_USE: &str = "*";
    /// Placeholder nmcli prints for an empty security column.
    pub const NO_SECURITY: &str = "--";
}

/// RSSI bounds used to scale dBm readings to a 0-100 figure.
pub mod rssi {
    pub const FLOOR_DBM: i64 = -100;
    pub const CEILING_DBM: i64 = -50;
}

/// Signal strength thresholds for bar display
pub mod signal_strength {
    pub const BAR_1_MAX: u8 = 24;
    pub const BAR_2_MIN: u8 = BAR_1_MAX + 1;
    pub const BAR_2_MAX: u8 = 49;
    pub const BAR_3_MIN: u8 = BAR_2_MAX + 1;
    pub const BAR_3_MAX: u8 = 74;
}

/// Timeout constants.
///
/// The core itself never times out an operation; these bound the external
/// calls made by the gateways and the watcher's debounce window.
pub mod timeouts {
    use std::time::Duration;

    /// Maximum time an external command may run (30 seconds).
    const COMMAND_TIMEOUT_SECS: u64 = 30;

    /// Quiet period before a change notification triggers a rescan.
    const WATCH_DEBOUNCE_MS: u64 = 1500;

    /// Returns the external command timeout.
    pub fn command_timeout() -> Duration {
        Duration::from_secs(COMMAND_TIMEOUT_SECS)
    }

    /// Returns the watcher debounce window.
    pub fn watch_debounce() -> Duration {
        Duration::from_millis(WATCH_DEBOUNCE_MS)
    }
}
