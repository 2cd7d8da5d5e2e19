use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::api::models::Subsystem;
use crate::types::constants::{bluez, estimate, nmcli, timeouts};

/// Signal figures assigned when the hardware reports none.
///
/// These are a heuristic ranking (connected above paired above merely
/// visible), not a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalEstimates {
    /// Estimate for a connected device
    pub connected: u8,
    /// Estimate for a paired (or secured) but idle device
    pub paired: u8,
    /// Estimate for a device that is merely visible
    pub present: u8,
}

impl SignalEstimates {
    /// Picks the estimate for a record's state.
    pub fn estimate(&self, connected: bool, secured_or_paired: bool) -> u8 {
        if connected {
            self.connected
        } else if secured_or_paired {
            self.paired
        } else {
            self.present
        }
    }
}

impl Default for SignalEstimates {
    /// Defaults: connected 75, paired 60, present 40.
    fn default() -> Self {
        Self {
            connected: estimate::CONNECTED,
            paired: estimate::PAIRED,
            present: estimate::PRESENT,
        }
    }
}

/// Settings for a [`DevicePanel`](crate::DevicePanel).
///
/// The panel does not read or write any settings file; embedders build a
/// config in code or deserialize one from their own storage.
///
/// # Examples
///
/// ```rust
/// use panelrs::{PanelConfig, Subsystem};
/// use std::time::Duration;
///
/// let config = PanelConfig::default()
///     .with_subsystems([Subsystem::Bluetooth])
///     .with_command_timeout(Duration::from_secs(10));
///
/// assert_eq!(config.subsystems, vec![Subsystem::Bluetooth]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Subsystems to manage
    pub subsystems: Vec<Subsystem>,
    /// Program used for Wi-Fi operations
    pub nmcli_program: String,
    /// Object path under which Bluetooth adapters are enumerated
    pub bluez_root: String,
    /// Upper bound for a single external command
    pub command_timeout: Duration,
    /// Values used when no hardware signal is available
    pub estimates: SignalEstimates,
    /// Quiet period before a bus change notification triggers a rescan
    pub watch_debounce: Duration,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            subsystems: Subsystem::ALL.to_vec(),
            nmcli_program: nmcli::PROGRAM.to_string(),
            bluez_root: bluez::ROOT.to_string(),
            command_timeout: timeouts::command_timeout(),
            estimates: SignalEstimates::default(),
            watch_debounce: timeouts::watch_debounce(),
        }
    }
}

impl PanelConfig {
    /// Restricts the panel to the given subsystems.
    #[must_use]
    pub fn with_subsystems(mut self, subsystems: impl IntoIterator<Item = Subsystem>) -> Self {
        self.subsystems = subsystems.into_iter().collect();
        self.subsystems.sort();
        self.subsystems.dedup();
        self
    }

    /// Sets the program used for Wi-Fi operations.
    #[must_use]
    pub fn with_nmcli_program(mut self, program: impl Into<String>) -> Self {
        self.nmcli_program = program.into();
        self
    }

    /// Sets the object path under which Bluetooth adapters are enumerated.
    #[must_use]
    pub fn with_bluez_root(mut self, root: impl Into<String>) -> Self {
        self.bluez_root = root.into();
        self
    }

    /// Sets the upper bound for a single external command.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets the signal estimates.
    #[must_use]
    pub fn with_estimates(mut self, estimates: SignalEstimates) -> Self {
        self.estimates = estimates;
        self
    }

    /// Sets the watcher debounce window.
    #[must_use]
    pub fn with_watch_debounce(mut self, debounce: Duration) -> Self {
        self.watch_debounce = debounce;
        self
    }

    /// Whether `subsystem` is managed.
    pub fn manages(&self, subsystem: Subsystem) -> bool {
        self.subsystems.contains(&subsystem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_manages_everything() {
        let config = PanelConfig::default();
        assert!(config.manages(Subsystem::Wifi));
        assert!(config.manages(Subsystem::Bluetooth));
        assert_eq!(config.nmcli_program, "nmcli");
        assert_eq!(config.bluez_root, "/org/bluez");
    }

    #[test]
    fn with_subsystems_dedups() {
        let config = PanelConfig::default().with_subsystems([
            Subsystem::Bluetooth,
            Subsystem::Wifi,
            Subsystem::Bluetooth,
        ]);
        assert_eq!(config.subsystems, vec![Subsystem::Wifi, Subsystem::Bluetooth]);
    }

    #[test]
    fn estimates_rank_by_state() {
        let est = SignalEstimates::default();
        assert_eq!(est.estimate(true, true), 75);
        assert_eq!(est.estimate(true, false), 75);
        assert_eq!(est.estimate(false, true), 60);
        assert_eq!(est.estimate(false, false), 40);
    }
}
