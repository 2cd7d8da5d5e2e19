//! Last known device lists and radio flags.
//!
//! Writers are background tasks; readers are the consumer. All access goes
//! through one mutex and reads copy the data out.

use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::api::models::{DeviceRecord, Subsystem};
use crate::core::delivery::{Delivery, DeliverySender};

#[derive(Debug, Clone)]
struct SubsystemState {
    devices: Vec<DeviceRecord>,
    radio_enabled: bool,
}

impl Default for SubsystemState {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            radio_enabled: true,
        }
    }
}

/// Shared store of per-subsystem state.
#[derive(Debug, Clone, Default)]
pub(crate) struct StateCache {
    inner: Arc<Mutex<HashMap<Subsystem, SubsystemState>>>,
}

impl StateCache {
    fn lock(&self) -> MutexGuard<'_, HashMap<Subsystem, SubsystemState>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the last stored list.
    pub(crate) fn devices(&self, subsystem: Subsystem) -> Vec<DeviceRecord> {
        self.lock()
            .get(&subsystem)
            .map(|s| s.devices.clone())
            .unwrap_or_default()
    }

    /// Copy of the cached record for `identifier`, if any.
    pub(crate) fn find(&self, subsystem: Subsystem, identifier: &str) -> Option<DeviceRecord> {
        let wanted = subsystem.canonical_identifier(identifier);
        self.lock()
            .get(&subsystem)
            .and_then(|s| {
                s.devices
                    .iter()
                    .find(|d| subsystem.canonical_identifier(&d.identifier) == wanted)
            })
            .cloned()
    }

    /// The radio flag; `true` until the first query or toggle says otherwise.
    pub(crate) fn radio_enabled(&self, subsystem: Subsystem) -> bool {
        self.lock()
            .get(&subsystem)
            .map_or(true, |s| s.radio_enabled)
    }

    /// Replaces the list and queues the matching delivery under the same
    /// lock, so deliveries reach the consumer in write order.
    ///
    /// A list arriving while the radio is off is stored as empty.
    pub(crate) fn store_devices(
        &self,
        subsystem: Subsystem,
        devices: Vec<DeviceRecord>,
        deliveries: &DeliverySender,
    ) {
        let mut states = self.lock();
        let state = states.entry(subsystem).or_default();

        state.devices = if state.radio_enabled {
            devices
        } else {
            if !devices.is_empty() {
                debug!("Dropping {subsystem} scan result: radio is off");
            }
            Vec::new()
        };

        deliveries.send(Delivery::DevicesUpdated {
            subsystem,
            devices: state.devices.clone(),
        });
    }

    /// Sets the radio flag and queues a radio delivery. Turning the radio off
    /// also clears the list and queues an empty device delivery first.
    pub(crate) fn set_radio_enabled(
        &self,
        subsystem: Subsystem,
        enabled: bool,
        deliveries: &DeliverySender,
    ) {
        let mut states = self.lock();
        let state = states.entry(subsystem).or_default();
        state.radio_enabled = enabled;

        if !enabled {
            state.devices.clear();
            deliveries.send(Delivery::DevicesUpdated {
                subsystem,
                devices: Vec::new(),
            });
        }
        deliveries.send(Delivery::RadioStateChanged { subsystem, enabled });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::SignalSource;

    fn record(id: &str, connected: bool) -> DeviceRecord {
        DeviceRecord {
            subsystem: Subsystem::Bluetooth,
            identifier: id.into(),
            display_name: format!("{id} name"),
            signal_strength: 60,
            signal_source: SignalSource::Estimated,
            connected,
            secured_or_paired: true,
        }
    }

    #[test]
    fn radio_defaults_to_enabled() {
        let cache = StateCache::default();
        assert!(cache.radio_enabled(Subsystem::Wifi));
        assert!(cache.devices(Subsystem::Wifi).is_empty());
    }

    #[test]
    fn store_then_find() {
        let (tx, mut rx) = DeliverySender::channel();
        let cache = StateCache::default();
        cache.store_devices(Subsystem::Bluetooth, vec![record("AA", true)], &tx);

        assert!(cache.find(Subsystem::Bluetooth, "AA").unwrap().connected);
        assert!(cache.find(Subsystem::Bluetooth, "BB").is_none());
        assert!(cache.find(Subsystem::Wifi, "AA").is_none());

        match rx.try_recv().unwrap() {
            Delivery::DevicesUpdated { subsystem, devices } => {
                assert_eq!(subsystem, Subsystem::Bluetooth);
                assert_eq!(devices.len(), 1);
            }
            other => panic!("unexpected delivery {other:?}"),
        }
    }

    #[test]
    fn disable_clears_and_blocks_late_results() {
        let (tx, mut rx) = DeliverySender::channel();
        let cache = StateCache::default();
        cache.store_devices(Subsystem::Bluetooth, vec![record("AA", false)], &tx);
        cache.set_radio_enabled(Subsystem::Bluetooth, false, &tx);
        cache.store_devices(Subsystem::Bluetooth, vec![record("BB", false)], &tx);

        assert!(cache.devices(Subsystem::Bluetooth).is_empty());

        let _first = rx.try_recv().unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            Delivery::DevicesUpdated {
                subsystem: Subsystem::Bluetooth,
                devices: vec![]
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            Delivery::RadioStateChanged {
                subsystem: Subsystem::Bluetooth,
                enabled: false
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            Delivery::DevicesUpdated {
                subsystem: Subsystem::Bluetooth,
                devices: vec![]
            }
        );
    }
}
