//! Building device lists from gateway output.
//!
//! Catalogs are only ever called from background tasks. The scheduler
//! checks the radio flag first, so a catalog never runs for a disabled
//! subsystem.

use async_trait::async_trait;
use log::{debug, warn};
use std::collections::HashMap;

use crate::api::config::SignalEstimates;
use crate::api::models::{DeviceRecord, SignalSource, Subsystem};
use crate::core::resolver::{list_adapters, unescape_address};
use crate::gateway::{Gateway, PropertyMap, PropertyValue};
use crate::types::constants::{bluez, nmcli, property};
use crate::util::introspect::{child_nodes, child_path};
use crate::util::utils::split_terse_fields;
use crate::Result;

/// Produces the current list of networks or devices of one subsystem.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Scans through `gateway`, estimating signals with `estimates` where the
    /// hardware reports none.
    ///
    /// Fails only when the subsystem cannot be enumerated at all. Failures
    /// for individual records degrade that record instead.
    async fn scan(
        &self,
        gateway: &dyn Gateway,
        estimates: &SignalEstimates,
    ) -> Result<Vec<DeviceRecord>>;
}

/// Builds the Wi-Fi list from `nmcli` terse output.
#[derive(Debug, Clone, Copy, Default)]
pub struct WifiCatalog;

#[async_trait]
impl Catalog for WifiCatalog {
    async fn scan(
        &self,
        gateway: &dyn Gateway,
        estimates: &SignalEstimates,
    ) -> Result<Vec<DeviceRecord>> {
        let lines = gateway.list_networks().await?;
        let records = lines
            .iter()
            .filter_map(|l| parse_wifi_line(l))
            .map(|entry| entry.into_record(estimates))
            .collect();
        Ok(dedup_records(records))
    }
}

/// Builds the Bluetooth list by walking adapters and their device nodes.
#[derive(Debug, Clone)]
pub struct BluetoothCatalog {
    root: String,
    child_prefix: String,
}

impl Default for BluetoothCatalog {
    fn default() -> Self {
        Self::new(bluez::ROOT)
    }
}

impl BluetoothCatalog {
    /// Creates a catalog enumerating adapters under `root`.
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            child_prefix: bluez::DEVICE_PREFIX.to_string(),
        }
    }

    fn record_from(
        &self,
        node: &str,
        props: Option<&PropertyMap>,
        estimates: &SignalEstimates,
    ) -> DeviceRecord {
        let str_prop = |key: &str| {
            props
                .and_then(|p| p.get(key))
                .and_then(PropertyValue::as_str)
                .filter(|s| !s.is_empty())
        };
        let bool_prop = |key: &str| {
            props
                .and_then(|p| p.get(key))
                .and_then(PropertyValue::as_bool)
                .unwrap_or(false)
        };

        let identifier = str_prop(property::ADDRESS)
            .map(str::to_string)
            .unwrap_or_else(|| unescape_address(node, &self.child_prefix))
            .to_ascii_uppercase();
        let display_name = str_prop(property::NAME)
            .map(str::to_string)
            .unwrap_or_else(|| identifier.clone());
        let connected = bool_prop(property::CONNECTED);
        let paired = bool_prop(property::PAIRED);

        let reported = props
            .and_then(|p| p.get(property::SIGNAL))
            .and_then(PropertyValue::as_int)
            .map(|n| n.clamp(0, 100) as u8);
        let (signal_strength, signal_source) =
            signal_or_estimate(reported, connected, paired, estimates);

        DeviceRecord {
            subsystem: Subsystem::Bluetooth,
            identifier,
            display_name,
            signal_strength,
            signal_source,
            connected,
            secured_or_paired: paired,
        }
    }
}

#[async_trait]
impl Catalog for BluetoothCatalog {
    async fn scan(
        &self,
        gateway: &dyn Gateway,
        estimates: &SignalEstimates,
    ) -> Result<Vec<DeviceRecord>> {
        let adapters = list_adapters(gateway, &self.root).await?;
        let mut records = Vec::new();

        for adapter in adapters {
            let xml = match gateway.introspect(&adapter).await {
                Ok(xml) => xml,
                Err(e) => {
                    warn!("Skipping adapter {adapter}: {e}");
                    continue;
                }
            };

            for node in child_nodes(&xml) {
                if !node.starts_with(&self.child_prefix) {
                    continue;
                }
                let path = child_path(&adapter, &node);
                let props = match gateway.get_properties(&path).await {
                    Ok(props) => Some(props),
                    Err(e) => {
                        warn!("Failed to read properties of {path}, listing it by address: {e}");
                        None
                    }
                };
                records.push(self.record_from(&node, props.as_ref(), estimates));
            }
        }

        debug!("Found {} Bluetooth device(s)", records.len());
        Ok(dedup_records(records))
    }
}

/// One parsed line of `nmcli -t -f IN-USE,SSID,SIGNAL,SECURITY device wifi list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WifiEntry {
    pub in_use: bool,
    pub ssid: String,
    pub signal: Option<u8>,
    pub secured: bool,
}

impl WifiEntry {
    fn into_record(self, estimates: &SignalEstimates) -> DeviceRecord {
        let (signal_strength, signal_source) =
            signal_or_estimate(self.signal, self.in_use, self.secured, estimates);
        DeviceRecord {
            subsystem: Subsystem::Wifi,
            display_name: self.ssid.clone(),
            identifier: self.ssid,
            signal_strength,
            signal_source,
            connected: self.in_use,
            secured_or_paired: self.secured,
        }
    }
}

/// Parses one terse line. Hidden networks (empty SSID) and lines with too
/// few fields yield `None`.
pub(crate) fn parse_wifi_line(line: &str) -> Option<WifiEntry> {
    let fields = split_terse_fields(line);
    let [in_use, ssid, signal, security] = fields.as_slice() else {
        return None;
    };
    if ssid.is_empty() {
        return None;
    }

    let security = security.trim();
    Some(WifiEntry {
        in_use: in_use.trim() == nmcli::IN_USE,
        ssid: ssid.clone(),
        signal: signal.trim().parse::<u8>().ok().map(|s| s.min(100)),
        secured: !security.is_empty() && security != nmcli::NO_SECURITY,
    })
}

/// Returns the reported signal, or the estimate for the given state.
pub(crate) fn signal_or_estimate(
    reported: Option<u8>,
    connected: bool,
    secured_or_paired: bool,
    estimates: &SignalEstimates,
) -> (u8, SignalSource) {
    match reported {
        Some(s) => (s, SignalSource::Reported),
        None => (
            estimates.estimate(connected, secured_or_paired),
            SignalSource::Estimated,
        ),
    }
}

/// Collapses records sharing an identifier, keeping first-seen order.
fn dedup_records(records: Vec<DeviceRecord>) -> Vec<DeviceRecord> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<DeviceRecord> = Vec::with_capacity(records.len());

    for record in records {
        match index.get(&record.identifier) {
            Some(&i) => out[i].merge(&record),
            None => {
                index.insert(record.identifier.clone(), out.len());
                out.push(record);
            }
        }
    }
    out
}
