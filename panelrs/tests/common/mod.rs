//! Scripted in-memory gateway shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;

use panelrs::{
    Backend, Delivery, DeviceRecord, Gateway, OperationId, Outcome, PanelConfig, PanelError,
    PropertyMap, PropertyValue, ResolvedTarget, Result, Scheduler, Subsystem,
};

pub const ROOT: &str = "/org/bluez";

/// One device or network known to the fake.
#[derive(Debug, Clone)]
pub struct FakeDevice {
    pub id: String,
    pub name: Option<String>,
    pub adapter: String,
    pub signal: Option<u8>,
    pub secured: bool,
    pub saved: bool,
    pub connected: bool,
    pub visible: bool,
}

impl FakeDevice {
    pub fn new(adapter: &str, id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            adapter: adapter.to_string(),
            signal: None,
            secured: false,
            saved: false,
            connected: false,
            visible: true,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn signal(mut self, signal: u8) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn secured(mut self) -> Self {
        self.secured = true;
        self
    }

    pub fn saved(mut self) -> Self {
        self.saved = true;
        self
    }

    /// Known to the backing service but not currently in range.
    pub fn out_of_range(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn connected(mut self) -> Self {
        self.saved = true;
        self.connected = true;
        self
    }
}

#[derive(Debug, Default)]
struct FakeState {
    adapters: Vec<String>,
    devices: Vec<FakeDevice>,
    failing_properties: HashSet<String>,
    unreachable: bool,
    radio: bool,
    fail_radio: bool,
}

/// A gateway whose behavior is scripted by the test and which records every
/// call it receives.
#[derive(Debug)]
pub struct FakeGateway {
    state: Mutex<FakeState>,
    calls: Mutex<Vec<String>>,
    connect_gate: Option<Arc<Notify>>,
}

fn escape(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn node_xml(children: &[String]) -> String {
    let mut xml = String::from(
        "<!DOCTYPE node PUBLIC \"-//freedesktop//DTD D-BUS Object Introspection 1.0//EN\"\n\
         \"http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd\">\n<node>\n\
         <interface name=\"org.freedesktop.DBus.Introspectable\">\n\
         <method name=\"Introspect\"><arg name=\"xml\" type=\"s\" direction=\"out\"/></method>\n\
         </interface>\n",
    );
    for child in children {
        xml.push_str(&format!("  <node name=\"{child}\"/>\n"));
    }
    xml.push_str("</node>\n");
    xml
}

impl FakeGateway {
    /// A gateway with the given adapters (by node name, e.g. `hci0`).
    pub fn new(adapters: &[&str]) -> Self {
        Self {
            state: Mutex::new(FakeState {
                adapters: adapters.iter().map(|a| a.to_string()).collect(),
                radio: true,
                ..Default::default()
            }),
            calls: Mutex::new(Vec::new()),
            connect_gate: None,
        }
    }

    /// Makes every `connect` wait until `gate` is notified.
    pub fn with_connect_gate(mut self, gate: Arc<Notify>) -> Self {
        self.connect_gate = Some(gate);
        self
    }

    pub fn with_device(self, device: FakeDevice) -> Self {
        self.state.lock().unwrap().devices.push(device);
        self
    }

    pub fn fail_properties_of(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_properties
            .insert(id.to_string());
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    pub fn set_radio(&self, on: bool) {
        self.state.lock().unwrap().radio = on;
    }

    pub fn fail_radio(&self) {
        self.state.lock().unwrap().fail_radio = true;
    }

    pub fn device(&self, id: &str) -> Option<FakeDevice> {
        self.state
            .lock()
            .unwrap()
            .devices
            .iter()
            .find(|d| d.id == id)
            .cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.split(' ').next() == Some(method))
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_reachable(&self) -> Result<()> {
        if self.state.lock().unwrap().unreachable {
            Err(PanelError::GatewayUnavailable("fake bus is down".into()))
        } else {
            Ok(())
        }
    }

    /// Finds the device a target path refers to: a BlueZ-style object path
    /// or a bare network name.
    fn index_for(&self, state: &FakeState, path: &str) -> Option<usize> {
        let leaf = path.rsplit('/').next().unwrap_or(path);
        state.devices.iter().position(|d| {
            d.id == path || format!("dev_{}", escape(&d.id)).eq_ignore_ascii_case(leaf)
        })
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn list_networks(&self) -> Result<Vec<String>> {
        self.record("list_networks".into());
        self.check_reachable()?;

        let state = self.state.lock().unwrap();
        Ok(state
            .devices
            .iter()
            .filter(|d| d.visible)
            .map(|d| {
                format!(
                    "{}:{}:{}:{}",
                    if d.connected { "*" } else { " " },
                    d.id.replace('\\', "\\\\").replace(':', "\\:"),
                    d.signal.map(|s| s.to_string()).unwrap_or_default(),
                    if d.secured { "WPA2" } else { "--" }
                )
            })
            .collect())
    }

    async fn introspect(&self, path: &str) -> Result<String> {
        self.record(format!("introspect {path}"));
        self.check_reachable()?;

        let state = self.state.lock().unwrap();
        if path == ROOT {
            return Ok(node_xml(&state.adapters));
        }
        let adapter = path
            .strip_prefix(ROOT)
            .and_then(|p| p.strip_prefix('/'))
            .ok_or_else(|| PanelError::ActionRejected(format!("no object {path}")))?;
        if !state.adapters.iter().any(|a| a == adapter) {
            return Err(PanelError::ActionRejected(format!("no object {path}")));
        }

        let children: Vec<String> = state
            .devices
            .iter()
            .filter(|d| d.adapter == adapter)
            .map(|d| format!("dev_{}", escape(&d.id)))
            .collect();
        Ok(node_xml(&children))
    }

    async fn get_properties(&self, path: &str) -> Result<PropertyMap> {
        self.record(format!("get_properties {path}"));
        self.check_reachable()?;

        let state = self.state.lock().unwrap();
        let idx = self
            .index_for(&state, path)
            .ok_or_else(|| PanelError::ActionRejected(format!("no object {path}")))?;
        let dev = &state.devices[idx];
        if state.failing_properties.contains(&dev.id) {
            return Err(PanelError::ActionRejected("property fetch failed".into()));
        }

        let mut props = PropertyMap::new();
        props.insert("address".into(), PropertyValue::Str(dev.id.clone()));
        if let Some(name) = &dev.name {
            props.insert("name".into(), PropertyValue::Str(name.clone()));
        }
        props.insert("paired".into(), PropertyValue::Bool(dev.saved));
        props.insert("connected".into(), PropertyValue::Bool(dev.connected));
        if let Some(signal) = dev.signal {
            props.insert("signal".into(), PropertyValue::Int(i64::from(signal)));
        }
        Ok(props)
    }

    async fn connect(&self, target: &ResolvedTarget, credential: Option<&str>) -> Result<()> {
        self.record(format!(
            "connect {} {}",
            target.path,
            credential.map_or("-", |_| "secret")
        ));
        if let Some(gate) = &self.connect_gate {
            gate.notified().await;
        }
        self.check_reachable()?;

        let mut state = self.state.lock().unwrap();
        let idx = self
            .index_for(&state, &target.path)
            .ok_or_else(|| PanelError::ActionRejected("out of range".into()))?;
        let dev = &mut state.devices[idx];
        if dev.secured && !dev.saved && credential.is_none() {
            return Err(PanelError::ActionRejected("secrets were required".into()));
        }
        dev.saved = true;
        dev.connected = true;
        Ok(())
    }

    async fn disconnect(&self, target: &ResolvedTarget) -> Result<()> {
        self.record(format!("disconnect {}", target.path));
        self.check_reachable()?;

        let mut state = self.state.lock().unwrap();
        let idx = self
            .index_for(&state, &target.path)
            .ok_or_else(|| PanelError::ActionRejected("unknown device".into()))?;
        if !state.devices[idx].connected {
            return Err(PanelError::ActionRejected("not connected".into()));
        }
        state.devices[idx].connected = false;
        Ok(())
    }

    async fn remove_association(&self, target: &ResolvedTarget) -> Result<()> {
        self.record(format!("remove_association {}", target.path));
        self.check_reachable()?;

        let mut state = self.state.lock().unwrap();
        let idx = self
            .index_for(&state, &target.path)
            .ok_or_else(|| PanelError::ActionRejected("unknown device".into()))?;
        let dev = &mut state.devices[idx];
        dev.saved = false;
        dev.connected = false;
        Ok(())
    }

    async fn remove_by_name(&self, name: &str) -> Result<()> {
        self.record(format!("remove_by_name {name}"));
        self.check_reachable()?;

        let mut state = self.state.lock().unwrap();
        let mut removed = false;
        for dev in state.devices.iter_mut() {
            if dev.saved && (dev.name.as_deref() == Some(name) || dev.id == name) {
                dev.saved = false;
                dev.connected = false;
                removed = true;
            }
        }
        if removed {
            Ok(())
        } else {
            Err(PanelError::ActionRejected(format!("no profile '{name}'")))
        }
    }

    async fn set_radio_enabled(&self, enabled: bool) -> Result<()> {
        self.record(format!("set_radio_enabled {enabled}"));
        self.check_reachable()?;

        let mut state = self.state.lock().unwrap();
        if state.fail_radio {
            return Err(PanelError::ActionRejected("rfkill blocked".into()));
        }
        state.radio = enabled;
        Ok(())
    }

    async fn radio_enabled(&self) -> Result<bool> {
        self.record("radio_enabled".into());
        self.check_reachable()?;
        Ok(self.state.lock().unwrap().radio)
    }
}

/// A scheduler with one Bluetooth backend over `gateway`.
pub fn bluetooth_scheduler(
    gateway: &Arc<FakeGateway>,
) -> (Scheduler, UnboundedReceiver<Delivery>) {
    let backend = Backend::bluetooth(gateway.clone(), ROOT);
    Scheduler::new(Handle::current(), &PanelConfig::default(), [backend])
}

/// A scheduler with one Wi-Fi backend over `gateway`.
pub fn wifi_scheduler(gateway: &Arc<FakeGateway>) -> (Scheduler, UnboundedReceiver<Delivery>) {
    let backend = Backend::wifi(gateway.clone());
    Scheduler::new(Handle::current(), &PanelConfig::default(), [backend])
}

/// Waits for the next delivery, failing the test after a few seconds.
pub async fn recv(rx: &mut UnboundedReceiver<Delivery>) -> Delivery {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a delivery")
        .expect("delivery channel closed")
}

/// Skips ahead to the next device list for `subsystem`.
pub async fn next_devices(
    rx: &mut UnboundedReceiver<Delivery>,
    subsystem: Subsystem,
) -> Vec<DeviceRecord> {
    loop {
        if let Delivery::DevicesUpdated {
            subsystem: s,
            devices,
        } = recv(rx).await
        {
            if s == subsystem {
                return devices;
            }
        }
    }
}

/// Skips ahead to the completion of operation `id`.
pub async fn next_outcome(rx: &mut UnboundedReceiver<Delivery>, id: OperationId) -> Outcome {
    loop {
        if let Delivery::OperationComplete { id: got, outcome } = recv(rx).await {
            if got == id {
                return outcome;
            }
        }
    }
}

/// Lets spawned tasks on the current-thread runtime make progress.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
