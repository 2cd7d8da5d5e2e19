//! Bluetooth gateway backed by BlueZ on the system bus.

use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashMap;
use zbus::Connection;
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

use crate::dbus::{BluezAdapterProxy, BluezDeviceProxy};
use crate::gateway::{Gateway, PropertyMap, PropertyValue, ResolvedTarget};
use crate::types::constants::{bluez, nm_settings, property};
use crate::util::introspect::{child_nodes, child_path, parent_path};
use crate::util::utils::{bus_proxy, percent_from_dbm};
use crate::{PanelError, Result};

/// Talks to BlueZ over D-Bus.
///
/// Devices are addressed by object path (`/org/bluez/hci0/dev_XX_XX_...`).
/// Saved NetworkManager profiles for Bluetooth devices (PAN/DUN) can be
/// deleted by name through [`Gateway::remove_by_name`].
///
/// `BluezGateway` is `Clone`; clones share the same D-Bus connection.
#[derive(Debug, Clone)]
pub struct BluezGateway {
    conn: Connection,
    root: String,
}

impl BluezGateway {
    /// Creates a gateway on an existing connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            root: bluez::ROOT.to_string(),
        }
    }

    /// Creates a gateway connected to the system D-Bus.
    pub async fn system() -> Result<Self> {
        let conn = Connection::system()
            .await
            .map_err(|e| PanelError::GatewayUnavailable(format!("system bus: {e}")))?;
        Ok(Self::new(conn))
    }

    /// Overrides the object path under which adapters are enumerated.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    /// The underlying D-Bus connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    async fn adapters(&self) -> Result<Vec<String>> {
        let xml = self.introspect(&self.root).await?;
        Ok(child_nodes(&xml)
            .iter()
            .map(|name| child_path(&self.root, name))
            .collect())
    }

    async fn device(&self, path: &str) -> Result<BluezDeviceProxy<'_>> {
        Ok(BluezDeviceProxy::builder(&self.conn)
            .path(path.to_string())?
            .build()
            .await?)
    }

    async fn adapter(&self, path: &str) -> Result<BluezAdapterProxy<'_>> {
        Ok(BluezAdapterProxy::builder(&self.conn)
            .path(path.to_string())?
            .build()
            .await?)
    }
}

#[async_trait]
impl Gateway for BluezGateway {
    async fn introspect(&self, path: &str) -> Result<String> {
        let proxy = bus_proxy(
            &self.conn,
            bluez::SERVICE,
            path,
            "org.freedesktop.DBus.Introspectable",
        )
        .await?;
        let reply = proxy.call_method("Introspect", &()).await?;
        Ok(reply.body().deserialize::<String>()?)
    }

    async fn get_properties(&self, path: &str) -> Result<PropertyMap> {
        let proxy = bus_proxy(
            &self.conn,
            bluez::SERVICE,
            path,
            "org.freedesktop.DBus.Properties",
        )
        .await?;
        let reply = proxy
            .call_method("GetAll", &(bluez::DEVICE_INTERFACE,))
            .await?;
        let raw: HashMap<String, OwnedValue> = reply.body().deserialize()?;
        Ok(normalize_device_properties(&raw))
    }

    async fn connect(&self, target: &ResolvedTarget, credential: Option<&str>) -> Result<()> {
        if credential.is_some() {
            debug!("Ignoring credential for Bluetooth target; pairing goes through the agent");
        }

        let dev = self.device(&target.path).await?;
        if !dev.paired().await? {
            debug!("Device {} is not paired, pairing first", target.path);
            dev.pair().await?;
            if let Err(e) = dev.set_trusted(true).await {
                warn!("Failed to mark {} as trusted: {e}", target.path);
            }
        }

        dev.connect().await?;
        info!("Connected Bluetooth device {}", target.path);
        Ok(())
    }

    async fn disconnect(&self, target: &ResolvedTarget) -> Result<()> {
        self.device(&target.path).await?.disconnect().await?;
        debug!("Disconnected Bluetooth device {}", target.path);
        Ok(())
    }

    async fn remove_association(&self, target: &ResolvedTarget) -> Result<()> {
        let adapter_path = match &target.adapter {
            Some(adapter) => adapter.clone(),
            None => parent_path(&target.path)
                .ok_or_else(|| PanelError::ResolutionFailed(target.path.clone()))?
                .to_string(),
        };

        let adapter = self.adapter(&adapter_path).await?;
        let device = ObjectPath::try_from(target.path.as_str())?;
        adapter.remove_device(&device).await?;
        info!("Removed {} from {adapter_path}", target.path);
        Ok(())
    }

    async fn remove_by_name(&self, name: &str) -> Result<()> {
        let settings = bus_proxy(
            &self.conn,
            nm_settings::SERVICE,
            nm_settings::PATH,
            nm_settings::INTERFACE,
        )
        .await
        .map_err(|e| PanelError::GatewayUnavailable(format!("NetworkManager settings: {e}")))?;

        let list_reply = settings.call_method("ListConnections", &()).await?;
        let conns: Vec<OwnedObjectPath> = list_reply.body().deserialize()?;

        let mut deleted_count = 0;
        for cpath in conns {
            let cproxy = bus_proxy(
                &self.conn,
                nm_settings::SERVICE,
                cpath.clone(),
                nm_settings::CONNECTION_INTERFACE,
            )
            .await?;

            let Ok(msg) = cproxy.call_method("GetSettings", &()).await else {
                continue;
            };
            let settings_map: HashMap<String, HashMap<String, OwnedValue>> =
                msg.body().deserialize()?;

            if !profile_matches(&settings_map, name) {
                continue;
            }

            match cproxy.call_method("Delete", &()).await {
                Ok(_) => {
                    deleted_count += 1;
                    debug!("Deleted saved profile: {}", cpath.as_str());
                }
                Err(e) => warn!("Failed to delete saved profile {}: {e}", cpath.as_str()),
            }
        }

        if deleted_count > 0 {
            info!("Deleted {deleted_count} saved profile(s) for '{name}'");
            Ok(())
        } else {
            Err(PanelError::ActionRejected(format!(
                "no saved profile named '{name}'"
            )))
        }
    }

    async fn set_radio_enabled(&self, enabled: bool) -> Result<()> {
        let adapters = self.adapters().await?;
        if adapters.is_empty() {
            return Err(PanelError::GatewayUnavailable(
                "no Bluetooth adapter found".into(),
            ));
        }

        for path in adapters {
            self.adapter(&path).await?.set_powered(enabled).await?;
            debug!("Set Powered={enabled} on {path}");
        }
        Ok(())
    }

    async fn radio_enabled(&self) -> Result<bool> {
        let adapters = self.adapters().await?;
        if adapters.is_empty() {
            return Err(PanelError::GatewayUnavailable(
                "no Bluetooth adapter found".into(),
            ));
        }

        for path in adapters {
            if self.adapter(&path).await?.powered().await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Translates `org.bluez.Device1` properties to the normalized keys.
///
/// The alias is preferred over the raw name since it is what the user set.
/// RSSI is only present while the device is in range during discovery.
fn normalize_device_properties(raw: &HashMap<String, OwnedValue>) -> PropertyMap {
    let mut props = PropertyMap::new();
    let get = |key: &str| raw.get(key).map(|v| &**v);

    if let Some(Value::Str(s)) = get("Address") {
        props.insert(property::ADDRESS.into(), PropertyValue::Str(s.as_str().into()));
    }
    if let Some(Value::Str(s)) = get("Alias").or_else(|| get("Name")) {
        props.insert(property::NAME.into(), PropertyValue::Str(s.as_str().into()));
    }
    if let Some(Value::Bool(b)) = get("Paired") {
        props.insert(property::PAIRED.into(), PropertyValue::Bool(*b));
    }
    if let Some(Value::Bool(b)) = get("Connected") {
        props.insert(property::CONNECTED.into(), PropertyValue::Bool(*b));
    }
    if let Some(Value::I16(dbm)) = get("RSSI") {
        let percent = percent_from_dbm(i64::from(*dbm));
        props.insert(property::SIGNAL.into(), PropertyValue::Int(i64::from(percent)));
    }
    props
}

/// Whether a saved NetworkManager profile belongs to `name`.
///
/// Matches the connection ID for any profile type and the `bdaddr` of
/// Bluetooth profiles.
fn profile_matches(settings: &HashMap<String, HashMap<String, OwnedValue>>, name: &str) -> bool {
    let field = |section: &str, key: &str| {
        settings
            .get(section)
            .and_then(|s| s.get(key))
            .map(|v| &**v)
    };

    if let Some(Value::Str(id)) = field("connection", "id") {
        if id.as_str() == name {
            debug!("Found saved profile by ID: {id}");
            return true;
        }
    }
    if let Some(Value::Str(bdaddr)) = field("bluetooth", "bdaddr") {
        if bdaddr.as_str().eq_ignore_ascii_case(name) {
            debug!("Found saved profile by bdaddr");
            return true;
        }
    }
    false
}
