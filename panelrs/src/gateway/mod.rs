//! The boundary to the system services that actually touch the radios.
//!
//! A [`Gateway`] wraps one backing service: BlueZ on the system bus for
//! Bluetooth, the `nmcli` tool for Wi-Fi. Every call may take anywhere from
//! a few milliseconds to several seconds, so gateways are only ever driven
//! from background tasks spawned by the [`Scheduler`](crate::Scheduler).

mod bluez;
mod nmcli;
mod unavailable;

pub use bluez::BluezGateway;
pub use nmcli::NmcliGateway;
pub use unavailable::UnavailableGateway;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::{PanelError, Result};

/// A property value fetched from a device object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    /// A string (address, name)
    Str(String),
    /// A flag (paired, connected)
    Bool(bool),
    /// An integer (signal, already scaled to 0-100)
    Int(i64),
}

impl PropertyValue {
    /// Returns the string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the flag value, if this is a flag.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }
}

/// Normalized key/value properties of one device object.
///
/// Gateways translate their native property names to the keys `address`,
/// `name`, `paired`, `connected` and `signal`.
pub type PropertyMap = HashMap<String, PropertyValue>;

/// An addressable handle for one operation.
///
/// Object paths may be invalidated by a rescan on the backing service, so a
/// target is resolved again for every operation and never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Object path of the adapter owning the target, when there is one
    pub adapter: Option<String>,
    /// Object path (Bluetooth) or connection name (Wi-Fi)
    pub path: String,
}

impl ResolvedTarget {
    /// Creates a target living under an adapter.
    pub fn under(adapter: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            adapter: Some(adapter.into()),
            path: path.into(),
        }
    }

    /// Creates a target that is addressed by name alone.
    pub fn named(path: impl Into<String>) -> Self {
        Self {
            adapter: None,
            path: path.into(),
        }
    }
}

/// Blocking calls into an external tool or bus service.
///
/// All methods report plain success or failure; no structured error payload
/// is assumed. Calls a backend cannot serve return
/// [`PanelError::Unsupported`].
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Lists visible networks as raw tool output, one entry per line.
    async fn list_networks(&self) -> Result<Vec<String>> {
        Err(PanelError::Unsupported("list_networks"))
    }

    /// Returns the introspection document of an object.
    async fn introspect(&self, _path: &str) -> Result<String> {
        Err(PanelError::Unsupported("introspect"))
    }

    /// Fetches the normalized properties of a device object.
    async fn get_properties(&self, _path: &str) -> Result<PropertyMap> {
        Err(PanelError::Unsupported("get_properties"))
    }

    /// Brings a link up, optionally with a caller-supplied secret.
    async fn connect(&self, target: &ResolvedTarget, credential: Option<&str>) -> Result<()>;

    /// Takes a link down.
    async fn disconnect(&self, target: &ResolvedTarget) -> Result<()>;

    /// Removes the saved association (pairing or profile) of a target.
    async fn remove_association(&self, target: &ResolvedTarget) -> Result<()>;

    /// Deletes a saved profile by its display name.
    async fn remove_by_name(&self, name: &str) -> Result<()>;

    /// Switches the radio on or off.
    async fn set_radio_enabled(&self, enabled: bool) -> Result<()>;

    /// Returns whether the radio is on.
    async fn radio_enabled(&self) -> Result<bool>;
}
