//! Mapping human-facing identifiers to addressable targets.
//!
//! Bluetooth devices live two levels below the BlueZ root
//! (`/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF`), so resolution walks the
//! introspection tree: one call for the root, then one per adapter until a
//! match is found. Wi-Fi networks are addressed by SSID directly and only
//! need to be visible.

use async_trait::async_trait;
use log::debug;

use crate::core::catalog::parse_wifi_line;
use crate::gateway::{Gateway, ResolvedTarget};
use crate::types::constants::bluez;
use crate::util::introspect::{child_nodes, child_path};
use crate::{try_log, Result};

/// Maps an identifier to a target the gateway can act on.
///
/// Resolution never fails loudly: every gateway error is logged and turned
/// into `None`.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves `identifier`, returning `None` when it cannot be found.
    async fn resolve(&self, gateway: &dyn Gateway, identifier: &str) -> Option<ResolvedTarget>;
}

/// Two-level walk over an introspectable object tree.
#[derive(Debug, Clone)]
pub struct BusTreeResolver {
    root: String,
    child_prefix: String,
}

impl Default for BusTreeResolver {
    fn default() -> Self {
        Self::new(bluez::ROOT, bluez::DEVICE_PREFIX)
    }
}

impl BusTreeResolver {
    /// Creates a resolver rooted at `root` whose leaf nodes are named
    /// `child_prefix` followed by the escaped identifier.
    pub fn new(root: impl Into<String>, child_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            child_prefix: child_prefix.into(),
        }
    }

    /// The node name a device with `identifier` is expected to have.
    pub fn node_name(&self, identifier: &str) -> String {
        format!("{}{}", self.child_prefix, escape_address(identifier))
    }
}

#[async_trait]
impl Resolver for BusTreeResolver {
    async fn resolve(&self, gateway: &dyn Gateway, identifier: &str) -> Option<ResolvedTarget> {
        let wanted = self.node_name(identifier);

        let adapters = try_log!(
            list_adapters(gateway, &self.root).await,
            format!("Failed to enumerate adapters under {}", self.root)
        );

        for adapter in adapters {
            let xml = try_log!(
                gateway.introspect(&adapter).await,
                format!("Failed to introspect {adapter}")
            );

            if let Some(child) = child_nodes(&xml)
                .into_iter()
                .find(|c| c.eq_ignore_ascii_case(&wanted))
            {
                let path = child_path(&adapter, &child);
                debug!("Resolved {identifier} to {path}");
                return Some(ResolvedTarget::under(adapter, path));
            }
        }

        debug!("No node named {wanted} under {}", self.root);
        None
    }
}

/// Resolves an SSID when it is currently visible.
#[derive(Debug, Clone, Copy, Default)]
pub struct VisibleNetworkResolver;

#[async_trait]
impl Resolver for VisibleNetworkResolver {
    async fn resolve(&self, gateway: &dyn Gateway, identifier: &str) -> Option<ResolvedTarget> {
        let lines = try_log!(gateway.list_networks().await, "Failed to list networks");

        let visible = lines
            .iter()
            .filter_map(|l| parse_wifi_line(l))
            .any(|entry| entry.ssid == identifier);

        if visible {
            Some(ResolvedTarget::named(identifier))
        } else {
            debug!("Network '{identifier}' is not visible");
            None
        }
    }
}

/// Returns the object paths of the direct children of `root`.
pub(crate) async fn list_adapters(gateway: &dyn Gateway, root: &str) -> Result<Vec<String>> {
    let xml = gateway.introspect(root).await?;
    Ok(child_nodes(&xml)
        .iter()
        .map(|name| child_path(root, name))
        .collect())
}

/// Replaces every character that is not ASCII alphanumeric with `_`,
/// matching how BlueZ names device nodes.
pub(crate) fn escape_address(identifier: &str) -> String {
    identifier
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Recovers a MAC address from a device node name such as
/// `dev_AA_BB_CC_DD_EE_FF`.
pub(crate) fn unescape_address(node: &str, prefix: &str) -> String {
    node.strip_prefix(prefix).unwrap_or(node).replace('_', ":")
}
