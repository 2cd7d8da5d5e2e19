use async_trait::async_trait;

use super::{Gateway, PropertyMap, ResolvedTarget};
use crate::{PanelError, Result};

/// Stand-in for a backing service that could not be reached at startup.
///
/// Every call fails with [`PanelError::GatewayUnavailable`], so scans of
/// its subsystem deliver empty lists and its operations end as failed
/// instead of taking the whole panel down.
#[derive(Debug, Clone)]
pub struct UnavailableGateway {
    reason: String,
}

impl UnavailableGateway {
    /// Creates a gateway that reports `reason` on every call.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> Result<T> {
        Err(PanelError::GatewayUnavailable(self.reason.clone()))
    }
}

#[async_trait]
impl Gateway for UnavailableGateway {
    async fn list_networks(&self) -> Result<Vec<String>> {
        self.fail()
    }

    async fn introspect(&self, _path: &str) -> Result<String> {
        self.fail()
    }

    async fn get_properties(&self, _path: &str) -> Result<PropertyMap> {
        self.fail()
    }

    async fn connect(&self, _target: &ResolvedTarget, _credential: Option<&str>) -> Result<()> {
        self.fail()
    }

    async fn disconnect(&self, _target: &ResolvedTarget) -> Result<()> {
        self.fail()
    }

    async fn remove_association(&self, _target: &ResolvedTarget) -> Result<()> {
        self.fail()
    }

    async fn remove_by_name(&self, _name: &str) -> Result<()> {
        self.fail()
    }

    async fn set_radio_enabled(&self, _enabled: bool) -> Result<()> {
        self.fail()
    }

    async fn radio_enabled(&self) -> Result<bool> {
        self.fail()
    }
}
