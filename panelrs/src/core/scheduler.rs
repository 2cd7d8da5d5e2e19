//! Background execution of scans and operations.
//!
//! Every scan, radio query and operation runs as its own task on a tokio
//! runtime. Tasks write into the [`StateCache`] and report through the
//! delivery channel; they never call consumer code.

use log::{debug, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::api::config::{PanelConfig, SignalEstimates};
use crate::api::models::{DeviceRecord, OperationId, OperationRequest, Subsystem};
use crate::core::catalog::{BluetoothCatalog, Catalog, WifiCatalog};
use crate::core::delivery::{Delivery, DeliverySender};
use crate::core::executor::{execute, ExecContext};
use crate::core::resolver::{BusTreeResolver, Resolver, VisibleNetworkResolver};
use crate::core::state_cache::StateCache;
use crate::core::tokens::{InFlight, TokenRegistry};
use crate::gateway::Gateway;
use crate::types::constants::bluez;
use crate::{PanelError, Result};

/// The gateway, resolver and catalog serving one subsystem.
pub struct Backend {
    pub(crate) subsystem: Subsystem,
    pub(crate) gateway: Arc<dyn Gateway>,
    pub(crate) resolver: Box<dyn Resolver>,
    pub(crate) catalog: Box<dyn Catalog>,
}

impl Backend {
    /// Assembles a backend from its parts.
    pub fn new(
        subsystem: Subsystem,
        gateway: Arc<dyn Gateway>,
        resolver: impl Resolver + 'static,
        catalog: impl Catalog + 'static,
    ) -> Self {
        Self {
            subsystem,
            gateway,
            resolver: Box::new(resolver),
            catalog: Box::new(catalog),
        }
    }

    /// Wi-Fi: networks resolve by visibility and are listed from tool output.
    pub fn wifi(gateway: Arc<dyn Gateway>) -> Self {
        Self::new(
            Subsystem::Wifi,
            gateway,
            VisibleNetworkResolver,
            WifiCatalog,
        )
    }

    /// Bluetooth: devices are found by walking the object tree under `root`.
    pub fn bluetooth(gateway: Arc<dyn Gateway>, root: &str) -> Self {
        Self::new(
            Subsystem::Bluetooth,
            gateway,
            BusTreeResolver::new(root, bluez::DEVICE_PREFIX),
            BluetoothCatalog::new(root),
        )
    }

    /// The subsystem this backend serves.
    pub fn subsystem(&self) -> Subsystem {
        self.subsystem
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("subsystem", &self.subsystem)
            .finish_non_exhaustive()
    }
}

struct Shared {
    backends: HashMap<Subsystem, Backend>,
    cache: StateCache,
    tokens: TokenRegistry,
    deliveries: DeliverySender,
    estimates: SignalEstimates,
    next_id: AtomicU64,
}

impl Shared {
    async fn scan(&self, subsystem: Subsystem) {
        let Some(backend) = self.backends.get(&subsystem) else {
            return;
        };

        let devices = if !self.cache.radio_enabled(subsystem) {
            debug!("{subsystem} radio is off, skipping scan");
            Vec::new()
        } else {
            match backend
                .catalog
                .scan(backend.gateway.as_ref(), &self.estimates)
                .await
            {
                Ok(devices) => devices,
                Err(e) => {
                    warn!("{subsystem} scan failed: {e}");
                    Vec::new()
                }
            }
        };

        self.cache.store_devices(subsystem, devices, &self.deliveries);
    }

    async fn refresh_radio(&self, subsystem: Subsystem) {
        let Some(backend) = self.backends.get(&subsystem) else {
            return;
        };

        match backend.gateway.radio_enabled().await {
            Ok(enabled) => {
                self.cache
                    .set_radio_enabled(subsystem, enabled, &self.deliveries)
            }
            Err(e) => warn!("Failed to read {subsystem} radio state: {e}"),
        }
    }
}

/// Spawns background work and owns the sending side of the delivery channel.
///
/// `Scheduler` is `Clone`; clones share the same cache, tokens and channel.
/// Scheduling never blocks and can be done from non-async code as long as a
/// runtime [`Handle`] was supplied.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
    handle: Handle,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("subsystems", &self.subsystems())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Creates a scheduler over `backends`, returning the receiving end of
    /// the delivery channel.
    ///
    /// Backends for subsystems not listed in `config.subsystems` are ignored.
    pub fn new(
        handle: Handle,
        config: &PanelConfig,
        backends: impl IntoIterator<Item = Backend>,
    ) -> (Self, UnboundedReceiver<Delivery>) {
        let (deliveries, rx) = DeliverySender::channel();
        let backends = backends
            .into_iter()
            .filter(|b| config.manages(b.subsystem))
            .map(|b| (b.subsystem, b))
            .collect();

        let shared = Shared {
            backends,
            cache: StateCache::default(),
            tokens: TokenRegistry::default(),
            deliveries,
            estimates: config.estimates,
            next_id: AtomicU64::new(1),
        };

        (
            Self {
                shared: Arc::new(shared),
                handle,
            },
            rx,
        )
    }

    fn check(&self, subsystem: Subsystem) -> Result<()> {
        if self.shared.backends.contains_key(&subsystem) {
            Ok(())
        } else {
            Err(PanelError::UnknownSubsystem(subsystem))
        }
    }

    /// Rescans `subsystem` in the background. The result arrives as
    /// [`Delivery::DevicesUpdated`], an empty list when the scan failed or
    /// the radio is off.
    pub fn schedule_scan(&self, subsystem: Subsystem) -> Result<()> {
        self.check(subsystem)?;
        let shared = Arc::clone(&self.shared);
        self.handle.spawn(async move { shared.scan(subsystem).await });
        Ok(())
    }

    /// Queries the radio state of `subsystem`, then rescans it.
    pub fn schedule_radio_refresh(&self, subsystem: Subsystem) -> Result<()> {
        self.check(subsystem)?;
        let shared = Arc::clone(&self.shared);
        self.handle.spawn(async move {
            shared.refresh_radio(subsystem).await;
            shared.scan(subsystem).await;
        });
        Ok(())
    }

    /// Runs `request` in the background.
    ///
    /// Fails synchronously with [`PanelError::Busy`] when an operation of
    /// the same kind is already in flight for the same target, and with
    /// [`PanelError::UnknownSubsystem`] when no backend serves it. Otherwise
    /// exactly one [`Delivery::OperationComplete`] carrying the returned id
    /// follows.
    pub fn schedule_operation(&self, request: OperationRequest) -> Result<OperationId> {
        self.check(request.subsystem)?;
        let request = request.canonicalized();
        let token = self.shared.tokens.acquire(&request)?;
        let id = OperationId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(
            "Scheduled {id}: {} {} '{}'",
            request.kind, request.subsystem, request.identifier
        );

        let shared = Arc::clone(&self.shared);
        let handle = self.handle.clone();
        self.handle.spawn(async move {
            let subsystem = request.subsystem;
            let Some(backend) = shared.backends.get(&subsystem) else {
                return;
            };

            let ctx = ExecContext {
                backend,
                cache: &shared.cache,
                deliveries: &shared.deliveries,
                token: &token,
            };
            let execution = execute(&ctx, &request).await;

            token.advance(execution.outcome.phase());
            drop(token);

            debug!("{id} finished: {}", execution.outcome);
            shared.deliveries.send(Delivery::OperationComplete {
                id,
                outcome: execution.outcome,
            });

            if execution.refresh {
                let shared = Arc::clone(&shared);
                handle.spawn(async move { shared.scan(subsystem).await });
            }
        });

        Ok(id)
    }

    /// Copy of the last delivered list for `subsystem`.
    pub fn devices(&self, subsystem: Subsystem) -> Vec<DeviceRecord> {
        self.shared.cache.devices(subsystem)
    }

    /// The cached radio flag for `subsystem`.
    pub fn radio_enabled(&self, subsystem: Subsystem) -> bool {
        self.shared.cache.radio_enabled(subsystem)
    }

    /// Operations currently holding a token, with their phase.
    pub fn in_flight(&self) -> Vec<InFlight> {
        self.shared.tokens.snapshot()
    }

    /// The subsystems this scheduler has backends for, in stable order.
    pub fn subsystems(&self) -> Vec<Subsystem> {
        let mut subsystems: Vec<_> = self.shared.backends.keys().copied().collect();
        subsystems.sort();
        subsystems
    }
}
