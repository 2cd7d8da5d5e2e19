use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use zbus::Connection;

use crate::api::config::PanelConfig;
use crate::api::models::{DeviceRecord, OperationId, OperationRequest, Outcome, Subsystem};
use crate::core::delivery::Delivery;
use crate::core::scheduler::{Backend, Scheduler};
use crate::gateway::{BluezGateway, NmcliGateway, UnavailableGateway};
use crate::monitoring::bluez as bluez_monitor;
use crate::{PanelError, Result};

type DevicesCallback = Box<dyn FnMut(Subsystem, &[DeviceRecord])>;
type RadioCallback = Box<dyn FnMut(Subsystem, bool)>;
type OutcomeCallback = Box<dyn FnMut(&Outcome)>;
type DoneCallback = Box<dyn FnOnce(&Outcome)>;

/// Consumer-side entry point.
///
/// A `DevicePanel` lives on the consumer's thread. It schedules work on a
/// tokio runtime and invokes the registered callbacks only from
/// [`dispatch_pending`](Self::dispatch_pending) or
/// [`dispatch_next`](Self::dispatch_next), so callbacks never run
/// concurrently with the consumer's own code and may capture non-`Send`
/// state.
///
/// # Examples
///
/// ```no_run
/// use panelrs::{DevicePanel, OperationRequest, PanelConfig, Subsystem};
///
/// # async fn example() -> panelrs::Result<()> {
/// let mut panel = DevicePanel::system(PanelConfig::default()).await?;
///
/// panel.on_devices_updated(|subsystem, devices| {
///     println!("{subsystem}: {} device(s)", devices.len());
/// });
///
/// panel.schedule_operation_with(
///     OperationRequest::connect(Subsystem::Wifi, "HomeNet").with_credentials("hunter22"),
///     |outcome| println!("{outcome}"),
/// )?;
///
/// loop {
///     panel.dispatch_next().await;
/// }
/// # }
/// ```
///
/// # Thread Safety
///
/// `DevicePanel` is neither `Send` nor `Sync`. Use [`scheduler`](Self::scheduler)
/// to obtain a `Clone + Send` handle for scheduling from other threads.
pub struct DevicePanel {
    scheduler: Scheduler,
    handle: Handle,
    rx: UnboundedReceiver<Delivery>,
    bus: Option<Connection>,
    watch_debounce: Duration,
    on_devices: Option<DevicesCallback>,
    on_radio: Option<RadioCallback>,
    on_complete: Option<OutcomeCallback>,
    pending: HashMap<OperationId, DoneCallback>,
}

impl std::fmt::Debug for DevicePanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevicePanel")
            .field("scheduler", &self.scheduler)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl DevicePanel {
    /// Creates a panel over explicit backends.
    ///
    /// Nothing is scheduled until the caller asks for it.
    pub fn new(
        handle: Handle,
        config: &PanelConfig,
        backends: impl IntoIterator<Item = Backend>,
    ) -> Self {
        let (scheduler, rx) = Scheduler::new(handle.clone(), config, backends);
        Self {
            scheduler,
            handle,
            rx,
            bus: None,
            watch_debounce: config.watch_debounce,
            on_devices: None,
            on_radio: None,
            on_complete: None,
            pending: HashMap::new(),
        }
    }

    /// Creates a panel driving the system's BlueZ and `nmcli`, then queues a
    /// radio-state query and initial scan for every configured subsystem.
    ///
    /// A missing system bus does not fail construction: Bluetooth is then
    /// served by an [`UnavailableGateway`], its scans deliver empty lists and
    /// its operations fail, while Wi-Fi keeps working.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn system(config: PanelConfig) -> Result<Self> {
        let mut backends = Vec::new();
        let mut bus = None;

        for subsystem in &config.subsystems {
            match subsystem {
                Subsystem::Wifi => {
                    backends.push(Backend::wifi(Arc::new(NmcliGateway::new(&config))));
                }
                Subsystem::Bluetooth => match BluezGateway::system().await {
                    Ok(gateway) => {
                        let gateway = gateway.with_root(&config.bluez_root);
                        bus = Some(gateway.connection().clone());
                        backends.push(Backend::bluetooth(Arc::new(gateway), &config.bluez_root));
                    }
                    Err(e) => {
                        warn!("Bluetooth unavailable: {e}");
                        let gateway = UnavailableGateway::new(e.to_string());
                        backends.push(Backend::bluetooth(Arc::new(gateway), &config.bluez_root));
                    }
                },
            }
        }

        let mut panel = Self::new(Handle::current(), &config, backends);
        panel.bus = bus;

        for subsystem in panel.scheduler.subsystems() {
            panel.scheduler.schedule_radio_refresh(subsystem)?;
        }
        Ok(panel)
    }

    /// A cloneable handle for scheduling work without going through the panel.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Registers the device-list callback, replacing any previous one, and
    /// immediately invokes it with the cached list of every subsystem.
    pub fn on_devices_updated<F>(&mut self, callback: F)
    where
        F: FnMut(Subsystem, &[DeviceRecord]) + 'static,
    {
        let mut callback: DevicesCallback = Box::new(callback);
        for subsystem in self.scheduler.subsystems() {
            callback(subsystem, &self.scheduler.devices(subsystem));
        }
        self.on_devices = Some(callback);
    }

    /// Registers the radio-state callback, replacing any previous one, and
    /// immediately invokes it with the cached flag of every subsystem.
    pub fn on_radio_state_changed<F>(&mut self, callback: F)
    where
        F: FnMut(Subsystem, bool) + 'static,
    {
        let mut callback: RadioCallback = Box::new(callback);
        for subsystem in self.scheduler.subsystems() {
            callback(subsystem, self.scheduler.radio_enabled(subsystem));
        }
        self.on_radio = Some(callback);
    }

    /// Registers the callback invoked for every completed operation,
    /// replacing any previous one.
    pub fn on_operation_complete<F>(&mut self, callback: F)
    where
        F: FnMut(&Outcome) + 'static,
    {
        self.on_complete = Some(Box::new(callback));
    }

    /// Rescans `subsystem` in the background.
    pub fn schedule_scan(&mut self, subsystem: Subsystem) -> Result<()> {
        self.scheduler.schedule_scan(subsystem)
    }

    /// Runs `request` in the background. See [`Scheduler::schedule_operation`].
    pub fn schedule_operation(&mut self, request: OperationRequest) -> Result<OperationId> {
        self.scheduler.schedule_operation(request)
    }

    /// Runs `request` in the background and invokes `on_done` once with its
    /// outcome, after the general completion callback.
    pub fn schedule_operation_with<F>(
        &mut self,
        request: OperationRequest,
        on_done: F,
    ) -> Result<OperationId>
    where
        F: FnOnce(&Outcome) + 'static,
    {
        let id = self.scheduler.schedule_operation(request)?;
        self.pending.insert(id, Box::new(on_done));
        Ok(id)
    }

    /// Copy of the last delivered list for `subsystem`.
    pub fn devices(&self, subsystem: Subsystem) -> Vec<DeviceRecord> {
        self.scheduler.devices(subsystem)
    }

    /// The cached radio flag for `subsystem`.
    pub fn radio_enabled(&self, subsystem: Subsystem) -> bool {
        self.scheduler.radio_enabled(subsystem)
    }

    /// Invokes callbacks for every delivery already queued, without waiting.
    ///
    /// Returns the number of deliveries handled. Suited to a UI loop tick.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(delivery) = self.rx.try_recv() {
            self.dispatch(delivery);
            handled += 1;
        }
        handled
    }

    /// Waits for the next delivery and invokes its callbacks.
    ///
    /// Returns `false` once no more deliveries can arrive.
    pub async fn dispatch_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(delivery) => {
                self.dispatch(delivery);
                true
            }
            None => false,
        }
    }

    fn dispatch(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::DevicesUpdated { subsystem, devices } => {
                debug!("{subsystem}: {} device(s) delivered", devices.len());
                if let Some(cb) = self.on_devices.as_mut() {
                    cb(subsystem, &devices);
                }
            }
            Delivery::RadioStateChanged { subsystem, enabled } => {
                if let Some(cb) = self.on_radio.as_mut() {
                    cb(subsystem, enabled);
                }
            }
            Delivery::OperationComplete { id, outcome } => {
                if let Some(cb) = self.on_complete.as_mut() {
                    cb(&outcome);
                }
                if let Some(on_done) = self.pending.remove(&id) {
                    on_done(&outcome);
                }
            }
        }
    }

    /// Starts rescanning Bluetooth whenever BlueZ adds or removes objects.
    ///
    /// The watcher stops when `shutdown` receives a value or its sender is
    /// dropped. Only available on panels created with [`system`](Self::system).
    pub fn spawn_bluetooth_watcher(
        &self,
        shutdown: watch::Receiver<()>,
    ) -> Result<JoinHandle<()>> {
        let conn = self.bus.clone().ok_or_else(|| {
            PanelError::GatewayUnavailable("no system bus connection for Bluetooth".into())
        })?;
        let scheduler = self.scheduler.clone();
        let debounce = self.watch_debounce;

        Ok(self.handle.spawn(async move {
            if let Err(e) =
                bluez_monitor::watch_bluetooth_changes(&conn, scheduler, debounce, shutdown).await
            {
                warn!("Bluetooth watcher stopped: {e}");
            }
        }))
    }
}
