//! Asynchronous device management for a Wi-Fi and Bluetooth control panel.
//!
//! `panelrs` discovers networks and devices, connects, disconnects and
//! forgets them, and switches radios on and off. All of that work runs in
//! background tasks; results reach the consumer through a single channel
//! that the consumer drains on its own loop, so callbacks never run on a
//! foreign thread.
//!
//! - Wi-Fi is driven through NetworkManager's `nmcli` tool
//! - Bluetooth is driven through BlueZ on the system D-Bus
//!
//! # Example
//!
//! ```no_run
//! use panelrs::{DevicePanel, OperationRequest, PanelConfig, Subsystem};
//!
//! # async fn example() -> panelrs::Result<()> {
//! let mut panel = DevicePanel::system(PanelConfig::default()).await?;
//!
//! panel.on_devices_updated(|subsystem, devices| {
//!     for dev in devices {
//!         println!("[{subsystem}] {dev}");
//!     }
//! });
//! panel.on_operation_complete(|outcome| println!("{outcome}"));
//!
//! panel.schedule_operation(OperationRequest::connect(
//!     Subsystem::Bluetooth,
//!     "00:1A:7D:DA:71:13",
//! ))?;
//!
//! while panel.dispatch_next().await {}
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Scheduling calls return `Result<T, PanelError>`; a second request for a
//! target that already has the same kind of operation in flight is rejected
//! with [`PanelError::Busy`]. Failures inside background work never surface
//! as errors: scans deliver an empty list and operations deliver an
//! [`Outcome`] with `success == false`.
//!
//! # Signal Estimates
//!
//! When the hardware reports no signal, records carry an estimate derived
//! from their state (see [`SignalEstimates`]) and
//! [`DeviceRecord::signal_is_estimated`] returns `true`.
//!
//! # Logging
//!
//! This crate uses the [`log`](https://docs.rs/log) facade for logging. To see
//! log output, add a logging implementation like `env_logger`. For example:
//!
//! ```no_run,ignore
//! env_logger::init();
//! // ...
//! ```

// Internal implementation modules
mod core;
mod dbus;
mod monitoring;
mod types;
mod util;

// Public API modules
pub mod api;
pub mod gateway;

// Re-exported public API
pub use api::config::{PanelConfig, SignalEstimates};
pub use api::models::{
    DeviceRecord, OperationId, OperationKind, OperationPhase, OperationRequest, Outcome,
    PanelError, SignalSource, Subsystem,
};
pub use api::panel::DevicePanel;
pub use crate::core::catalog::{BluetoothCatalog, Catalog, WifiCatalog};
pub use crate::core::delivery::Delivery;
pub use crate::core::resolver::{BusTreeResolver, Resolver, VisibleNetworkResolver};
pub use crate::core::scheduler::{Backend, Scheduler};
pub use crate::core::tokens::InFlight;
pub use gateway::{
    BluezGateway, Gateway, NmcliGateway, PropertyMap, PropertyValue, ResolvedTarget,
    UnavailableGateway,
};

/// A specialized `Result` type for device-management operations.
pub type Result<T> = std::result::Result<T, PanelError>;
