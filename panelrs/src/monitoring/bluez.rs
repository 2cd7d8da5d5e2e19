//! Rescanning Bluetooth when BlueZ objects appear or disappear.
//!
//! BlueZ exports an `org.freedesktop.DBus.ObjectManager` at `/` and emits
//! `InterfacesAdded`/`InterfacesRemoved` whenever a device is discovered,
//! removed, or an adapter comes and goes. Bursts of these (a discovery
//! session can produce dozens per second) are collapsed into one rescan
//! per debounce window.

use futures::stream::{self, Stream, StreamExt};
use futures::{select, FutureExt};
use futures_timer::Delay;
use log::{debug, warn};
use std::pin::{pin, Pin};
use std::time::Duration;
use tokio::sync::watch;
use zbus::fdo::ObjectManagerProxy;
use zbus::Connection;

use crate::api::models::Subsystem;
use crate::core::scheduler::Scheduler;
use crate::types::constants::bluez;
use crate::{PanelError, Result};

/// Watches BlueZ until `shutdown` fires, scheduling a Bluetooth scan after
/// each burst of object changes.
///
/// Returns `Ok(())` on shutdown and an error if the subscription cannot be
/// set up or the signal stream ends.
pub(crate) async fn watch_bluetooth_changes(
    conn: &Connection,
    scheduler: Scheduler,
    debounce: Duration,
    mut shutdown: watch::Receiver<()>,
) -> Result<()> {
    let manager = ObjectManagerProxy::builder(conn)
        .destination(bluez::SERVICE)?
        .path("/")?
        .build()
        .await?;

    // Subscribe before the first scan can race with a change.
    let added = manager.receive_interfaces_added().await?;
    let removed = manager.receive_interfaces_removed().await?;

    let streams: Vec<Pin<Box<dyn Stream<Item = ()> + Send>>> = vec![
        Box::pin(added.map(|_| ())),
        Box::pin(removed.map(|_| ())),
    ];
    let mut merged = stream::select_all(streams);
    debug!("Watching BlueZ object changes");

    let mut stop = pin!(shutdown.changed().fuse());

    loop {
        select! {
            _ = stop => {
                debug!("Bluetooth watcher shutting down");
                return Ok(());
            }
            signal = merged.next() => {
                if signal.is_none() {
                    warn!("BlueZ signal stream ended");
                    return Err(PanelError::GatewayUnavailable(
                        "BlueZ signal stream ended".into(),
                    ));
                }
            }
        }

        let mut quiet = pin!(Delay::new(debounce).fuse());
        select! {
            _ = stop => {
                debug!("Bluetooth watcher shutting down");
                return Ok(());
            }
            _ = quiet => {}
        }

        let mut coalesced = 1;
        while let Some(Some(())) = merged.next().now_or_never() {
            coalesced += 1;
        }
        debug!("{coalesced} BlueZ change(s), rescanning");

        scheduler.schedule_scan(Subsystem::Bluetooth)?;
    }
}
