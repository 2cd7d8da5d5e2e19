//! BlueZ Adapter and Device proxies.
//!
//! These talk directly to BlueZ, the Linux Bluetooth stack. Device and
//! adapter objects are found by walking `/org/bluez` with introspection,
//! see [`BusTreeResolver`](crate::core::resolver::BusTreeResolver).

use zbus::proxy;
use zbus::Result;
use zvariant::ObjectPath;

/// Proxy for a remote Bluetooth device.
///
/// # Example
///
/// ```ignore
/// use zbus::Connection;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let conn = Connection::system().await?;
/// let proxy = BluezDeviceProxy::builder(&conn)
///     .path("/org/bluez/hci0/dev_00_1A_7D_DA_71_13")?
///     .build()
///     .await?;
///
/// if !proxy.paired().await? {
///     proxy.pair().await?;
/// }
/// proxy.connect().await?;
/// # Ok(())
/// # }
/// ```
#[proxy(interface = "org.bluez.Device1", default_service = "org.bluez")]
pub trait BluezDevice {
    /// Connects all auto-connectable profiles of the device.
    fn connect(&self) -> Result<()>;

    /// Disconnects all connected profiles.
    fn disconnect(&self) -> Result<()>;

    /// Pairs with the device. Requires a registered agent for devices
    /// that need a PIN or passkey confirmation.
    fn pair(&self) -> Result<()>;

    /// Whether the device is paired.
    #[zbus(property)]
    fn paired(&self) -> Result<bool>;

    /// Marks the device as trusted so it may reconnect on its own.
    #[zbus(property)]
    fn set_trusted(&self, value: bool) -> Result<()>;
}

/// Proxy for a local Bluetooth adapter (e.g. `/org/bluez/hci0`).
#[proxy(interface = "org.bluez.Adapter1", default_service = "org.bluez")]
pub trait BluezAdapter {
    /// Removes a remote device and its pairing information.
    fn remove_device(&self, device: &ObjectPath<'_>) -> Result<()>;

    /// Whether the adapter radio is on.
    #[zbus(property)]
    fn powered(&self) -> Result<bool>;

    /// Switches the adapter radio on or off.
    #[zbus(property)]
    fn set_powered(&self, value: bool) -> Result<()>;
}
