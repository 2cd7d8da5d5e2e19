use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

use crate::util::utils::bars_from_strength;

/// A radio subsystem managed by the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subsystem {
    /// Wi-Fi networks, addressed by SSID.
    Wifi,
    /// Bluetooth devices, addressed by MAC address.
    Bluetooth,
}

impl Subsystem {
    /// All subsystems, in a stable order.
    pub const ALL: [Subsystem; 2] = [Subsystem::Wifi, Subsystem::Bluetooth];

    /// Short lowercase name, also used as the token key for radio operations.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wifi => "wifi",
            Self::Bluetooth => "bluetooth",
        }
    }

    /// The form an identifier is compared in.
    ///
    /// MAC addresses are case-insensitive and normalized to uppercase, the
    /// form BlueZ reports. SSIDs are case-sensitive and kept as given.
    pub fn canonical_identifier(&self, identifier: &str) -> String {
        match self {
            Self::Wifi => identifier.to_string(),
            Self::Bluetooth => identifier.to_ascii_uppercase(),
        }
    }
}

impl Display for Subsystem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wifi => write!(f, "Wi-Fi"),
            Self::Bluetooth => write!(f, "Bluetooth"),
        }
    }
}

/// Where a record's signal figure came from.
///
/// Estimated values are a heuristic derived from connection and pairing
/// state, not a measurement. Consumers should not present them as RSSI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalSource {
    /// Reported by the hardware (or the tool wrapping it).
    Reported,
    /// Estimated from state: connected, paired/secured, or merely present.
    Estimated,
}

/// A network or device seen during one scan.
///
/// Records are created fresh on every scan cycle. The only identity that
/// carries across scans is the `identifier` string.
///
/// # Examples
///
/// ```no_run
/// use panelrs::{DevicePanel, PanelConfig, Subsystem};
///
/// # async fn example() -> panelrs::Result<()> {
/// let mut panel = DevicePanel::system(PanelConfig::default()).await?;
///
/// panel.on_devices_updated(|subsystem, devices| {
///     for dev in devices {
///         println!("[{subsystem}] {} {}", dev.bars(), dev.display_name);
///     }
/// });
/// panel.schedule_scan(Subsystem::Bluetooth)?;
/// panel.dispatch_next().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Subsystem the record belongs to
    pub subsystem: Subsystem,
    /// MAC address (Bluetooth) or SSID (Wi-Fi)
    pub identifier: String,
    /// Human label, falls back to `identifier`
    pub display_name: String,
    /// Signal strength (0-100)
    pub signal_strength: u8,
    /// Whether `signal_strength` was reported or estimated
    pub signal_source: SignalSource,
    /// Whether the link is currently active
    pub connected: bool,
    /// Secured (Wi-Fi) or paired (Bluetooth)
    pub secured_or_paired: bool,
}

impl DeviceRecord {
    /// Returns `true` when the signal figure is a heuristic estimate.
    pub fn signal_is_estimated(&self) -> bool {
        self.signal_source == SignalSource::Estimated
    }

    /// Signal strength as four bar glyphs, e.g. `▂▄▆_`.
    pub fn bars(&self) -> &'static str {
        bars_from_strength(self.signal_strength)
    }

    /// Merges another sighting of the same identifier into this record.
    ///
    /// A connected sighting always wins; otherwise the stronger one is kept.
    pub(crate) fn merge(&mut self, other: &DeviceRecord) {
        let replace = match (self.connected, other.connected) {
            (false, true) => true,
            (true, false) => false,
            _ => other.signal_strength > self.signal_strength,
        };
        if replace {
            *self = other.clone();
        }
    }
}

impl Display for DeviceRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) {}%{}",
            self.display_name,
            self.identifier,
            self.signal_strength,
            if self.signal_is_estimated() { "~" } else { "" }
        )?;
        if self.connected {
            write!(f, " [connected]")?;
        }
        Ok(())
    }
}

/// The kind of action performed by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Bring the link up.
    Connect,
    /// Take the link down.
    Disconnect,
    /// Disconnect (best-effort) and remove saved credentials/pairing.
    Forget,
    /// Turn the subsystem's radio on.
    Enable,
    /// Turn the subsystem's radio off.
    Disable,
}

impl OperationKind {
    /// Whether the operation acts on the whole subsystem rather than one target.
    pub fn is_radio(&self) -> bool {
        matches!(self, Self::Enable | Self::Disable)
    }
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Disconnect => write!(f, "disconnect"),
            Self::Forget => write!(f, "forget"),
            Self::Enable => write!(f, "enable"),
            Self::Disable => write!(f, "disable"),
        }
    }
}

/// Lifecycle of a single in-flight operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationPhase {
    /// Token taken, work not started yet.
    Idle,
    /// Mapping the identifier to an object path.
    Resolving,
    /// Invoking the gateway action.
    Acting,
    /// Finished successfully.
    Succeeded,
    /// Finished with a failure.
    Failed,
}

impl Display for OperationPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Resolving => write!(f, "resolving"),
            Self::Acting => write!(f, "acting"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A request for the executor.
///
/// For [`OperationKind::Enable`] and [`OperationKind::Disable`] the
/// `identifier` is ignored; use [`OperationRequest::radio`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRequest {
    /// What to do
    pub kind: OperationKind,
    /// Which subsystem the target lives in
    pub subsystem: Subsystem,
    /// MAC address or SSID
    pub identifier: String,
    /// Caller-supplied secret (Wi-Fi passphrase); empty means none
    pub credentials: Option<String>,
}

impl OperationRequest {
    /// Creates a request targeting a single device or network.
    ///
    /// Bluetooth addresses are uppercased; see
    /// [`Subsystem::canonical_identifier`].
    pub fn new(kind: OperationKind, subsystem: Subsystem, identifier: impl Into<String>) -> Self {
        Self {
            kind,
            subsystem,
            identifier: identifier.into(),
            credentials: None,
        }
        .canonicalized()
    }

    /// Creates a connect request.
    pub fn connect(subsystem: Subsystem, identifier: impl Into<String>) -> Self {
        Self::new(OperationKind::Connect, subsystem, identifier)
    }

    /// Creates a disconnect request.
    pub fn disconnect(subsystem: Subsystem, identifier: impl Into<String>) -> Self {
        Self::new(OperationKind::Disconnect, subsystem, identifier)
    }

    /// Creates a forget request.
    pub fn forget(subsystem: Subsystem, identifier: impl Into<String>) -> Self {
        Self::new(OperationKind::Forget, subsystem, identifier)
    }

    /// Creates an enable/disable request for a whole subsystem.
    ///
    /// Enable and disable share one in-flight slot per subsystem: while
    /// either is running, the other is rejected as busy.
    pub fn radio(subsystem: Subsystem, enabled: bool) -> Self {
        let kind = if enabled {
            OperationKind::Enable
        } else {
            OperationKind::Disable
        };
        Self::new(kind, subsystem, subsystem.as_str())
    }

    /// Attaches a secret for the connect attempt.
    #[must_use]
    pub fn with_credentials(mut self, secret: impl Into<String>) -> Self {
        self.credentials = Some(secret.into());
        self
    }

    /// Returns the supplied secret, treating an empty string as none.
    pub fn secret(&self) -> Option<&str> {
        self.credentials.as_deref().filter(|s| !s.is_empty())
    }

    /// Rewrites the identifier into its canonical form.
    pub(crate) fn canonicalized(mut self) -> Self {
        self.identifier = self.subsystem.canonical_identifier(&self.identifier);
        self
    }

    /// The identifier used as the token key.
    pub(crate) fn token_target(&self) -> String {
        if self.kind.is_radio() {
            self.subsystem.as_str().to_string()
        } else {
            self.subsystem.canonical_identifier(&self.identifier)
        }
    }

    /// The kind used as the token key; radio toggles share one slot.
    pub(crate) fn token_slot(&self) -> OperationKind {
        if self.kind.is_radio() {
            OperationKind::Enable
        } else {
            self.kind
        }
    }
}

/// Identifier handed out for every scheduled operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(pub(crate) u64);

impl Display for OperationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// The terminal result of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// What was attempted
    pub kind: OperationKind,
    /// Subsystem of the target
    pub subsystem: Subsystem,
    /// The identifier the caller asked for
    pub identifier: String,
    /// Whether the operation succeeded
    pub success: bool,
    /// A secured target refused the credential-less attempt; retry with a secret
    pub needs_credentials: bool,
}

impl Outcome {
    pub(crate) fn new(request: &OperationRequest, success: bool) -> Self {
        Self {
            kind: request.kind,
            subsystem: request.subsystem,
            identifier: request.identifier.clone(),
            success,
            needs_credentials: false,
        }
    }

    /// The phase the operation ended in.
    pub fn phase(&self) -> OperationPhase {
        if self.success {
            OperationPhase::Succeeded
        } else {
            OperationPhase::Failed
        }
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} '{}': {}",
            self.subsystem,
            self.kind,
            self.identifier,
            self.phase()
        )?;
        if self.needs_credentials {
            write!(f, " (credentials required)")?;
        }
        Ok(())
    }
}

/// Errors that can occur inside the device-management core.
///
/// None of these reach the consumer as a panic: scans degrade to an empty
/// list and operations to a failed [`Outcome`]. They surface directly only
/// from constructors and from scheduling calls such as
/// [`Scheduler::schedule_operation`](crate::Scheduler::schedule_operation).
#[derive(Debug, Error)]
pub enum PanelError {
    /// A D-Bus communication error occurred.
    #[error("D-Bus error: {0}")]
    Dbus(#[from] zbus::Error),

    /// A D-Bus value had an unexpected type.
    #[error("D-Bus value error: {0}")]
    Variant(#[from] zvariant::Error),

    /// Spawning or talking to an external tool failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying service or tool cannot be reached at all.
    #[error("gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// The identifier could not be mapped to an object path.
    #[error("could not resolve '{0}'")]
    ResolutionFailed(String),

    /// The action call returned a non-success result.
    #[error("action rejected: {0}")]
    ActionRejected(String),

    /// An external command did not finish in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The gateway does not implement this call.
    #[error("operation not supported by this gateway: {0}")]
    Unsupported(&'static str),

    /// An operation of the same kind is already in flight for this target.
    #[error("{kind} already in progress for '{identifier}'")]
    Busy {
        /// Target of the rejected request
        identifier: String,
        /// Kind of the rejected request
        kind: OperationKind,
    },

    /// No gateway is configured for the subsystem.
    #[error("{0} is not configured")]
    UnknownSubsystem(Subsystem),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, strength: u8, connected: bool) -> DeviceRecord {
        DeviceRecord {
            subsystem: Subsystem::Wifi,
            identifier: id.into(),
            display_name: id.into(),
            signal_strength: strength,
            signal_source: SignalSource::Reported,
            connected,
            secured_or_paired: false,
        }
    }

    #[test]
    fn merge_keeps_strongest() {
        let mut a = record("home", 40, false);
        a.merge(&record("home", 70, false));
        assert_eq!(a.signal_strength, 70);

        a.merge(&record("home", 20, false));
        assert_eq!(a.signal_strength, 70);
    }

    #[test]
    fn merge_prefers_connected() {
        let mut a = record("home", 90, false);
        a.merge(&record("home", 30, true));
        assert!(a.connected);
        assert_eq!(a.signal_strength, 30);

        a.merge(&record("home", 99, false));
        assert!(a.connected);
    }

    #[test]
    fn radio_request_uses_subsystem_as_target() {
        let req = OperationRequest::radio(Subsystem::Bluetooth, false);
        assert_eq!(req.kind, OperationKind::Disable);
        assert_eq!(req.token_target(), "bluetooth");
        assert!(req.kind.is_radio());
    }

    #[test]
    fn bluetooth_addresses_are_uppercased() {
        let req = OperationRequest::connect(Subsystem::Bluetooth, "00:1a:7d:da:71:13");
        assert_eq!(req.identifier, "00:1A:7D:DA:71:13");

        let literal = OperationRequest {
            kind: OperationKind::Forget,
            subsystem: Subsystem::Bluetooth,
            identifier: "c8:1f:e8:f0:51:57".into(),
            credentials: None,
        };
        assert_eq!(literal.token_target(), "C8:1F:E8:F0:51:57");
        assert_eq!(literal.canonicalized().identifier, "C8:1F:E8:F0:51:57");

        let wifi = OperationRequest::connect(Subsystem::Wifi, "HomeNet");
        assert_eq!(wifi.identifier, "HomeNet");
    }

    #[test]
    fn empty_secret_is_none() {
        let req = OperationRequest::connect(Subsystem::Wifi, "X").with_credentials("");
        assert_eq!(req.secret(), None);

        let req = OperationRequest::connect(Subsystem::Wifi, "X").with_credentials("hunter22");
        assert_eq!(req.secret(), Some("hunter22"));
    }

    #[test]
    fn outcome_display() {
        let req = OperationRequest::connect(Subsystem::Wifi, "Cafe");
        let mut outcome = Outcome::new(&req, false);
        outcome.needs_credentials = true;
        assert_eq!(
            outcome.to_string(),
            "Wi-Fi connect 'Cafe': failed (credentials required)"
        );
    }

    #[test]
    fn busy_error_message() {
        let err = PanelError::Busy {
            identifier: "AA:BB".into(),
            kind: OperationKind::Forget,
        };
        assert_eq!(err.to_string(), "forget already in progress for 'AA:BB'");
    }

    #[test]
    fn record_display_marks_estimates() {
        let mut r = record("home", 75, true);
        r.signal_source = SignalSource::Estimated;
        assert_eq!(r.to_string(), "home (home) 75%~ [connected]");
    }
}
