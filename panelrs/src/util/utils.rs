//! Utility functions for signal conversion, tool output parsing and
//! D-Bus proxy construction.

use zbus::Connection;
use zvariant::OwnedObjectPath;

use crate::types::constants::{rssi, signal_strength};
use crate::Result;

/// Converts signal strength (0-100) to a visual bar representation.
///
/// Returns a 4-character string using Unicode block characters:
/// - 0-24%:   `▂___` (1 bar)
/// - 25-49%:  `▂▄__` (2 bars)
/// - 50-74%:  `▂▄▆_` (3 bars)
/// - 75-100%: `▂▄▆█` (4 bars)
pub(crate) fn bars_from_strength(s: u8) -> &'static str {
    match s {
        0..=signal_strength::BAR_1_MAX => "▂___",
        signal_strength::BAR_2_MIN..=signal_strength::BAR_2_MAX => "▂▄__",
        signal_strength::BAR_3_MIN..=signal_strength::BAR_3_MAX => "▂▄▆_",
        _ => "▂▄▆█",
    }
}

/// Scales an RSSI reading in dBm to 0-100.
///
/// Anything at or below -100 dBm is 0, anything at or above -50 dBm is 100,
/// linear in between.
pub(crate) fn percent_from_dbm(dbm: i64) -> u8 {
    let clamped = dbm.clamp(rssi::FLOOR_DBM, rssi::CEILING_DBM);
    let span = rssi::CEILING_DBM - rssi::FLOOR_DBM;
    ((clamped - rssi::FLOOR_DBM) * 100 / span) as u8
}

/// Splits one line of `nmcli --terse` output into its fields.
///
/// Fields are separated by `:`; a literal colon or backslash inside a
/// field is escaped with a backslash.
pub(crate) fn split_terse_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Helper to create a D-Bus proxy for a given service, path and interface.
pub(crate) async fn bus_proxy<'a, P>(
    conn: &'a Connection,
    service: &'static str,
    path: P,
    interface: &'static str,
) -> Result<zbus::Proxy<'a>>
where
    P: TryInto<OwnedObjectPath>,
    P::Error: Into<zbus::Error>,
{
    let owned_path = path.try_into().map_err(Into::into)?;
    Ok(zbus::proxy::Builder::new(conn)
        .destination(service)?
        .path(owned_path)?
        .interface(interface)?
        .build()
        .await?)
}

/// Macro to convert Result to Option with error logging.
/// Usage: `try_log!(result, "context message")`
#[macro_export]
macro_rules! try_log {
    ($result:expr, $context:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => {
                log::warn!("{}: {:?}", $context, e);
                return None;
            }
        }
    };
}
