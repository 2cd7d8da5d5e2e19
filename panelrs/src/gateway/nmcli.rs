//! Wi-Fi gateway that shells out to NetworkManager's `nmcli` tool.
//!
//! Every invocation runs with `LC_ALL=C` so output and error text are not
//! localized, and is bounded by the configured command timeout.

use async_trait::async_trait;
use log::{debug, info};
use std::io::ErrorKind;
use std::time::Duration;
use tokio::process::Command;

use crate::api::config::PanelConfig;
use crate::gateway::{Gateway, ResolvedTarget};
use crate::types::constants::{nmcli, timeouts};
use crate::{PanelError, Result};

/// Drives Wi-Fi through `nmcli`.
///
/// Networks are addressed by SSID; saved profiles are addressed by their
/// connection name, which `nmcli` sets to the SSID when it creates them.
#[derive(Debug, Clone)]
pub struct NmcliGateway {
    program: String,
    timeout: Duration,
}

impl Default for NmcliGateway {
    fn default() -> Self {
        Self {
            program: nmcli::PROGRAM.to_string(),
            timeout: timeouts::command_timeout(),
        }
    }
}

impl NmcliGateway {
    /// Creates a gateway using the program and timeout from `config`.
    pub fn new(config: &PanelConfig) -> Self {
        Self {
            program: config.nmcli_program.clone(),
            timeout: config.command_timeout,
        }
    }

    /// Runs `nmcli` with `args` and returns its standard output.
    async fn run(&self, args: &[&str]) -> Result<String> {
        let printable = redact_args(args);
        debug!("Running {} {}", self.program, printable);

        let output = Command::new(&self.program)
            .args(args)
            .env("LC_ALL", "C")
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| {
                PanelError::Timeout(format!("`{} {printable}` after {:?}", self.program, self.timeout))
            })?
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    PanelError::GatewayUnavailable(format!("`{}` not found", self.program))
                }
                _ => PanelError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PanelError::ActionRejected(format!(
                "`{} {printable}` exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Gateway for NmcliGateway {
    async fn list_networks(&self) -> Result<Vec<String>> {
        let stdout = self
            .run(&["-t", "-f", nmcli::WIFI_LIST_FIELDS, "device", "wifi", "list"])
            .await?;
        Ok(stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn connect(&self, target: &ResolvedTarget, credential: Option<&str>) -> Result<()> {
        let mut args = vec!["device", "wifi", "connect", target.path.as_str()];
        if let Some(secret) = credential {
            args.extend(["password", secret]);
        }
        self.run(&args).await?;
        info!("Connected to '{}'", target.path);
        Ok(())
    }

    async fn disconnect(&self, target: &ResolvedTarget) -> Result<()> {
        self.run(&["connection", "down", "id", target.path.as_str()]).await?;
        Ok(())
    }

    async fn remove_association(&self, target: &ResolvedTarget) -> Result<()> {
        self.remove_by_name(&target.path).await
    }

    async fn remove_by_name(&self, name: &str) -> Result<()> {
        self.run(&["connection", "delete", "id", name]).await?;
        info!("Deleted saved profile '{name}'");
        Ok(())
    }

    async fn set_radio_enabled(&self, enabled: bool) -> Result<()> {
        let state = if enabled { "on" } else { "off" };
        self.run(&["radio", "wifi", state]).await?;
        Ok(())
    }

    async fn radio_enabled(&self) -> Result<bool> {
        let stdout = self.run(&["radio", "wifi"]).await?;
        parse_radio_state(&stdout)
    }
}

/// Joins arguments for logging, hiding the value following `password`.
fn redact_args(args: &[&str]) -> String {
    let mut out = Vec::with_capacity(args.len());
    let mut hide_next = false;
    for arg in args {
        if hide_next {
            out.push("********");
            hide_next = false;
        } else {
            out.push(*arg);
            hide_next = *arg == "password";
        }
    }
    out.join(" ")
}

fn parse_radio_state(stdout: &str) -> Result<bool> {
    match stdout.trim() {
        "enabled" => Ok(true),
        "disabled" => Ok(false),
        other => Err(PanelError::ActionRejected(format!(
            "unexpected radio state '{other}'"
        ))),
    }
}
