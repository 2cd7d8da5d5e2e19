use anyhow::{Context, bail};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use panelrs::{DevicePanel, DeviceRecord, OperationRequest, Outcome, PanelConfig, Subsystem};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "panelrs")]
#[command(version, about = "Scan and manage Wi-Fi networks and Bluetooth devices")]
struct Args {
    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Program used for Wi-Fi operations
    #[arg(long, default_value = "nmcli", global = true)]
    nmcli: String,

    /// Seconds an external command may run before it is abandoned
    #[arg(long, default_value_t = 30, global = true)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List visible networks or devices
    Scan { subsystem: SubsystemArg },
    /// Connect to a network (SSID) or device (MAC address)
    Connect {
        subsystem: SubsystemArg,
        identifier: String,
        /// Passphrase for a secured Wi-Fi network
        #[arg(long)]
        password: Option<String>,
    },
    /// Disconnect a network or device
    Disconnect {
        subsystem: SubsystemArg,
        identifier: String,
    },
    /// Disconnect and remove the saved profile or pairing
    Forget {
        subsystem: SubsystemArg,
        identifier: String,
    },
    /// Turn the radio on
    Enable { subsystem: SubsystemArg },
    /// Turn the radio off
    Disable { subsystem: SubsystemArg },
    /// Print every update until interrupted
    Watch {
        subsystem: SubsystemArg,
        /// Seconds between Wi-Fi rescans
        #[arg(long, default_value_t = 10)]
        interval: u64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SubsystemArg {
    Wifi,
    Bluetooth,
}

impl From<SubsystemArg> for Subsystem {
    fn from(arg: SubsystemArg) -> Self {
        match arg {
            SubsystemArg::Wifi => Subsystem::Wifi,
            SubsystemArg::Bluetooth => Subsystem::Bluetooth,
        }
    }
}

impl Command {
    fn subsystem(&self) -> Subsystem {
        match self {
            Self::Scan { subsystem }
            | Self::Connect { subsystem, .. }
            | Self::Disconnect { subsystem, .. }
            | Self::Forget { subsystem, .. }
            | Self::Enable { subsystem }
            | Self::Disable { subsystem }
            | Self::Watch { subsystem, .. } => (*subsystem).into(),
        }
    }

    fn request(&self) -> Option<OperationRequest> {
        let subsystem = self.subsystem();
        let request = match self {
            Self::Connect {
                identifier,
                password,
                ..
            } => {
                let request = OperationRequest::connect(subsystem, identifier.as_str());
                match password {
                    Some(secret) => request.with_credentials(secret.as_str()),
                    None => request,
                }
            }
            Self::Disconnect { identifier, .. } => {
                OperationRequest::disconnect(subsystem, identifier.as_str())
            }
            Self::Forget { identifier, .. } => {
                OperationRequest::forget(subsystem, identifier.as_str())
            }
            Self::Enable { .. } => OperationRequest::radio(subsystem, true),
            Self::Disable { .. } => OperationRequest::radio(subsystem, false),
            Self::Scan { .. } | Self::Watch { .. } => return None,
        };
        Some(request)
    }
}

pub fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    runtime.block_on(execute(args))
}

async fn execute(args: Args) -> anyhow::Result<()> {
    let subsystem = args.command.subsystem();
    let config = PanelConfig::default()
        .with_subsystems([subsystem])
        .with_nmcli_program(args.nmcli.as_str())
        .with_command_timeout(Duration::from_secs(args.timeout));

    let mut panel = DevicePanel::system(config)
        .await
        .with_context(|| format!("failed to set up {subsystem}"))?;

    if let Some(request) = args.command.request() {
        return operate(&mut panel, request).await;
    }

    match args.command {
        Command::Watch { interval, .. } => watch_updates(&mut panel, subsystem, interval).await,
        _ => scan(&mut panel, subsystem).await,
    }
}

/// Waits for the initial scan queued by `DevicePanel::system` and prints it.
async fn scan(panel: &mut DevicePanel, subsystem: Subsystem) -> anyhow::Result<()> {
    let done = Rc::new(Cell::new(false));
    let flag = done.clone();

    // Registration replays the still-empty cache; skip that.
    let replayed = Rc::new(Cell::new(false));
    panel.on_devices_updated(move |s, devices| {
        if !replayed.replace(true) {
            return;
        }
        print_devices(s, devices);
        flag.set(true);
    });

    while !done.get() {
        panel.dispatch_next().await;
    }

    if !panel.radio_enabled(subsystem) {
        println!("{subsystem} radio is off");
    }
    Ok(())
}

async fn operate(panel: &mut DevicePanel, request: OperationRequest) -> anyhow::Result<()> {
    let slot: Rc<RefCell<Option<Outcome>>> = Rc::default();
    let sink = slot.clone();
    let id = panel.schedule_operation_with(request, move |outcome| {
        *sink.borrow_mut() = Some(outcome.clone());
    })?;
    info!("Scheduled {id}");

    let outcome = loop {
        if let Some(outcome) = slot.borrow_mut().take() {
            break outcome;
        }
        panel.dispatch_next().await;
    };

    println!("{outcome}");
    if outcome.needs_credentials {
        println!("Retry with --password <PASSWORD>");
    }
    if !outcome.success {
        bail!("{} {} failed", outcome.kind, outcome.identifier);
    }
    Ok(())
}

async fn watch_updates(
    panel: &mut DevicePanel,
    subsystem: Subsystem,
    interval: u64,
) -> anyhow::Result<()> {
    panel.on_devices_updated(print_devices);
    panel.on_radio_state_changed(|s, enabled| {
        println!("{s} radio {}", if enabled { "on" } else { "off" });
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());
    let watcher = if subsystem == Subsystem::Bluetooth {
        Some(panel.spawn_bluetooth_watcher(shutdown_rx)?)
    } else {
        None
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
    ticker.tick().await;

    loop {
        let rescan = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = panel.dispatch_next() => false,
            _ = ticker.tick(), if watcher.is_none() => true,
        };
        if rescan {
            panel.schedule_scan(subsystem)?;
        }
    }

    info!("Shutting down");
    if shutdown_tx.send(()).is_err() {
        warn!("Watcher already stopped");
    }
    if let Some(handle) = watcher {
        handle.await.context("watcher task panicked")?;
    }
    Ok(())
}

fn print_devices(subsystem: Subsystem, devices: &[DeviceRecord]) {
    println!("{subsystem}: {} found", devices.len());
    for dev in devices {
        println!(
            "  {} {:3}%{} {:32} {}{}",
            dev.bars(),
            dev.signal_strength,
            if dev.signal_is_estimated() { "~" } else { " " },
            dev.display_name,
            dev.identifier,
            if dev.connected { "  [connected]" } else { "" }
        );
    }
}
