use panelrs::{DevicePanel, PanelConfig, Subsystem};
use std::cell::Cell;
use std::rc::Rc;

#[tokio::main]
async fn main() -> panelrs::Result<()> {
    let mut panel = DevicePanel::system(PanelConfig::default()).await?;
    let subsystems = panel.scheduler().subsystems();

    // Each subsystem delivers once for its radio query and once per scan.
    let remaining = Rc::new(Cell::new(subsystems.len()));
    let counter = remaining.clone();
    panel.on_devices_updated(move |subsystem, devices| {
        if devices.is_empty() {
            return;
        }
        println!("{subsystem}:");
        for dev in devices {
            println!("  {} {:30} {}", dev.bars(), dev.display_name, dev.identifier);
        }
        counter.set(counter.get().saturating_sub(1));
    });

    for subsystem in subsystems {
        println!("Scanning {subsystem}...");
        panel.schedule_scan(subsystem)?;
    }

    let deadline = tokio::time::sleep(std::time::Duration::from_secs(10));
    tokio::pin!(deadline);
    while remaining.get() > 0 {
        tokio::select! {
            _ = &mut deadline => break,
            _ = panel.dispatch_next() => {}
        }
    }

    if !panel.radio_enabled(Subsystem::Wifi) {
        println!("Wi-Fi radio is off");
    }
    Ok(())
}
