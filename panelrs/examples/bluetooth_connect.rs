use panelrs::{DevicePanel, OperationRequest, PanelConfig, Subsystem};
use std::cell::RefCell;
use std::rc::Rc;

#[tokio::main]
async fn main() -> panelrs::Result<()> {
    let address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "00:1A:7D:DA:71:13".to_string());

    let config = PanelConfig::default().with_subsystems([Subsystem::Bluetooth]);
    let mut panel = DevicePanel::system(config).await?;

    let result = Rc::new(RefCell::new(None));
    let slot = result.clone();
    panel.schedule_operation_with(
        OperationRequest::connect(Subsystem::Bluetooth, address.clone()),
        move |outcome| *slot.borrow_mut() = Some(outcome.clone()),
    )?;

    println!("Connecting to {address}...");
    while result.borrow().is_none() {
        panel.dispatch_next().await;
    }

    if let Some(outcome) = result.borrow().as_ref() {
        println!("{outcome}");
    }
    Ok(())
}
