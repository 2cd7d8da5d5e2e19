//! Consumer-side dispatch through `DevicePanel`.

mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

use common::{settle, FakeDevice, FakeGateway, ROOT};
use panelrs::{
    Backend, DevicePanel, DeviceRecord, OperationRequest, Outcome, PanelConfig, Subsystem,
    UnavailableGateway,
};

fn panel(gw: &Arc<FakeGateway>) -> DevicePanel {
    let config = PanelConfig::default().with_subsystems([Subsystem::Bluetooth]);
    DevicePanel::new(
        Handle::current(),
        &config,
        [Backend::bluetooth(gw.clone(), ROOT)],
    )
}

fn gateway() -> Arc<FakeGateway> {
    Arc::new(
        FakeGateway::new(&["hci0", "hci1"])
            .with_device(FakeDevice::new("hci0", "00:1A:7D:DA:71:13").named("Speaker"))
            .with_device(FakeDevice::new("hci1", "C8:1F:E8:F0:51:57").named("Mouse").saved()),
    )
}

async fn dispatch_until(panel: &mut DevicePanel, mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done() {
            assert!(panel.dispatch_next().await);
        }
    })
    .await
    .expect("timed out dispatching");
}

#[tokio::test]
async fn test_registration_redelivers_cached_values() {
    let gw = gateway();
    let mut panel = panel(&gw);

    let lists: Rc<RefCell<Vec<Vec<DeviceRecord>>>> = Rc::default();
    let sink = lists.clone();
    panel.on_devices_updated(move |_, devices| sink.borrow_mut().push(devices.to_vec()));

    // Registration itself delivers the (still empty) cached list.
    assert_eq!(lists.borrow().len(), 1);
    assert!(lists.borrow()[0].is_empty());

    panel.schedule_scan(Subsystem::Bluetooth).unwrap();
    dispatch_until(&mut panel, || lists.borrow().len() == 2).await;
    assert_eq!(lists.borrow()[1].len(), 2);

    // A replacement callback immediately sees the cached scan result.
    let latest: Rc<RefCell<Option<usize>>> = Rc::default();
    let sink = latest.clone();
    panel.on_devices_updated(move |_, devices| *sink.borrow_mut() = Some(devices.len()));
    assert_eq!(*latest.borrow(), Some(2));

    // The old callback no longer fires.
    panel.schedule_scan(Subsystem::Bluetooth).unwrap();
    *latest.borrow_mut() = None;
    dispatch_until(&mut panel, || latest.borrow().is_some()).await;
    assert_eq!(lists.borrow().len(), 2);
}

#[tokio::test]
async fn test_radio_callback_starts_enabled() {
    let gw = gateway();
    let mut panel = panel(&gw);

    let states: Rc<RefCell<Vec<(Subsystem, bool)>>> = Rc::default();
    let sink = states.clone();
    panel.on_radio_state_changed(move |s, on| sink.borrow_mut().push((s, on)));
    assert_eq!(*states.borrow(), vec![(Subsystem::Bluetooth, true)]);

    panel
        .schedule_operation(OperationRequest::radio(Subsystem::Bluetooth, false))
        .unwrap();
    dispatch_until(&mut panel, || states.borrow().len() == 2).await;
    assert_eq!(states.borrow()[1], (Subsystem::Bluetooth, false));
    assert!(!panel.radio_enabled(Subsystem::Bluetooth));
}

#[tokio::test]
async fn test_on_done_runs_once_after_general_callback() {
    let gw = gateway();
    let mut panel = panel(&gw);

    let order: Rc<RefCell<Vec<String>>> = Rc::default();
    let sink = order.clone();
    panel.on_operation_complete(move |o: &Outcome| sink.borrow_mut().push(format!("all {}", o.success)));

    let sink = order.clone();
    panel
        .schedule_operation_with(
            OperationRequest::connect(Subsystem::Bluetooth, "00:1A:7D:DA:71:13"),
            move |o| sink.borrow_mut().push(format!("done {}", o.success)),
        )
        .unwrap();

    dispatch_until(&mut panel, || order.borrow().len() == 2).await;
    assert_eq!(*order.borrow(), vec!["all true", "done true"]);

    // Later completions only reach the general callback.
    panel
        .schedule_operation(OperationRequest::disconnect(Subsystem::Bluetooth, "00:1A:7D:DA:71:13"))
        .unwrap();
    dispatch_until(&mut panel, || order.borrow().len() == 3).await;
    assert_eq!(order.borrow()[2], "all true");
}

#[tokio::test]
async fn test_dispatch_pending_does_not_wait() {
    let gw = gateway();
    let mut panel = panel(&gw);
    assert_eq!(panel.dispatch_pending(), 0);

    let seen = Rc::new(RefCell::new(0));
    let sink = seen.clone();
    panel.on_devices_updated(move |_, _| *sink.borrow_mut() += 1);
    assert_eq!(*seen.borrow(), 1);

    panel.schedule_scan(Subsystem::Bluetooth).unwrap();
    settle().await;
    assert_eq!(panel.dispatch_pending(), 1);
    assert_eq!(*seen.borrow(), 2);
    assert_eq!(panel.devices(Subsystem::Bluetooth).len(), 2);
}

#[tokio::test]
async fn test_watcher_requires_system_bus() {
    let gw = gateway();
    let panel = panel(&gw);
    let (_tx, rx) = tokio::sync::watch::channel(());

    assert!(panel.spawn_bluetooth_watcher(rx).is_err());
}

#[tokio::test]
async fn test_unreachable_bluetooth_is_not_fatal() {
    let config = PanelConfig::default();
    let mut panel = DevicePanel::new(
        Handle::current(),
        &config,
        [
            Backend::wifi(Arc::new(
                FakeGateway::new(&[]).with_device(FakeDevice::new("", "HomeNet").signal(80)),
            )),
            Backend::bluetooth(
                Arc::new(UnavailableGateway::new("system bus: no such socket")),
                ROOT,
            ),
        ],
    );

    let lists: Rc<RefCell<Vec<(Subsystem, usize)>>> = Rc::default();
    let sink = lists.clone();
    panel.on_devices_updated(move |s, devices| sink.borrow_mut().push((s, devices.len())));
    lists.borrow_mut().clear();

    panel.schedule_scan(Subsystem::Bluetooth).unwrap();
    panel.schedule_scan(Subsystem::Wifi).unwrap();
    dispatch_until(&mut panel, || lists.borrow().len() == 2).await;
    assert!(lists.borrow().contains(&(Subsystem::Bluetooth, 0)));
    assert!(lists.borrow().contains(&(Subsystem::Wifi, 1)));

    let outcome: Rc<RefCell<Option<Outcome>>> = Rc::default();
    let sink = outcome.clone();
    panel
        .schedule_operation_with(
            OperationRequest::connect(Subsystem::Bluetooth, "00:1A:7D:DA:71:13"),
            move |o| *sink.borrow_mut() = Some(o.clone()),
        )
        .unwrap();
    dispatch_until(&mut panel, || outcome.borrow().is_some()).await;
    assert!(!outcome.borrow().as_ref().unwrap().success);

    let (_tx, rx) = tokio::sync::watch::channel(());
    assert!(panel.spawn_bluetooth_watcher(rx).is_err());
}

#[tokio::test]
async fn test_system_panel_builds_without_failing_on_bluetooth() {
    let config = PanelConfig::default().with_subsystems([Subsystem::Bluetooth]);
    let panel = DevicePanel::system(config).await;

    assert!(panel.is_ok(), "unexpected error: {:?}", panel.err());
}
