use super::*;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::app::adb::testing::FakeBridge;
use crate::app::config::load_config_from_path;
use crate::app::models::DeviceStatus;

#[derive(Default)]
struct Script {
    selections: VecDeque<usize>,
    inputs: VecDeque<String>,
    notices: Vec<String>,
    prompts: usize,
}

struct ScriptedPrompter(Rc<RefCell<Script>>);

impl Prompter for ScriptedPrompter {
    fn select(&self, _prompt: &str, _items: &[String]) -> Result<usize, AppError> {
        let mut script = self.0.borrow_mut();
        script.prompts += 1;
        script
            .selections
            .pop_front()
            .ok_or_else(|| AppError::validation("no scripted selection", "trace"))
    }

    fn input_address(&self, _prompt: &str) -> Result<String, AppError> {
        let mut script = self.0.borrow_mut();
        script.prompts += 1;
        script
            .inputs
            .pop_front()
            .ok_or_else(|| AppError::validation("no scripted input", "trace"))
    }

    fn notice(&self, message: &str) {
        self.0.borrow_mut().notices.push(message.to_string());
    }
}

struct Harness {
    ctx: CommandContext,
    bridge: Arc<FakeBridge>,
    script: Rc<RefCell<Script>>,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new(bridge: FakeBridge) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ConfigStore::load(dir.path().join("config.json"), "trace");
        let bridge = Arc::new(bridge);
        let script = Rc::new(RefCell::new(Script::default()));
        let dyn_bridge: Arc<dyn BridgeClient> = Arc::clone(&bridge) as Arc<dyn BridgeClient>;
        let mut ctx = CommandContext::new(
            "trace".to_string(),
            store,
            Ok(dyn_bridge),
            Ipv4Addr::new(192, 168, 1, 5),
            Box::new(ScriptedPrompter(Rc::clone(&script))),
        );
        ctx.tcpip_settle = Duration::ZERO;
        Self {
            ctx,
            bridge,
            script,
            _dir: dir,
        }
    }

    fn without_adb() -> Self {
        let mut harness = Self::new(FakeBridge::default());
        harness.ctx.bridge = Err(AppError::environment("adb was not found on PATH", "trace"));
        harness
    }

    fn select(self, choice: usize) -> Self {
        self.script.borrow_mut().selections.push_back(choice);
        self
    }

    fn input(self, value: &str) -> Self {
        self.script.borrow_mut().inputs.push_back(value.to_string());
        self
    }

    fn known(mut self, id: &str, ip: &str, model: &str) -> Self {
        self.ctx.store.config.known_devices.push(KnownDevice {
            id: id.to_string(),
            ip: ip.to_string(),
            model: model.to_string(),
            last_connected: "2026-10-01T10:00:00Z".to_string(),
        });
        self
    }

    fn persisted(&self) -> Vec<KnownDevice> {
        load_config_from_path(self.ctx.store.path(), "trace").known_devices
    }
}

fn usb(serial: &str) -> Device {
    Device::new(serial, DeviceStatus::Device)
}

const WLAN_ROUTE: &str = "192.168.1.0/24 dev wlan0 proto kernel scope link src 192.168.1.12\n";

#[test]
fn enable_wireless_without_wifi_address_reports_and_records_nothing() {
    let bridge = FakeBridge::with_listing(vec![usb("R58M123")])
        .property("R58M123", "ro.build.version.release", "11")
        .shell_reply("ip route", "");
    let mut harness = Harness::new(bridge);

    let err = enable_wireless(&mut harness.ctx, Some("R58M123")).expect_err("expected failure");

    assert_eq!(err.code, "ERR_PARSE");
    assert!(err.error.contains("Wi-Fi is enabled"));
    assert!(harness.bridge.calls().contains(&"shell R58M123 ip route".to_string()));
    assert!(harness.bridge.calls_to("tcpip").is_empty());
    assert!(harness.ctx.store.config.known_devices.is_empty());
    assert!(!harness.ctx.store.path().exists());
}

#[test]
fn enable_wireless_switches_connects_and_records() {
    let bridge = FakeBridge::with_listing(vec![usb("R58M123")])
        .property("R58M123", "ro.build.version.release", "13")
        .property("R58M123", "ro.product.model", "SM-G991B")
        .shell_reply("ip route", WLAN_ROUTE)
        .reachable(&["192.168.1.12:5555"]);
    let mut harness = Harness::new(bridge);

    let address = enable_wireless(&mut harness.ctx, Some("R58M123")).expect("enable");

    assert_eq!(address, "192.168.1.12:5555");
    assert_eq!(harness.bridge.calls_to("tcpip"), vec!["R58M123 5555".to_string()]);
    assert_eq!(harness.bridge.calls_to("connect"), vec!["192.168.1.12:5555".to_string()]);
    let persisted = harness.persisted();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].id, "R58M123");
    assert_eq!(persisted[0].ip, "192.168.1.12:5555");
    assert_eq!(persisted[0].model, "SM-G991B");
    assert!(!persisted[0].last_connected.is_empty());
}

#[test]
fn enable_wireless_on_older_android_reads_interface_address() {
    let bridge = FakeBridge::with_listing(vec![usb("ZY22ABCD")])
        .property("ZY22ABCD", "ro.build.version.release", "9")
        .shell_reply(
            "ip -f inet addr show wlan0",
            "    inet 10.0.0.23/24 brd 10.0.0.255 scope global wlan0\n",
        )
        .reachable(&["10.0.0.23:5555"]);
    let mut harness = Harness::new(bridge);

    let address = enable_wireless(&mut harness.ctx, Some("ZY22ABCD")).expect("enable");

    assert_eq!(address, "10.0.0.23:5555");
    assert!(!harness.bridge.calls().contains(&"shell ZY22ABCD ip route".to_string()));
}

#[test]
fn enable_wireless_leaves_wireless_device_alone() {
    let bridge = FakeBridge::with_listing(vec![usb("192.168.1.12:5555")]);
    let mut harness = Harness::new(bridge);

    let serial = enable_wireless(&mut harness.ctx, Some("192.168.1.12:5555")).expect("enable");

    assert_eq!(serial, "192.168.1.12:5555");
    assert!(harness.bridge.calls_to("tcpip").is_empty());
}

#[test]
fn unknown_device_is_a_device_error() {
    let mut harness = Harness::new(FakeBridge::with_listing(vec![usb("R58M123")]));
    let err = device_info(&mut harness.ctx, Some("NOPE")).expect_err("expected failure");
    assert_eq!(err.code, "ERR_DEVICE");
    assert!(err.error.contains("NOPE"));
}

#[test]
fn offline_device_is_rejected() {
    let mut harness = Harness::new(FakeBridge::with_listing(vec![Device::new(
        "emulator-5554",
        DeviceStatus::Offline,
    )]));
    let err = device_info(&mut harness.ctx, Some("emulator-5554")).expect_err("expected failure");
    assert_eq!(err.code, "ERR_DEVICE");
    assert!(err.error.contains("offline"));
}

#[test]
fn resolve_device_prompts_when_several_match() {
    let harness = Harness::new(FakeBridge::with_listing(vec![
        usb("R58M123"),
        usb("ZY22ABCD"),
        usb("192.168.1.40:5555"),
    ]))
    .select(1);

    let device = resolve_device(&harness.ctx, None, |device| !device.is_wireless()).expect("resolve");

    assert_eq!(device.serial, "ZY22ABCD");
    assert_eq!(harness.script.borrow().prompts, 1);
}

#[test]
fn connect_without_ip_or_known_devices_reprompts_invalid_input() {
    let harness = Harness::new(FakeBridge::default().reachable(&["192.168.1.12:5555"]))
        .input("pixel.local")
        .input("192.168.1.12");
    let mut harness = harness;

    let record = connect(&mut harness.ctx, None).expect("connect");

    assert_eq!(record.ip, "192.168.1.12:5555");
    assert_eq!(harness.script.borrow().prompts, 2);
    assert!(harness
        .script
        .borrow()
        .notices
        .iter()
        .any(|notice| notice.contains("pixel.local")));
    assert_eq!(harness.bridge.calls_to("connect"), vec!["192.168.1.12:5555".to_string()]);
}

#[test]
fn connect_offers_known_devices_and_keeps_their_id() {
    let mut harness = Harness::new(FakeBridge::default().reachable(&["192.168.1.12:5555"]))
        .known("R58M123", "192.168.1.12:5555", "SM-G991B")
        .select(0);

    let record = connect(&mut harness.ctx, None).expect("connect");

    assert_eq!(record.id, "R58M123");
    let persisted = harness.persisted();
    assert_eq!(persisted.len(), 1);
    assert_ne!(persisted[0].last_connected, "2026-10-01T10:00:00Z");
}

#[test]
fn connect_manual_entry_after_known_devices() {
    let mut harness = Harness::new(FakeBridge::default().reachable(&["10.0.0.8:37099"]))
        .known("R58M123", "192.168.1.12:5555", "SM-G991B")
        .select(1)
        .input("10.0.0.8:37099");

    let record = connect(&mut harness.ctx, None).expect("connect");

    assert_eq!(record.id, "10.0.0.8:37099");
    assert_eq!(harness.persisted().len(), 2);
}

#[test]
fn connect_with_flag_validates_and_defaults_port() {
    let mut harness = Harness::new(FakeBridge::default().reachable(&["192.168.1.30:5555"]));

    let err = connect(&mut harness.ctx, Some("192.168.1")).expect_err("invalid");
    assert_eq!(err.code, "ERR_VALIDATION");

    let record = connect(&mut harness.ctx, Some("192.168.1.30")).expect("connect");
    assert_eq!(record.ip, "192.168.1.30:5555");
    assert_eq!(harness.script.borrow().prompts, 0);
}

#[test]
fn failed_connect_records_nothing() {
    let mut harness = Harness::new(FakeBridge::default());
    let err = connect(&mut harness.ctx, Some("192.168.1.77")).expect_err("unreachable");
    assert_eq!(err.code, "ERR_SYSTEM");
    assert!(harness.persisted().is_empty());
}

#[test]
fn disconnect_picks_the_only_wireless_device() {
    let mut harness = Harness::new(FakeBridge::with_listing(vec![
        usb("R58M123"),
        usb("192.168.1.12:5555"),
    ]));

    let address = disconnect(&mut harness.ctx, None).expect("disconnect");

    assert_eq!(address, "192.168.1.12:5555");
    assert_eq!(harness.bridge.calls_to("disconnect"), vec!["192.168.1.12:5555".to_string()]);
}

#[test]
fn disconnect_without_wireless_devices_fails() {
    let mut harness = Harness::new(FakeBridge::with_listing(vec![usb("R58M123")]));
    let err = disconnect(&mut harness.ctx, None).expect_err("nothing to disconnect");
    assert_eq!(err.code, "ERR_DEVICE");
}

#[test]
fn fetch_devices_batches_properties_for_online_devices() {
    let bridge = FakeBridge::with_listing(vec![
        usb("R58M123"),
        Device::new("ZY22ABCD", DeviceStatus::Unauthorized),
    ])
    .property("R58M123", "ro.product.model", "SM-G991B")
    .property("R58M123", "ro.build.version.release", "13")
    .property("R58M123", "ro.product.manufacturer", "samsung");
    let harness = Harness::new(bridge);

    let devices = fetch_devices(&harness.ctx).expect("devices");

    assert_eq!(devices[0].model.as_deref(), Some("SM-G991B"));
    assert_eq!(devices[0].android_version.as_deref(), Some("13"));
    assert_eq!(devices[0].manufacturer.as_deref(), Some("samsung"));
    assert_eq!(devices[1].model, None);
    assert_eq!(harness.bridge.calls_to("getprops"), vec!["R58M123".to_string()]);
}

#[test]
fn info_reports_dev_tooling() {
    let bridge = FakeBridge::with_listing(vec![usb("192.168.1.12:5555")])
        .property("192.168.1.12:5555", "ro.product.model", "Pixel 7")
        .shell_reply("ps -A", "USER PID PPID VSZ RSS WCHAN ADDR S NAME\nu0_a312 12345 812 1 1 0 0 S host.exp.exponent\n")
        .shell_reply("pm list packages", "package:host.exp.exponent\npackage:com.android.chrome\n");
    let mut harness = Harness::new(bridge);

    let detail = device_info(&mut harness.ctx, None).expect("info");

    assert_eq!(detail.model.as_deref(), Some("Pixel 7"));
    assert_eq!(detail.wifi_address.as_deref(), Some("192.168.1.12"));
    assert_eq!(detail.dev_processes, vec!["host.exp.exponent".to_string()]);
    assert_eq!(detail.dev_packages, vec!["host.exp.exponent".to_string()]);
}

#[test]
fn qr_without_device_does_not_need_adb() {
    let mut harness = Harness::without_adb();
    let uri = show_qr(&mut harness.ctx, None).expect("qr");
    assert_eq!(uri, "exp://192.168.1.5:8081");

    let err = show_qr(&mut harness.ctx, Some("R58M123")).expect_err("needs adb");
    assert_eq!(err.code, "ERR_ENVIRONMENT");
}

#[test]
fn qr_uses_the_port_from_the_dev_server_command() {
    let mut harness = Harness::without_adb();
    harness.ctx.store.config.dev_server.command = "npx expo start --port 19000".to_string();

    let uri = show_qr(&mut harness.ctx, None).expect("qr");

    assert_eq!(uri, "exp://192.168.1.5:19000");
}

#[test]
fn missing_adb_aborts_listing_and_discovery() {
    let mut harness = Harness::without_adb();
    assert_eq!(
        list_devices(&mut harness.ctx).expect_err("no adb").code,
        "ERR_ENVIRONMENT"
    );
    assert_eq!(discover(&mut harness.ctx).expect_err("no adb").code, "ERR_ENVIRONMENT");
}

#[test]
fn resolves_trace_ids() {
    assert_eq!(resolve_trace_id(Some("abc".to_string())), "abc");
    assert_eq!(resolve_trace_id(Some("  ".to_string())).len(), 36);
    assert_eq!(resolve_trace_id(None).len(), 36);
}
