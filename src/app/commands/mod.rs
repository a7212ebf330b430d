use std::net::Ipv4Addr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::app::adb::client::BridgeClient;
use crate::app::adb::parse::{
    apply_device_properties, build_device_detail, parse_android_major, parse_dev_packages,
    parse_dev_processes, parse_wifi_ip_from_addr, parse_wifi_ip_from_route, PROP_MODEL,
    PROP_RELEASE,
};
use crate::app::cli::Command;
use crate::app::config::{now_timestamp, ConfigStore, DEFAULT_ADB_PORT};
use crate::app::dev_server::{build_dev_server_command, launch_dev_server, DevServerCommand};
use crate::app::discovery::{sweep_subnet, SweepOptions};
use crate::app::error::AppError;
use crate::app::models::{Device, DeviceDetail, KnownDevice};
use crate::app::network::normalize_address;
use crate::app::output::{
    connection_uri, print_output, print_success, render_detail, render_devices, render_hosts,
    render_known_devices, render_qr,
};
use crate::app::prompt::Prompter;
use crate::app::scheduler::GlobalSemaphore;

#[cfg(test)]
mod tests;

const WIFI_ROUTE_COMMAND: &str = "ip route";
const WIFI_ADDR_COMMAND: &str = "ip -f inet addr show wlan0";
const PROCESS_LIST_COMMAND: &str = "ps -A";
const PACKAGE_LIST_COMMAND: &str = "pm list packages";
const MANUAL_ENTRY: &str = "Enter IP address manually";
const WIFI_IP_MISSING: &str =
    "Could not determine device IP address. Ensure Wi-Fi is enabled on the device.";

/// adbd restarts after `tcpip`; connecting immediately usually fails.
pub const TCPIP_SETTLE_DELAY: Duration = Duration::from_secs(2);

pub fn resolve_trace_id(input: Option<String>) -> String {
    input
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Everything a handler needs: the preference store, adb, the host address and a prompter.
pub struct CommandContext {
    pub trace_id: String,
    pub store: ConfigStore,
    bridge: Result<Arc<dyn BridgeClient>, AppError>,
    pub local_ip: Ipv4Addr,
    pub prompter: Box<dyn Prompter>,
    pub tcpip_settle: Duration,
}

impl CommandContext {
    /// `bridge` may be an error when adb could not be located; it surfaces on first use.
    pub fn new(
        trace_id: String,
        store: ConfigStore,
        bridge: Result<Arc<dyn BridgeClient>, AppError>,
        local_ip: Ipv4Addr,
        prompter: Box<dyn Prompter>,
    ) -> Self {
        Self {
            trace_id,
            store,
            bridge,
            local_ip,
            prompter,
            tcpip_settle: TCPIP_SETTLE_DELAY,
        }
    }

    pub fn bridge(&self) -> Result<Arc<dyn BridgeClient>, AppError> {
        self.bridge.clone()
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.store.config.adb.command_timeout_secs)
    }
}

/// Runs one CLI command. The returned value is the process exit code on success.
pub fn dispatch(command: Command, ctx: &mut CommandContext) -> Result<i32, AppError> {
    info!(trace_id = %ctx.trace_id, command = ?command, "dispatch");
    match command {
        Command::List => list_devices(ctx).map(|_| 0),
        Command::Discover => discover(ctx).map(|_| 0),
        Command::Connect(args) => connect(ctx, args.ip.as_deref()).map(|_| 0),
        Command::Disconnect(args) => disconnect(ctx, args.ip.as_deref()).map(|_| 0),
        Command::EnableWireless(args) => enable_wireless(ctx, args.device.as_deref()).map(|_| 0),
        Command::Info(args) => device_info(ctx, args.device.as_deref()).map(|_| 0),
        Command::Qr(args) => show_qr(ctx, args.device.as_deref()).map(|_| 0),
        Command::ExpoStart(args) => expo_start(ctx, args.device.as_deref()),
    }
}

/// Lists devices and fills model/version/manufacturer with one batched `getprop` per device.
pub fn fetch_devices(ctx: &CommandContext) -> Result<Vec<Device>, AppError> {
    let bridge = ctx.bridge()?;
    let mut devices = bridge.list_devices()?;
    if !devices.iter().any(|device| device.status.is_online()) {
        return Ok(devices);
    }

    let semaphore = Arc::new(GlobalSemaphore::new(
        ctx.store.config.discovery.max_concurrent_probes,
    ));
    let slots: Arc<Vec<OnceLock<Device>>> =
        Arc::new((0..devices.len()).map(|_| OnceLock::new()).collect());

    let mut handles = Vec::new();
    for (index, device) in devices.iter().enumerate() {
        if !device.status.is_online() {
            continue;
        }
        let bridge = Arc::clone(&bridge);
        let semaphore = Arc::clone(&semaphore);
        let slots = Arc::clone(&slots);
        let trace_id = ctx.trace_id.clone();
        let mut device = device.clone();
        handles.push(std::thread::spawn(move || {
            let _permit = semaphore.acquire();
            match bridge.get_properties(&device.serial) {
                Ok(props) => apply_device_properties(&mut device, &props),
                Err(err) => {
                    warn!(trace_id = %trace_id, serial = %device.serial, error = %err.error, "failed to read device properties");
                }
            }
            let _ = slots[index].set(device);
        }));
    }

    for handle in handles {
        if handle.join().is_err() {
            warn!(trace_id = %ctx.trace_id, "device detail thread panicked");
        }
    }

    for (index, device) in devices.iter_mut().enumerate() {
        if let Some(enriched) = slots[index].get() {
            *device = enriched.clone();
        }
    }
    Ok(devices)
}

pub fn list_devices(ctx: &mut CommandContext) -> Result<Vec<Device>, AppError> {
    let devices = fetch_devices(ctx)?;
    print_output(&render_devices(&devices));
    Ok(devices)
}

pub fn discover(ctx: &mut CommandContext) -> Result<(), AppError> {
    let [a, b, c, _] = ctx.local_ip.octets();
    ctx.prompter
        .notice(&format!("Scanning {a}.{b}.{c}.0/24 for adb devices..."));
    let options = SweepOptions::from(&ctx.store.config.discovery);
    let hosts = sweep_subnet(ctx.bridge()?, ctx.local_ip, &options, &ctx.trace_id)?;
    print_output(&render_hosts(&hosts));
    Ok(())
}

/// Asks for an address until the input parses.
pub fn prompt_manual_address(ctx: &CommandContext) -> Result<String, AppError> {
    loop {
        let value = ctx.prompter.input_address("Device IP address")?;
        match normalize_address(&value, DEFAULT_ADB_PORT) {
            Ok(address) => return Ok(address),
            Err(message) => ctx.prompter.notice(&message),
        }
    }
}

fn choose_connect_target(ctx: &CommandContext) -> Result<String, AppError> {
    let known = &ctx.store.config.known_devices;
    if known.is_empty() {
        return prompt_manual_address(ctx);
    }
    ctx.prompter.notice(&render_known_devices(known));
    let mut items: Vec<String> = known
        .iter()
        .map(|device| {
            let label = if device.model.is_empty() {
                device.id.as_str()
            } else {
                device.model.as_str()
            };
            format!("{label} ({})", device.ip)
        })
        .collect();
    items.push(MANUAL_ENTRY.to_string());

    let choice = ctx.prompter.select("Select a device to connect", &items)?;
    match known.get(choice) {
        Some(device) => normalize_address(&device.ip, DEFAULT_ADB_PORT)
            .map_err(|message| AppError::validation(message, &ctx.trace_id)),
        None => prompt_manual_address(ctx),
    }
}

fn known_id_for(ctx: &CommandContext, address: &str) -> String {
    ctx.store
        .config
        .known_devices
        .iter()
        .find(|device| device.ip == address)
        .map(|device| device.id.clone())
        .unwrap_or_else(|| address.to_string())
}

pub fn connect(ctx: &mut CommandContext, ip: Option<&str>) -> Result<KnownDevice, AppError> {
    let address = match ip {
        Some(value) => normalize_address(value, DEFAULT_ADB_PORT)
            .map_err(|message| AppError::validation(message, &ctx.trace_id))?,
        None => choose_connect_target(ctx)?,
    };
    let bridge = ctx.bridge()?;
    let message = bridge.connect(&address, ctx.connect_timeout())?;
    print_success(&message);

    let model = bridge
        .get_property(&address, PROP_MODEL)
        .unwrap_or_else(|err| {
            warn!(trace_id = %ctx.trace_id, address = %address, error = %err.error, "failed to read model");
            String::new()
        });
    let record = KnownDevice {
        id: known_id_for(ctx, &address),
        ip: address,
        model,
        last_connected: now_timestamp(),
    };
    ctx.store.record_device(record.clone(), &ctx.trace_id)?;
    Ok(record)
}

pub fn disconnect(ctx: &mut CommandContext, ip: Option<&str>) -> Result<String, AppError> {
    let bridge = ctx.bridge()?;
    let address = match ip {
        Some(value) => normalize_address(value, DEFAULT_ADB_PORT)
            .map_err(|message| AppError::validation(message, &ctx.trace_id))?,
        None => {
            let wireless: Vec<Device> = bridge
                .list_devices()?
                .into_iter()
                .filter(Device::is_wireless)
                .collect();
            match wireless.len() {
                0 => {
                    return Err(AppError::device(
                        "No wireless devices are connected",
                        &ctx.trace_id,
                    ))
                }
                1 => wireless[0].serial.clone(),
                _ => {
                    let items: Vec<String> =
                        wireless.iter().map(|device| device.serial.clone()).collect();
                    let choice = ctx.prompter.select("Select a device to disconnect", &items)?;
                    items
                        .get(choice)
                        .cloned()
                        .ok_or_else(|| AppError::validation("Invalid selection", &ctx.trace_id))?
                }
            }
        }
    };
    let message = bridge.disconnect(&address)?;
    print_success(&message);
    Ok(address)
}

/// Finds `requested` in the listing, or picks among online devices accepted by `eligible`.
pub fn resolve_device(
    ctx: &CommandContext,
    requested: Option<&str>,
    eligible: impl Fn(&Device) -> bool,
) -> Result<Device, AppError> {
    let devices = ctx.bridge()?.list_devices()?;
    if let Some(serial) = requested {
        let device = devices
            .into_iter()
            .find(|device| device.serial == serial)
            .ok_or_else(|| {
                AppError::device(
                    format!("Device {serial} not found. Run `wireless_adb list` to see connected devices."),
                    &ctx.trace_id,
                )
            })?;
        if !device.status.is_online() {
            return Err(AppError::device(
                format!("Device {serial} is {}", device.status),
                &ctx.trace_id,
            ));
        }
        return Ok(device);
    }

    let mut candidates: Vec<Device> = devices
        .into_iter()
        .filter(|device| device.status.is_online() && eligible(device))
        .collect();
    match candidates.len() {
        0 => Err(AppError::device("No suitable devices connected", &ctx.trace_id)),
        1 => Ok(candidates.remove(0)),
        _ => {
            let items: Vec<String> = candidates
                .iter()
                .map(|device| match &device.model {
                    Some(model) => format!("{} ({model})", device.serial),
                    None => device.serial.clone(),
                })
                .collect();
            let choice = ctx.prompter.select("Select a device", &items)?;
            if choice >= candidates.len() {
                return Err(AppError::validation("Invalid selection", &ctx.trace_id));
            }
            Ok(candidates.swap_remove(choice))
        }
    }
}

/// Android 11+ exposes the Wi-Fi address through the route table; older builds through `ip addr`.
pub fn resolve_wifi_ip(
    bridge: &dyn BridgeClient,
    serial: &str,
    android_version: Option<&str>,
    trace_id: &str,
) -> Result<Ipv4Addr, AppError> {
    let use_route = android_version
        .and_then(parse_android_major)
        .map_or(true, |major| major >= 11);
    let address = if use_route {
        parse_wifi_ip_from_route(&bridge.run_shell(serial, WIFI_ROUTE_COMMAND)?)
    } else {
        parse_wifi_ip_from_addr(&bridge.run_shell(serial, WIFI_ADDR_COMMAND)?)
    };
    address.ok_or_else(|| AppError::parse(WIFI_IP_MISSING, trace_id))
}

/// Puts a USB device into tcpip mode, connects to it and records it. Returns `ip:port`.
fn switch_to_wireless(ctx: &mut CommandContext, device: &Device) -> Result<String, AppError> {
    let bridge = ctx.bridge()?;
    let props = bridge.get_properties(&device.serial)?;
    let android_version = props.get(PROP_RELEASE).map(String::as_str);
    let ip = resolve_wifi_ip(bridge.as_ref(), &device.serial, android_version, &ctx.trace_id)?;

    let port = DEFAULT_ADB_PORT;
    bridge.enable_tcp_mode(&device.serial, port)?;
    if !ctx.tcpip_settle.is_zero() {
        std::thread::sleep(ctx.tcpip_settle);
    }
    let address = format!("{ip}:{port}");
    let message = bridge.connect(&address, ctx.connect_timeout())?;
    print_success(&message);

    let model = props
        .get(PROP_MODEL)
        .cloned()
        .or_else(|| device.model.clone())
        .unwrap_or_default();
    ctx.store.record_device(
        KnownDevice {
            id: device.serial.clone(),
            ip: address.clone(),
            model,
            last_connected: now_timestamp(),
        },
        &ctx.trace_id,
    )?;
    info!(trace_id = %ctx.trace_id, serial = %device.serial, address = %address, "wireless debugging enabled");
    Ok(address)
}

pub fn enable_wireless(ctx: &mut CommandContext, device_id: Option<&str>) -> Result<String, AppError> {
    let device = resolve_device(ctx, device_id, |device| !device.is_wireless())?;
    if device.is_wireless() {
        print_success(&format!("{} is already connected over Wi-Fi", device.serial));
        return Ok(device.serial);
    }
    switch_to_wireless(ctx, &device)
}

pub fn collect_device_detail(ctx: &CommandContext, device: &Device) -> Result<DeviceDetail, AppError> {
    let bridge = ctx.bridge()?;
    let props = bridge.get_properties(&device.serial)?;
    let mut detail = build_device_detail(&device.serial, &props);

    detail.wifi_address = if device.is_wireless() {
        device.serial.split(':').next().map(str::to_string)
    } else {
        resolve_wifi_ip(
            bridge.as_ref(),
            &device.serial,
            detail.android_version.as_deref(),
            &ctx.trace_id,
        )
        .map(|ip| ip.to_string())
        .ok()
    };

    detail.dev_processes = match bridge.run_shell(&device.serial, PROCESS_LIST_COMMAND) {
        Ok(output) => parse_dev_processes(&output),
        Err(err) => {
            warn!(trace_id = %ctx.trace_id, serial = %device.serial, error = %err.error, "process listing failed");
            Vec::new()
        }
    };
    detail.dev_packages = match bridge.run_shell(&device.serial, PACKAGE_LIST_COMMAND) {
        Ok(output) => parse_dev_packages(&output),
        Err(err) => {
            warn!(trace_id = %ctx.trace_id, serial = %device.serial, error = %err.error, "package listing failed");
            Vec::new()
        }
    };
    Ok(detail)
}

pub fn device_info(ctx: &mut CommandContext, device_id: Option<&str>) -> Result<DeviceDetail, AppError> {
    let device = resolve_device(ctx, device_id, |_| true)?;
    let detail = collect_device_detail(ctx, &device)?;
    print_output(&render_detail(&detail));
    Ok(detail)
}

fn dev_server_command(ctx: &CommandContext) -> Result<DevServerCommand, AppError> {
    build_dev_server_command(&ctx.store.config.dev_server, ctx.local_ip)
        .map_err(|message| AppError::validation(message, &ctx.trace_id))
}

/// URI of the dev server `command` starts, reachable from devices on the LAN.
pub fn dev_server_uri(ctx: &CommandContext, command: &DevServerCommand) -> String {
    connection_uri(
        &ctx.store.config.dev_server.scheme,
        &ctx.local_ip.to_string(),
        command.port,
    )
}

pub fn show_qr(ctx: &mut CommandContext, device_id: Option<&str>) -> Result<String, AppError> {
    if device_id.is_some() {
        resolve_device(ctx, device_id, |_| true)?;
    }
    if ctx.local_ip.is_loopback() {
        warn!(trace_id = %ctx.trace_id, "no network address found, QR code points at loopback");
    }
    let uri = dev_server_uri(ctx, &dev_server_command(ctx)?);
    print_output(&render_qr(&uri, &ctx.trace_id)?);
    print_output(&uri);
    Ok(uri)
}

pub fn expo_start(ctx: &mut CommandContext, device_id: Option<&str>) -> Result<i32, AppError> {
    let device = resolve_device(ctx, device_id, |_| true)?;
    if !device.is_wireless() {
        switch_to_wireless(ctx, &device)?;
    }
    let command = dev_server_command(ctx)?;
    ctx.prompter.notice(&format!(
        "Starting dev server at {}",
        dev_server_uri(ctx, &command)
    ));
    launch_dev_server(&command, &ctx.trace_id)
}
