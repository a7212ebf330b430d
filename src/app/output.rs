//! Terminal rendering: tables, detail blocks, status lines and QR codes.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use qrcode::render::unicode;
use qrcode::QrCode;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::app::error::AppError;
use crate::app::models::{Device, DeviceDetail, DiscoveredHost, KnownDevice};

const MISSING: &str = "-";

fn should_color(is_terminal: bool) -> bool {
    is_terminal && std::env::var_os("NO_COLOR").is_none()
}

fn or_missing(value: Option<&str>) -> String {
    value
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(MISSING)
        .to_string()
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Android")]
    android: String,
    #[tabled(rename = "Manufacturer")]
    manufacturer: String,
    #[tabled(rename = "Wireless")]
    wireless: String,
}

impl From<&Device> for DeviceRow {
    fn from(device: &Device) -> Self {
        Self {
            id: device.serial.clone(),
            status: device.status.to_string(),
            model: or_missing(device.model.as_deref()),
            android: or_missing(device.android_version.as_deref()),
            manufacturer: or_missing(device.manufacturer.as_deref()),
            wireless: if device.is_wireless() { "yes" } else { "no" }.to_string(),
        }
    }
}

#[derive(Tabled)]
struct HostRow {
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Status")]
    status: String,
}

#[derive(Tabled)]
struct KnownDeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Address")]
    ip: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Last connected")]
    last_connected: String,
}

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn render_devices(devices: &[Device]) -> String {
    if devices.is_empty() {
        return "No devices connected.".to_string();
    }
    let rows: Vec<DeviceRow> = devices.iter().map(DeviceRow::from).collect();
    render_table(&rows)
}

pub fn render_hosts(hosts: &[DiscoveredHost]) -> String {
    if hosts.is_empty() {
        return "No devices found on the local network.".to_string();
    }
    let rows: Vec<HostRow> = hosts
        .iter()
        .map(|host| HostRow {
            ip: host.address.to_string(),
            status: host.status.to_string(),
        })
        .collect();
    render_table(&rows)
}

pub fn render_known_devices(devices: &[KnownDevice]) -> String {
    let rows: Vec<KnownDeviceRow> = devices
        .iter()
        .map(|device| KnownDeviceRow {
            id: device.id.clone(),
            ip: device.ip.clone(),
            model: or_missing(Some(device.model.as_str())),
            last_connected: or_missing(Some(device.last_connected.as_str())),
        })
        .collect();
    render_table(&rows)
}

pub fn render_detail(detail: &DeviceDetail) -> String {
    let fields = [
        ("Device", Some(detail.serial.as_str())),
        ("Manufacturer", detail.manufacturer.as_deref()),
        ("Brand", detail.brand.as_deref()),
        ("Model", detail.model.as_deref()),
        ("Android", detail.android_version.as_deref()),
        ("SDK", detail.api_level.as_deref()),
        ("Wi-Fi address", detail.wifi_address.as_deref()),
        ("Fingerprint", detail.build_fingerprint.as_deref()),
    ];
    let width = fields.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    let mut lines: Vec<String> = fields
        .iter()
        .map(|(label, value)| format!("{label:<width$}  {}", or_missing(*value)))
        .collect();

    lines.push(String::new());
    lines.push(section("Development processes", &detail.dev_processes));
    lines.push(section("Development packages", &detail.dev_packages));
    lines.join("\n")
}

fn section(title: &str, items: &[String]) -> String {
    if items.is_empty() {
        return format!("{title}: none detected");
    }
    let body = items
        .iter()
        .map(|item| format!("  - {item}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{title}:\n{body}")
}

pub fn connection_uri(scheme: &str, address: &str, port: u16) -> String {
    format!("{scheme}://{address}:{port}")
}

/// Renders `data` as a QR code using half-block characters, two modules per text row.
pub fn render_qr(data: &str, trace_id: &str) -> Result<String, AppError> {
    let code = QrCode::new(data.as_bytes())
        .map_err(|err| AppError::system(format!("Failed to encode QR code: {err}"), trace_id))?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

pub fn print_output(output: &str) {
    if output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

pub fn print_success(message: &str) {
    let mut stdout = io::stdout().lock();
    if should_color(io::stdout().is_terminal()) {
        let _ = writeln!(stdout, "{}", message.green());
    } else {
        let _ = writeln!(stdout, "{message}");
    }
}

pub fn print_error(err: &AppError) {
    let mut stderr = io::stderr().lock();
    if should_color(io::stderr().is_terminal()) {
        let _ = writeln!(stderr, "{} {}", "Error:".red().bold(), err.error);
    } else {
        let _ = writeln!(stderr, "Error: {}", err.error);
    }
}
