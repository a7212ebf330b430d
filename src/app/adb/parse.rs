use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::app::models::{Device, DeviceDetail, DeviceStatus};

pub const PROP_MANUFACTURER: &str = "ro.product.manufacturer";
pub const PROP_BRAND: &str = "ro.product.brand";
pub const PROP_MODEL: &str = "ro.product.model";
pub const PROP_RELEASE: &str = "ro.build.version.release";
pub const PROP_SDK: &str = "ro.build.version.sdk";
pub const PROP_FINGERPRINT: &str = "ro.build.fingerprint";

/// Substrings that mark a process or package as part of a JS/mobile dev toolchain.
const DEV_KEYWORDS: &[&str] = &[
    "expo",
    "exponent",
    "reactnative",
    "react-native",
    "facebook.react",
    "metro",
    "hermes",
    "flutter",
];

pub fn parse_adb_devices(output: &str) -> Vec<Device> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.trim_start().starts_with('*'))
        .filter(|line| !line.to_lowercase().contains("list of devices"))
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 2 {
                return None;
            }
            let mut device = Device::new(tokens[0], DeviceStatus::from_adb(tokens[1]));
            // `no permissions (...)` spans several tokens; keep the state readable.
            if tokens[1] == "no" && tokens.get(2) == Some(&"permissions") {
                device.status = DeviceStatus::Unknown("no permissions".to_string());
            }
            for token in tokens.iter().skip(2) {
                if let Some(value) = token.strip_prefix("model:") {
                    device.model = Some(value.replace('_', " "));
                }
            }
            Some(device)
        })
        .collect()
}

pub fn parse_getprop_map(output: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in output.lines() {
        let trimmed = line.trim();
        if !trimmed.starts_with('[') {
            continue;
        }
        let Some((key_part, value_part)) = trimmed.split_once("]: [") else {
            continue;
        };
        let key = key_part.trim_start_matches('[').trim();
        let value = value_part.trim_end_matches(']').trim();
        if !key.is_empty() {
            map.insert(key.to_string(), value.to_string());
        }
    }
    map
}

fn non_empty(map: &HashMap<String, String>, key: &str) -> Option<String> {
    map.get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub fn apply_device_properties(device: &mut Device, getprop_map: &HashMap<String, String>) {
    if let Some(model) = non_empty(getprop_map, PROP_MODEL) {
        device.model = Some(model);
    }
    device.android_version = non_empty(getprop_map, PROP_RELEASE);
    device.manufacturer = non_empty(getprop_map, PROP_MANUFACTURER);
}

pub fn build_device_detail(serial: &str, getprop_map: &HashMap<String, String>) -> DeviceDetail {
    DeviceDetail {
        serial: serial.to_string(),
        manufacturer: non_empty(getprop_map, PROP_MANUFACTURER),
        brand: non_empty(getprop_map, PROP_BRAND),
        model: non_empty(getprop_map, PROP_MODEL),
        android_version: non_empty(getprop_map, PROP_RELEASE),
        api_level: non_empty(getprop_map, PROP_SDK),
        build_fingerprint: non_empty(getprop_map, PROP_FINGERPRINT),
        ..DeviceDetail::default()
    }
}

/// `"11"`, `"8.1.0"` and `"14"` all yield their major number.
pub fn parse_android_major(version: &str) -> Option<u32> {
    version.trim().split('.').next()?.trim().parse::<u32>().ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected(String),
    Failed(String),
}

/// adb exits 0 even when it prints `failed to connect`, so the text decides.
pub fn parse_connect_output(stdout: &str, stderr: &str) -> ConnectOutcome {
    let message = format!("{} {}", stdout.trim(), stderr.trim()).trim().to_string();
    let lowered = message.to_lowercase();
    let failed = ["failed", "unable", "cannot", "error", "refused"]
        .iter()
        .any(|marker| lowered.contains(marker));
    if !failed && lowered.contains("connected to") {
        ConnectOutcome::Connected(message)
    } else {
        ConnectOutcome::Failed(message)
    }
}

pub fn parse_disconnect_output(stdout: &str, stderr: &str) -> Result<String, String> {
    let message = format!("{} {}", stdout.trim(), stderr.trim()).trim().to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("disconnected") && !lowered.contains("error") {
        Ok(message)
    } else {
        Err(message)
    }
}

/// Reads the `src` address of the `wlan*` route from `ip route` output.
pub fn parse_wifi_ip_from_route(output: &str) -> Option<Ipv4Addr> {
    output
        .lines()
        .filter(|line| line.contains("wlan"))
        .find_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            tokens
                .windows(2)
                .find(|pair| pair[0] == "src")
                .and_then(|pair| pair[1].parse::<Ipv4Addr>().ok())
        })
}

/// Reads the first `inet A.B.C.D/NN` from `ip -f inet addr show wlan0` output.
pub fn parse_wifi_ip_from_addr(output: &str) -> Option<Ipv4Addr> {
    output.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("inet ")?;
        let address = rest.split(['/', ' ']).next()?;
        address.parse::<Ipv4Addr>().ok()
    })
}

fn is_dev_related(name: &str) -> bool {
    let lowered = name.to_lowercase();
    DEV_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

/// Process names (last column of `ps -A`) that belong to a dev toolchain.
pub fn parse_dev_processes(output: &str) -> Vec<String> {
    let mut names: Vec<String> = output
        .lines()
        .filter(|line| !line.trim_start().starts_with("USER"))
        .filter_map(|line| line.split_whitespace().last())
        .filter(|name| is_dev_related(name))
        .map(str::to_string)
        .collect();
    names.sort();
    names.dedup();
    names
}

pub fn parse_dev_packages(output: &str) -> Vec<String> {
    let mut names: Vec<String> = output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .map(|payload| payload.rsplit_once('=').map_or(payload, |(_, pkg)| pkg).trim())
        .filter(|name| !name.is_empty() && is_dev_related(name))
        .map(str::to_string)
        .collect();
    names.sort();
    names.dedup();
    names
}
