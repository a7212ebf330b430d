use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Device,
    Offline,
    Unauthorized,
    /// Anything else adb reports (`recovery`, `no permissions`, ...), kept verbatim.
    Unknown(String),
}

impl DeviceStatus {
    pub fn from_adb(state: &str) -> Self {
        match state {
            "device" => Self::Device,
            "offline" => Self::Offline,
            "unauthorized" => Self::Unauthorized,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, Self::Device)
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device => f.write_str("device"),
            Self::Offline => f.write_str("offline"),
            Self::Unauthorized => f.write_str("unauthorized"),
            Self::Unknown(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Device {
    pub serial: String,
    pub status: DeviceStatus,
    pub model: Option<String>,
    pub android_version: Option<String>,
    pub manufacturer: Option<String>,
}

fn wireless_serial_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}:\d+").expect("static regex is valid")
    })
}

impl Device {
    pub fn new(serial: impl Into<String>, status: DeviceStatus) -> Self {
        Self {
            serial: serial.into(),
            status,
            model: None,
            android_version: None,
            manufacturer: None,
        }
    }

    /// Network transports are listed as `address:port`.
    pub fn is_wireless(&self) -> bool {
        wireless_serial_re().is_match(&self.serial)
    }

    /// True when this listing entry is the adb transport for `address`.
    pub fn matches_address(&self, address: Ipv4Addr) -> bool {
        let address = address.to_string();
        self.serial == address
            || self
                .serial
                .strip_prefix(address.as_str())
                .is_some_and(|rest| rest.starts_with(':'))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Connected,
    Discoverable,
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("connected"),
            Self::Discoverable => f.write_str("discoverable"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveredHost {
    pub address: Ipv4Addr,
    pub status: HostStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KnownDevice {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub last_connected: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DeviceDetail {
    pub serial: String,
    pub manufacturer: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub android_version: Option<String>,
    pub api_level: Option<String>,
    pub build_fingerprint: Option<String>,
    pub wifi_address: Option<String>,
    pub dev_processes: Vec<String>,
    pub dev_packages: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wireless_flag_follows_serial_shape() {
        assert!(Device::new("192.168.1.12:5555", DeviceStatus::Device).is_wireless());
        assert!(!Device::new("emulator-5554", DeviceStatus::Device).is_wireless());
        assert!(!Device::new("0123456789ABCDEF", DeviceStatus::Device).is_wireless());
    }

    #[test]
    fn address_match_does_not_accept_prefix_of_other_host() {
        let device = Device::new("192.168.1.12:5555", DeviceStatus::Device);
        assert!(device.matches_address(Ipv4Addr::new(192, 168, 1, 12)));
        assert!(!device.matches_address(Ipv4Addr::new(192, 168, 1, 1)));
        assert!(!device.matches_address(Ipv4Addr::new(192, 168, 1, 123)));
    }

    #[test]
    fn maps_unknown_states_verbatim() {
        assert_eq!(DeviceStatus::from_adb("device"), DeviceStatus::Device);
        assert_eq!(
            DeviceStatus::from_adb("recovery"),
            DeviceStatus::Unknown("recovery".to_string())
        );
        assert_eq!(DeviceStatus::from_adb("recovery").to_string(), "recovery");
    }
}
