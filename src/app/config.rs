use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};

use crate::app::error::AppError;
use crate::app::models::KnownDevice;

pub const CONFIG_PATH_ENV: &str = "WIRELESS_ADB_CONFIG_PATH";
const CONFIG_DIR_NAME: &str = "wireless_adb";
const CONFIG_FILE_NAME: &str = "config.json";
const BACKUP_FILE_NAME: &str = "config.backup.json";

pub const DEFAULT_ADB_PORT: u16 = 5555;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AdbSettings {
    pub command_path: String,
    pub command_timeout_secs: u64,
}

impl Default for AdbSettings {
    fn default() -> Self {
        Self {
            command_path: String::new(),
            command_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscoverySettings {
    pub port: u16,
    pub probe_timeout_ms: u64,
    pub max_concurrent_probes: usize,
    pub disconnect_probed: bool,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_ADB_PORT,
            probe_timeout_ms: 500,
            max_concurrent_probes: 64,
            disconnect_probed: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DevServerSettings {
    pub command: String,
    pub scheme: String,
    pub port: u16,
}

impl Default for DevServerSettings {
    fn default() -> Self {
        Self {
            command: "npx expo start".to_string(),
            scheme: "exp".to_string(),
            port: 8081,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub known_devices: Vec<KnownDevice>,
    #[serde(default)]
    pub adb: AdbSettings,
    #[serde(default)]
    pub discovery: DiscoverySettings,
    #[serde(default)]
    pub dev_server: DevServerSettings,
}

impl AppConfig {
    /// Replaces the record sharing `id` or `ip` with `device`, otherwise appends it.
    pub fn upsert_known_device(&mut self, device: KnownDevice) {
        if let Some(existing) = self
            .known_devices
            .iter_mut()
            .find(|known| known.id == device.id || (!device.ip.is_empty() && known.ip == device.ip))
        {
            *existing = device;
        } else {
            self.known_devices.push(device);
        }
    }
}

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

pub fn backup_config_path(path: &Path) -> PathBuf {
    path.with_file_name(BACKUP_FILE_NAME)
}

/// A missing or unreadable file yields defaults; the store is never fatal to load.
pub fn load_config_from_path(path: &Path, trace_id: &str) -> AppConfig {
    if !path.exists() {
        return AppConfig::default();
    }
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(trace_id = %trace_id, path = %path.display(), error = %err, "failed to read config, using defaults");
            return AppConfig::default();
        }
    };
    match serde_json::from_str::<AppConfig>(&raw) {
        Ok(config) => validate_config(config),
        Err(err) => {
            warn!(trace_id = %trace_id, path = %path.display(), error = %err, "config is not valid JSON, using defaults");
            AppConfig::default()
        }
    }
}

pub fn save_config_to_path(config: &AppConfig, path: &Path, trace_id: &str) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                AppError::system(format!("Failed to create config directory: {err}"), trace_id)
            })?;
        }
    }
    if path.exists() {
        let _ = fs::copy(path, backup_config_path(path));
    }
    let payload = serde_json::to_string_pretty(config)
        .map_err(|err| AppError::system(format!("Failed to serialize config: {err}"), trace_id))?;
    fs::write(path, payload)
        .map_err(|err| AppError::system(format!("Failed to write config: {err}"), trace_id))?;
    info!(trace_id = %trace_id, path = %path.display(), known_devices = config.known_devices.len(), "config saved");
    Ok(())
}

fn validate_config(mut config: AppConfig) -> AppConfig {
    let defaults = AppConfig::default();
    if config.adb.command_timeout_secs == 0 {
        config.adb.command_timeout_secs = defaults.adb.command_timeout_secs;
    }
    if config.discovery.port == 0 {
        config.discovery.port = defaults.discovery.port;
    }
    if config.discovery.probe_timeout_ms == 0 {
        config.discovery.probe_timeout_ms = defaults.discovery.probe_timeout_ms;
    }
    if config.discovery.max_concurrent_probes == 0 {
        config.discovery.max_concurrent_probes = defaults.discovery.max_concurrent_probes;
    }
    if config.dev_server.port == 0 {
        config.dev_server.port = defaults.dev_server.port;
    }
    if config.dev_server.scheme.trim().is_empty() {
        config.dev_server.scheme = defaults.dev_server.scheme;
    }
    if config.dev_server.command.trim().is_empty() {
        config.dev_server.command = defaults.dev_server.command;
    }
    config
}

/// The preference store: the loaded config plus the file it came from.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    pub config: AppConfig,
}

impl ConfigStore {
    pub fn load(path: PathBuf, trace_id: &str) -> Self {
        let config = load_config_from_path(&path, trace_id);
        Self { path, config }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, trace_id: &str) -> Result<(), AppError> {
        save_config_to_path(&self.config, &self.path, trace_id)
    }

    pub fn record_device(&mut self, device: KnownDevice, trace_id: &str) -> Result<(), AppError> {
        self.config.upsert_known_device(device);
        self.save(trace_id)
    }
}
