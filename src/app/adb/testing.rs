use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::app::adb::client::BridgeClient;
use crate::app::error::AppError;
use crate::app::models::Device;

/// In-memory adb: canned listing, reachable addresses and shell replies, with a call log.
#[derive(Default)]
pub struct FakeBridge {
    pub listing: Vec<Device>,
    pub list_fails: bool,
    pub reachable: HashSet<String>,
    pub properties: HashMap<String, HashMap<String, String>>,
    pub shell: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
    list_calls: AtomicUsize,
}

impl FakeBridge {
    pub fn with_listing(listing: Vec<Device>) -> Self {
        Self {
            listing,
            ..Self::default()
        }
    }

    /// `list_devices` fails as if adb were missing.
    pub fn failing_listing() -> Self {
        Self {
            list_fails: true,
            ..Self::default()
        }
    }

    pub fn reachable(mut self, addresses: &[&str]) -> Self {
        self.reachable
            .extend(addresses.iter().map(|address| address.to_string()));
        self
    }

    pub fn property(mut self, serial: &str, key: &str, value: &str) -> Self {
        self.properties
            .entry(serial.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn shell_reply(mut self, command: &str, output: &str) -> Self {
        self.shell.insert(command.to_string(), output.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls").clone()
    }

    /// Arguments of every logged call to `operation`.
    pub fn calls_to(&self, operation: &str) -> Vec<String> {
        let prefix = format!("{operation} ");
        self.calls()
            .into_iter()
            .filter_map(|call| call.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn log(&self, call: String) {
        self.calls.lock().expect("calls").push(call);
    }
}

impl BridgeClient for FakeBridge {
    fn list_devices(&self) -> Result<Vec<Device>, AppError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.list_fails {
            return Err(AppError::environment("adb was not found on PATH", "trace"));
        }
        Ok(self.listing.clone())
    }

    fn connect(&self, address: &str, _timeout: Duration) -> Result<String, AppError> {
        self.log(format!("connect {address}"));
        if self.reachable.contains(address) {
            Ok(format!("connected to {address}"))
        } else {
            Err(AppError::system("Command timed out after 500 ms", "trace"))
        }
    }

    fn disconnect(&self, address: &str) -> Result<String, AppError> {
        self.log(format!("disconnect {address}"));
        Ok(format!("disconnected {address}"))
    }

    fn get_property(&self, serial: &str, key: &str) -> Result<String, AppError> {
        self.log(format!("getprop {serial} {key}"));
        Ok(self
            .properties
            .get(serial)
            .and_then(|props| props.get(key))
            .cloned()
            .unwrap_or_default())
    }

    fn get_properties(&self, serial: &str) -> Result<HashMap<String, String>, AppError> {
        self.log(format!("getprops {serial}"));
        Ok(self.properties.get(serial).cloned().unwrap_or_default())
    }

    fn run_shell(&self, serial: &str, command: &str) -> Result<String, AppError> {
        self.log(format!("shell {serial} {command}"));
        Ok(self.shell.get(command).cloned().unwrap_or_default())
    }

    fn enable_tcp_mode(&self, serial: &str, port: u16) -> Result<(), AppError> {
        self.log(format!("tcpip {serial} {port}"));
        Ok(())
    }
}
