use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info};

use crate::app::adb::parse::{
    parse_adb_devices, parse_connect_output, parse_disconnect_output, parse_getprop_map,
    ConnectOutcome,
};
use crate::app::adb::runner::{run_command_with_timeout, CommandOutput};
use crate::app::error::AppError;
use crate::app::models::Device;

/// The operations the CLI needs from adb. Implemented by [`AdbClient`]; tests substitute fakes.
pub trait BridgeClient: Send + Sync {
    fn list_devices(&self) -> Result<Vec<Device>, AppError>;

    /// Returns adb's confirmation message when the connection is established.
    fn connect(&self, address: &str, timeout: Duration) -> Result<String, AppError>;

    fn disconnect(&self, address: &str) -> Result<String, AppError>;

    fn get_property(&self, serial: &str, key: &str) -> Result<String, AppError>;

    /// All properties in one `getprop` call.
    fn get_properties(&self, serial: &str) -> Result<HashMap<String, String>, AppError>;

    fn run_shell(&self, serial: &str, command: &str) -> Result<String, AppError>;

    fn enable_tcp_mode(&self, serial: &str, port: u16) -> Result<(), AppError>;
}

#[derive(Debug, Clone)]
pub struct AdbClient {
    program: String,
    timeout: Duration,
    trace_id: String,
}

impl AdbClient {
    pub fn new(program: impl Into<String>, timeout: Duration, trace_id: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout,
            trace_id: trace_id.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn run(&self, args: &[String], timeout: Duration) -> Result<CommandOutput, AppError> {
        run_command_with_timeout(&self.program, args, timeout, &self.trace_id)
    }

    fn run_checked(&self, args: Vec<String>, step: &str) -> Result<CommandOutput, AppError> {
        let output = self.run(&args, self.timeout)?;
        if !output.success() {
            return Err(AppError::dependency(
                format!("adb {step} failed: {}", output.detail()),
                &self.trace_id,
            ));
        }
        Ok(output)
    }

    fn shell_args(serial: &str, command: &str) -> Vec<String> {
        vec![
            "-s".to_string(),
            serial.to_string(),
            "shell".to_string(),
            command.to_string(),
        ]
    }
}

impl BridgeClient for AdbClient {
    fn list_devices(&self) -> Result<Vec<Device>, AppError> {
        let output = self.run_checked(vec!["devices".to_string(), "-l".to_string()], "devices")?;
        let devices = parse_adb_devices(&output.stdout);
        debug!(trace_id = %self.trace_id, count = devices.len(), "adb devices");
        Ok(devices)
    }

    fn connect(&self, address: &str, timeout: Duration) -> Result<String, AppError> {
        let args = vec!["connect".to_string(), address.to_string()];
        let output = self.run(&args, timeout)?;
        match parse_connect_output(&output.stdout, &output.stderr) {
            ConnectOutcome::Connected(message) if output.success() => {
                info!(trace_id = %self.trace_id, address = %address, "adb connect succeeded");
                Ok(message)
            }
            ConnectOutcome::Connected(message) | ConnectOutcome::Failed(message) => Err(
                AppError::dependency(format!("adb connect failed: {message}"), &self.trace_id),
            ),
        }
    }

    fn disconnect(&self, address: &str) -> Result<String, AppError> {
        let args = vec!["disconnect".to_string(), address.to_string()];
        let output = self.run(&args, self.timeout)?;
        parse_disconnect_output(&output.stdout, &output.stderr).map_err(|message| {
            AppError::dependency(format!("adb disconnect failed: {message}"), &self.trace_id)
        })
    }

    fn get_property(&self, serial: &str, key: &str) -> Result<String, AppError> {
        let output = self.run_checked(Self::shell_args(serial, &format!("getprop {key}")), "getprop")?;
        Ok(output.stdout.trim().to_string())
    }

    fn get_properties(&self, serial: &str) -> Result<HashMap<String, String>, AppError> {
        let output = self.run_checked(Self::shell_args(serial, "getprop"), "getprop")?;
        Ok(parse_getprop_map(&output.stdout))
    }

    fn run_shell(&self, serial: &str, command: &str) -> Result<String, AppError> {
        let output = self.run_checked(Self::shell_args(serial, command), "shell")?;
        Ok(output.stdout)
    }

    fn enable_tcp_mode(&self, serial: &str, port: u16) -> Result<(), AppError> {
        let args = vec![
            "-s".to_string(),
            serial.to_string(),
            "tcpip".to_string(),
            port.to_string(),
        ];
        let output = self.run_checked(args, "tcpip")?;
        info!(trace_id = %self.trace_id, serial = %serial, port, detail = %output.detail(), "tcpip mode enabled");
        Ok(())
    }
}
