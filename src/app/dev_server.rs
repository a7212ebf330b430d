use std::net::Ipv4Addr;
use std::process::{Command, Stdio};

use tracing::info;

use crate::app::config::DevServerSettings;
use crate::app::error::AppError;

pub const PACKAGER_HOSTNAME_ENV: &str = "REACT_NATIVE_PACKAGER_HOSTNAME";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevServerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    /// Port the packager listens on, whether given in the command line or appended.
    pub port: u16,
}

/// Port passed as `--port N`, `--port=N` or `-p N`, if any.
fn explicit_port(args: &[String]) -> Result<Option<u16>, String> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let value = if arg == "--port" || arg == "-p" {
            iter.next().map(String::as_str)
        } else if let Some(value) = arg.strip_prefix("--port=") {
            Some(value)
        } else {
            continue;
        };
        return match value.and_then(|value| value.parse::<u16>().ok()) {
            Some(port) if port != 0 => Ok(Some(port)),
            _ => Err(format!("devServer.command has an invalid {arg} value")),
        };
    }
    Ok(None)
}

/// Splits the configured command line and binds the packager to `host`.
pub fn build_dev_server_command(
    settings: &DevServerSettings,
    host: Ipv4Addr,
) -> Result<DevServerCommand, String> {
    let mut parts = settings.command.split_whitespace().map(str::to_string);
    let program = parts
        .next()
        .ok_or_else(|| "devServer.command is empty".to_string())?;
    let mut args: Vec<String> = parts.collect();
    let port = match explicit_port(&args)? {
        Some(port) => port,
        None => {
            args.push("--port".to_string());
            args.push(settings.port.to_string());
            settings.port
        }
    };
    Ok(DevServerCommand {
        program,
        args,
        envs: vec![(PACKAGER_HOSTNAME_ENV.to_string(), host.to_string())],
        port,
    })
}

/// Runs the dev server in the foreground and returns its exit code.
pub fn launch_dev_server(command: &DevServerCommand, trace_id: &str) -> Result<i32, AppError> {
    info!(trace_id = %trace_id, program = %command.program, args = ?command.args, "launching dev server");
    let status = Command::new(&command.program)
        .args(&command.args)
        .envs(command.envs.iter().map(|(key, value)| (key.as_str(), value.as_str())))
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|err| {
            AppError::environment(
                format!("Failed to launch {}: {err}", command.program),
                trace_id,
            )
        })?;
    Ok(status.code().unwrap_or(1))
}
