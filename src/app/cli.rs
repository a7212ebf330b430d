//! Clap derive structures for the `wireless_adb` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// wireless_adb -- connect to Android devices over Wi-Fi
#[derive(Debug, Parser)]
#[command(
    name = "wireless_adb",
    version,
    about = "Discover, connect and inspect Android devices over the local network",
    long_about = "A thin layer over adb for wireless debugging.\n\n\
        Every device operation is performed by the adb executable; this tool\n\
        finds devices on the local /24, remembers them and renders the results.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to the adb executable (overrides adb.commandPath)
    #[arg(long, global = true)]
    pub adb: Option<String>,

    /// Path to the config file
    #[arg(long, env = "WIRELESS_ADB_CONFIG_PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List connected devices
    #[command(alias = "ls")]
    List,

    /// Scan the local /24 for devices listening for adb
    Discover,

    /// Connect to a device over Wi-Fi
    Connect(AddressArgs),

    /// Disconnect a wireless device
    Disconnect(AddressArgs),

    /// Switch a USB device to wireless debugging and connect to it
    EnableWireless(DeviceArgs),

    /// Show device properties and detected development tooling
    Info(DeviceArgs),

    /// Print a QR code with the dev server URI
    Qr(DeviceArgs),

    /// Enable wireless debugging if needed, then start the Expo dev server
    ExpoStart(DeviceArgs),
}

#[derive(Debug, Args)]
pub struct AddressArgs {
    /// Device address as ip[:port]; port defaults to 5555
    #[arg(short = 'i', long = "ip", value_name = "IP[:PORT]")]
    pub ip: Option<String>,
}

#[derive(Debug, Args)]
pub struct DeviceArgs {
    /// Device identifier as shown by `list`
    #[arg(short = 'd', long = "device", value_name = "DEVICE_ID")]
    pub device: Option<String>,
}

impl Command {
    /// `qr` without a device never touches adb.
    pub fn needs_adb(&self) -> bool {
        !matches!(self, Command::Qr(DeviceArgs { device: None }))
    }
}
