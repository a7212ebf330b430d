pub mod app;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, info};

use app::adb::client::{AdbClient, BridgeClient};
use app::adb::locator::{locate_adb_program, resolve_adb_program};
use app::cli::Cli;
use app::commands::{dispatch, resolve_trace_id, CommandContext};
use app::config::{config_path, ConfigStore};
use app::error::AppError;
use app::logging::init_logging;
use app::network::local_ipv4_or_loopback;
use app::output::print_error;
use app::prompt::TerminalPrompter;

fn build_bridge(cli: &Cli, store: &ConfigStore, trace_id: &str) -> Result<Arc<dyn BridgeClient>, AppError> {
    let program = resolve_adb_program(cli.global.adb.as_deref(), &store.config.adb.command_path);
    let located = locate_adb_program(&program)
        .map_err(|message| AppError::environment(message, trace_id))?;
    let client = AdbClient::new(
        located,
        Duration::from_secs(store.config.adb.command_timeout_secs),
        trace_id,
    );
    debug!(trace_id = %trace_id, program = %client.program(), "using adb");
    Ok(Arc::new(client))
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let trace_id = resolve_trace_id(None);
    let path = cli.global.config.clone().unwrap_or_else(config_path);
    let store = ConfigStore::load(path, &trace_id);
    let bridge = if cli.command.needs_adb() {
        build_bridge(&cli, &store, &trace_id)
    } else {
        Err(AppError::environment("adb is not used by this command", &trace_id))
    };
    let local_ip = local_ipv4_or_loopback();
    info!(trace_id = %trace_id, local_ip = %local_ip, "starting");

    let mut ctx = CommandContext::new(
        trace_id.clone(),
        store,
        bridge,
        local_ip,
        Box::new(TerminalPrompter::new(trace_id)),
    );
    match dispatch(cli.command, &mut ctx) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            print_error(&err);
            ExitCode::from(err.exit_code())
        }
    }
}
