use std::env;
use std::path::{Path, PathBuf};

pub const ADB_PATH_ENV: &str = "WIRELESS_ADB_ADB_PATH";

pub fn normalize_command_path(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(inner) = trimmed
        .strip_prefix('"')
        .and_then(|candidate| candidate.strip_suffix('"'))
    {
        return inner.trim().to_string();
    }
    if let Some(inner) = trimmed
        .strip_prefix('\'')
        .and_then(|candidate| candidate.strip_suffix('\''))
    {
        return inner.trim().to_string();
    }
    trimmed.to_string()
}

/// First non-empty of: CLI override, env override, configured path; else bare `adb`.
pub fn resolve_adb_program(cli_override: Option<&str>, config_command_path: &str) -> String {
    let env_value = env::var(ADB_PATH_ENV).ok();
    let program = [cli_override, env_value.as_deref(), Some(config_command_path)]
        .into_iter()
        .flatten()
        .map(normalize_command_path)
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| "adb".to_string());
    program
}

fn executable_name() -> &'static str {
    if cfg!(windows) {
        "adb.exe"
    } else {
        "adb"
    }
}

fn sdk_candidates() -> Vec<PathBuf> {
    ["ANDROID_HOME", "ANDROID_SDK_ROOT"]
        .iter()
        .filter_map(|key| env::var_os(key))
        .map(|root| PathBuf::from(root).join("platform-tools").join(executable_name()))
        .collect()
}

fn search_path(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Turns the resolved program into something spawnable, or explains why adb is missing.
pub fn locate_adb_program(program: &str) -> Result<String, String> {
    if program.trim().is_empty() {
        return Err("ADB command is empty".to_string());
    }
    if program == "adb" {
        if let Some(found) = search_path(executable_name()) {
            return Ok(found.to_string_lossy().to_string());
        }
        if let Some(found) = sdk_candidates().into_iter().find(|candidate| candidate.is_file()) {
            return Ok(found.to_string_lossy().to_string());
        }
        return Err(
            "adb was not found on PATH or under $ANDROID_HOME/platform-tools. Install Android platform-tools or set adb.commandPath"
                .to_string(),
        );
    }
    let path = Path::new(program);
    if path.is_dir() {
        return Err("ADB path must point to an executable file".to_string());
    }
    if !path.exists() {
        return Err(format!("ADB executable not found at {program}"));
    }
    Ok(program.to_string())
}
