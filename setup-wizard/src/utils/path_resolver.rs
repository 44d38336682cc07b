use anyhow::Result;
use std::path::PathBuf;

pub const LOG_FOLDER_NAME: &str = "wizard_logs";
pub const CONFIG_FILE_NAME: &str = "initial-setup.toml";

/// Resolve deployment folder (absolute path)
pub fn resolve_deployment_folder() -> Result<PathBuf> {
    // Prefer the folder where the EXE is running from (works in dev and deployed)
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(dir) = exe_path.parent() {
            return Ok(dir.to_path_buf());
        }
    }

    // Fallback: current working directory
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    Ok(cwd)
}

/// Resolve log folder (absolute path)
pub fn resolve_log_folder() -> Result<PathBuf> {
    // Reuse an existing `wizard_logs/` found by walking up from the CWD, so runs from nested
    // directories share one folder.
    if let Ok(mut dir) = std::env::current_dir() {
        for _ in 0..12 {
            let candidate = dir.join(LOG_FOLDER_NAME);
            if candidate.is_dir() {
                return Ok(candidate);
            }

            if let Some(parent) = dir.parent() {
                dir = parent.to_path_buf();
            } else {
                break;
            }
        }
    }

    // Fallback: base off the deployment folder (best-effort).
    let base = resolve_deployment_folder()?;
    let log_dir = base.join(LOG_FOLDER_NAME);
    std::fs::create_dir_all(&log_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create log folder: {}", e))?;
    Ok(log_dir)
}

/// Resolve the optional config file: `./initial-setup.toml`, then
/// `<config_dir>/initial-setup/config.toml`.
pub fn resolve_config_file() -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        let local = cwd.join(CONFIG_FILE_NAME);
        if local.is_file() {
            return Some(local);
        }
    }

    dirs::config_dir()
        .map(|d| d.join("initial-setup").join("config.toml"))
        .filter(|p| p.is_file())
}
