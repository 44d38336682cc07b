// Initial setup wizard client
// Main library entry point

pub mod api;
pub mod config;
pub mod models;
mod tui;
pub mod utils;
pub mod wizard;

use anyhow::{Context, Result};
use api::client::HttpSetupBackend;
use config::WizardConfig;
use log::{error, info};
use models::state::SetupSession;
use std::path::PathBuf;
use std::sync::Arc;
use wizard::controller::WizardController;

/// Initialize logging system with dual format (JSON + human-readable)
fn init_logging(with_stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = utils::path_resolver::resolve_log_folder()?;
    std::fs::create_dir_all(&log_dir)?;

    let timestamp = chrono::Utc::now().format("%Y-%m-%d-%H%M%S");

    // JSON log file for structured parsing
    let json_log_file = log_dir.join(format!("wizard-{}.log", timestamp));

    // Human-readable log file (.txt)
    let txt_log_file = log_dir.join(format!("wizard-{}.txt", timestamp));

    // stdout is left out in TUI mode so log lines do not corrupt the terminal UI
    let mut dispatch = fern::Dispatch::new()
        .level(log::LevelFilter::Debug)
        .level_for("hyper", log::LevelFilter::Info)
        .level_for("reqwest", log::LevelFilter::Info);

    if with_stdout {
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line = utils::logging::format_human_readable_log(
                        &timestamp_local.to_string(),
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}", txt_line));
                })
                .chain(std::io::stdout()),
        );
    }

    dispatch = dispatch
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_utc = chrono::Utc::now().to_rfc3339();
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let json_line = utils::logging::format_json_log(
                        &timestamp_utc,
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                        None,
                    );
                    out.finish(format_args!("{}\n", json_line));
                })
                .chain(fern::log_file(json_log_file)?),
        )
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line = utils::logging::format_human_readable_log(
                        &timestamp_local.to_string(),
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}\n", txt_line));
                })
                .chain(fern::log_file(txt_log_file)?),
        );

    dispatch.apply()?;

    log::info!(
        "[PHASE: initialization] Logging initialized, log directory: {:?}",
        log_dir
    );
    Ok(())
}

/// Build a controller bound to the configured server.
fn build_controller(cfg: &WizardConfig) -> Result<WizardController> {
    let base_url = cfg.base_url()?;
    let backend = HttpSetupBackend::new(&base_url, cfg.request_timeout())
        .context("Failed to build HTTP client")?;
    info!(
        "[PHASE: initialization] [STEP: backend] Endpoint {} (timeout={}s)",
        utils::logging::mask_url(backend.endpoint().as_str()),
        cfg.request_timeout_secs
    );

    let session = SetupSession::new(cfg.active_seed());
    Ok(WizardController::new(Arc::new(backend), session))
}

/// Interactive terminal wizard.
pub fn run_tui(config_path: Option<PathBuf>) {
    // TUI mode: do not log to stdout (it would corrupt the terminal UI).
    if let Err(e) = init_logging(false) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!(
        "[PHASE: initialization] Setup wizard starting at {}",
        chrono::Utc::now()
    );
    if let Ok(folder) = utils::path_resolver::resolve_deployment_folder() {
        info!("[PHASE: initialization] Deployment folder: {:?}", folder);
    }

    let result = WizardConfig::load(config_path.as_deref())
        .and_then(|cfg| build_controller(&cfg))
        .and_then(|controller| {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            tui::run(controller, runtime.handle().clone())
        });

    if let Err(e) = result {
        error!("[PHASE: tui] [STEP: exit] TUI failed: {:#}", e);
        eprintln!("Setup wizard failed: {:#}", e);
        std::process::exit(1);
    }
}

/// Render a single TUI frame for `target` (folder|source|target) without a real terminal.
pub fn run_tui_smoke(target: Option<String>) {
    if let Err(e) = init_logging(false) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let target = target.unwrap_or_else(|| "folder".to_string());
    match tui::smoke(&target) {
        Ok(()) => {
            println!("TUI smoke OK (page={})", target);
        }
        Err(e) => {
            error!("[PHASE: tui] [STEP: smoke] TUI smoke failed: {:#}", e);
            eprintln!("TUI smoke failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Print a configuration template with the default values.
pub fn print_default_config() {
    match WizardConfig::default_template() {
        Ok(template) => print!("{}", template),
        Err(e) => {
            eprintln!("Failed to render default configuration: {:#}", e);
            std::process::exit(1);
        }
    }
}
