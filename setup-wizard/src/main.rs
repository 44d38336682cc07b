use std::path::PathBuf;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Print a config template with the defaults and exit.
    if args.iter().any(|a| a == "--print-default-config") {
        initial_setup::print_default_config();
        return;
    }

    // Non-interactive TUI smoke test mode (for automated checks).
    // Renders a single frame for a specific page and exits 0.
    // Usage: --tui-smoke or --tui-smoke=folder|source|target
    if let Some(arg) = args
        .iter()
        .find(|a| a.as_str() == "--tui-smoke" || a.starts_with("--tui-smoke="))
    {
        let target = arg
            .split_once('=')
            .map(|(_, v)| v.to_string())
            .filter(|v| !v.trim().is_empty());
        initial_setup::run_tui_smoke(target);
        return;
    }

    // --config=<path> overrides the config file search.
    let config_path = args
        .iter()
        .find_map(|a| a.strip_prefix("--config="))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);

    initial_setup::run_tui(config_path);
}
