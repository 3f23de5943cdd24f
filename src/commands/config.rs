use anyhow::{Result, bail};
use std::path::Path;

use crate::cli::ConfigCommand;
use crate::config::{Config, ENV_BASE_URL, config_path};
use crate::ui;

/// Run a config subcommand.
///
/// Takes the `--api-base` value instead of a loaded context so `init --force`
/// can replace a file that no longer parses.
pub fn run(cmd: ConfigCommand, api_base: Option<&str>, json: bool) -> Result<()> {
    let path = config_path()?;
    match cmd {
        ConfigCommand::Show => {
            let config = Config::load()?.with_base_url_override(api_base);
            show(&config, &path, json)
        }
        ConfigCommand::Init { force } => init(&path, force),
    }
}

fn show(config: &Config, path: &Path, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    ui::header("Configuration");
    let location = if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found, using defaults)", path.display())
    };
    ui::kv("File", &location);
    ui::kv("Service", &config.base_url);
    ui::kv("Timeout", &format!("{}s", config.timeout_secs));
    ui::kv(
        "Progress",
        &format!(
            "tick every {}ms, up to {}%",
            config.progress.interval_ms, config.progress.ceiling
        ),
    );

    ui::header("Defaults");
    ui::kv("Resize", or_none(&config.defaults.resize));
    ui::kv("Strip metadata", &config.defaults.strip_metadata.to_string());
    ui::kv("Output dir", or_none(&config.defaults.output_dir));

    println!();
    ui::dim(&format!("{ENV_BASE_URL} or --api-base override the service URL."));
    Ok(())
}

fn or_none(value: &str) -> &str {
    if value.is_empty() { "(none)" } else { value }
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        );
    }
    Config::default().save_to(path)?;
    ui::success(&format!("Wrote {}", path.display()));
    Ok(())
}
