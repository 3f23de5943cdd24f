//! Configuration for the shrnk CLI.
//!
//! Values come from, in order of precedence: command-line flags, the
//! `SHRNK_API_BASE` environment variable (base URL only), the config file at
//! `~/.config/shrnk/config.toml`, and built-in defaults.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use transfer::backend::http::{DEFAULT_BASE_URL, HttpBackend};
use transfer::{ResizeOption, SessionConfig, SyntheticPhase};

/// Environment variable overriding the service base URL.
pub const ENV_BASE_URL: &str = "SHRNK_API_BASE";

const CONFIG_FILE: &str = "config.toml";

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("shrnk"))
}

/// Get the config file path
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service base URL.
    pub base_url: String,
    /// Global timeout for one request, in seconds.
    pub timeout_secs: u64,
    pub progress: ProgressConfig,
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Milliseconds between synthetic progress ticks.
    pub interval_ms: u64,
    /// Percent the synthetic phase stops at.
    pub ceiling: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Resize option used when `--resize` is not given.
    pub resize: String,
    /// Strip metadata by default.
    pub strip_metadata: bool,
    /// Where downloads land when `-o` is not given.
    pub output_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 600,
            progress: ProgressConfig::default(),
            defaults: DefaultsConfig::default(),
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        let phase = SyntheticPhase::default();
        Self {
            interval_ms: phase.interval.as_millis() as u64,
            ceiling: phase.ceiling,
        }
    }
}

impl Config {
    /// Load the config file, falling back to defaults when it does not exist.
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        if !path.exists() {
            log::debug!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load a config file from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config format in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as TOML, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Apply the `--api-base` flag (which clap also fills from the environment).
    pub fn with_base_url_override(mut self, base_url: Option<&str>) -> Self {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than zero");
        }
        if self.progress.interval_ms == 0 {
            bail!("progress.interval_ms must be greater than zero");
        }
        if !(50.0..=100.0).contains(&self.progress.ceiling) {
            bail!("progress.ceiling must be between 50 and 100");
        }
        if !self.defaults.resize.is_empty() {
            self.defaults
                .resize
                .parse::<ResizeOption>()
                .context("Invalid defaults.resize")?;
        }
        Ok(())
    }

    /// Global request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resize option from `flag`, else from the config default.
    pub fn resize_option(&self, flag: Option<&str>) -> Result<ResizeOption> {
        let value = flag.unwrap_or(&self.defaults.resize);
        value
            .parse()
            .with_context(|| format!("Invalid resize option '{value}'"))
    }

    /// Download directory from `flag`, else from the config default.
    ///
    /// Returns `None` when neither names a directory.
    pub fn output_dir(&self, flag: Option<&Path>) -> Option<PathBuf> {
        if let Some(dir) = flag {
            return Some(dir.to_path_buf());
        }
        if self.defaults.output_dir.is_empty() {
            return None;
        }
        let expanded = shellexpand::tilde(&self.defaults.output_dir);
        Some(PathBuf::from(expanded.as_ref()))
    }

    /// Session settings derived from `[progress]`.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            synthetic: SyntheticPhase {
                interval: Duration::from_millis(self.progress.interval_ms),
                ceiling: self.progress.ceiling,
                ..SyntheticPhase::default()
            },
        }
    }

    /// HTTP backend for the configured service.
    pub fn backend(&self) -> HttpBackend {
        HttpBackend::with_base_url(&self.base_url).timeout(self.timeout())
    }
}
