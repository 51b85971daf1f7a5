//! CLI argument definitions for bootlogger-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use bootlogger_core::config::BootloggerConfig;

/// Boot-time log capture daemon.
///
/// Tails the kernel and userspace logs into `<LOG_DIR>/boot` (or
/// `<LOG_DIR>/system` in system mode), filters SELinux denials and
/// property access errors, and writes a suggested allow-rule file.
#[derive(Parser, Debug)]
#[command(name = "bootlogger-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Output root directory. Existing contents of the session
    /// subdirectory are removed.
    #[arg(value_name = "LOG_DIR", value_parser = parse_log_dir)]
    pub log_dir: PathBuf,

    /// Path to bootlogger.toml configuration file.
    ///
    /// Built-in defaults are used when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Run a system session instead of a boot session.
    ///
    /// Also enabled by the `LOGGER_MODE_SYSTEM` environment variable.
    #[arg(long)]
    pub system: bool,

    /// Validate configuration and exit without capturing.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Builds the effective configuration.
    ///
    /// Layers defaults, the config file, environment overrides and then
    /// these CLI flags, and validates the result once at the end.
    pub async fn load_config(&self) -> Result<BootloggerConfig> {
        let mut config = match &self.config {
            Some(path) => BootloggerConfig::from_file(path)
                .await
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => BootloggerConfig::default(),
        };
        config.apply_env_overrides();

        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }

        config.validate().context("config validation failed")?;
        Ok(config)
    }
}

fn parse_log_dir(value: &str) -> std::result::Result<PathBuf, String> {
    if value.trim().is_empty() {
        return Err("log directory must not be empty".to_owned());
    }
    Ok(PathBuf::from(value))
}
