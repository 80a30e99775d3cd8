pub mod cli;
pub mod core;
pub mod providers;

use crate::core::config::AppConfig;
use anyhow::Result;
use std::io::Write;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Summary { json: bool },
    Search { query: String },
}

/// Loads the config from `config_path`, or from the default location. A
/// missing default config is not an error; built-in defaults apply.
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    match config_path {
        Some(path) => AppConfig::load_from_path(path),
        None => {
            let path = AppConfig::default_config_path()?;
            if path.exists() {
                AppConfig::load_from_path(&path)
            } else {
                debug!("No config at {}, using defaults", path.display());
                Ok(AppConfig::default())
            }
        }
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let mut stdout = std::io::stdout();
    run_command_with_output(command, config_path, &mut stdout).await
}

/// Same as [`run_command`], writing the command output to `out`.
pub async fn run_command_with_output(
    command: AppCommand,
    config_path: Option<&str>,
    out: &mut dyn Write,
) -> Result<()> {
    info!("xrate starting...");

    let config = load_config(config_path)?;
    debug!("Loaded config: {config:#?}");

    let source = providers::rate_source_from_config(&config.providers);

    match command {
        AppCommand::Summary { json } => {
            cli::summary::run(source.as_ref(), &config.holdings, &config.pairs, json, out).await
        }
        AppCommand::Search { query } => cli::search::run(source.as_ref(), &query, out).await,
    }
}
