//! `setup` command: seeds a config file from the bundled example.

use crate::core::config::AppConfig;
use anyhow::{Context, Result, anyhow};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const EXAMPLE_CONFIG: &str = include_str!("../../docs/example_config.yaml");

/// Writes the example config to `config_path`, or to the default location
/// when none is given, and tells the user where it went.
pub fn setup(config_path: Option<&str>, out: &mut dyn Write) -> Result<()> {
    let path = match config_path {
        Some(path) => PathBuf::from(path),
        None => AppConfig::default_config_path()?,
    };

    write_example_config(&path)?;
    writeln!(
        out,
        "Wrote example config to {}. Edit the holdings, then run `xrate summary`.",
        path.display()
    )?;
    Ok(())
}

/// Never overwrites: an existing file at `path` is an error and stays as is.
fn write_example_config(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create config directory {}", dir.display()))?;
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => anyhow!(
                "A config already exists at {}; edit it or pass another --config-path",
                path.display()
            ),
            _ => anyhow::Error::new(e).context(format!("Cannot create {}", path.display())),
        })?;
    file.write_all(EXAMPLE_CONFIG.as_bytes())
        .with_context(|| format!("Cannot write {}", path.display()))?;

    info!(path = %path.display(), "Wrote example config");
    Ok(())
}
