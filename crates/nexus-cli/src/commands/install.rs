//! `nexus install`: unpack a plugin bundle.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use nexus_config::{Config, expand_home};

use crate::theme::Theme;

/// Install `source` into `plugins_dir`, or the configured plugins directory.
pub(crate) async fn run(config: &Config, source: String, plugins_dir: Option<String>) -> Result<()> {
    let dir = target_dir(config, plugins_dir.as_deref());
    let display_dir = dir.display().to_string();

    // Remote sources use a blocking HTTP client.
    let installed = tokio::task::spawn_blocking(move || nexus_plugins::install(&source, &dir))
        .await
        .context("install task failed")?
        .with_context(|| format!("failed to install plugin into {display_dir}"))?;

    println!(
        "{}",
        Theme::success(&format!(
            "Installed plugin to {}",
            installed.display().to_string().cyan()
        ))
    );
    Ok(())
}

fn target_dir(config: &Config, plugins_dir: Option<&str>) -> PathBuf {
    expand_home(plugins_dir.unwrap_or(&config.modules.plugins.dir))
}
