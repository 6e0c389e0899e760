//! Manifest discovery.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{PluginError, PluginResult};
use crate::manifest::PluginManifest;

/// Fixed manifest file name inside each plugin directory.
pub const MANIFEST_NAME: &str = "nexus.yaml";

/// A manifest together with the directory it was read from.
#[derive(Debug, Clone)]
pub struct DiscoveredPlugin {
    /// Plugin directory.
    pub dir: PathBuf,
    /// Parsed manifest, with `metadata.name` filled in.
    pub manifest: PluginManifest,
}

/// Read every `<dir>/<plugin>/nexus.yaml`.
///
/// Subdirectories without a manifest are skipped. Results are sorted by
/// directory name.
///
/// # Errors
///
/// Returns an error if `dir` cannot be listed, or a present manifest cannot
/// be read or fails to parse.
pub fn load_manifests(dir: &Path) -> PluginResult<Vec<DiscoveredPlugin>> {
    let mut entries = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .collect::<Vec<_>>();
    entries.sort_by_key(std::fs::DirEntry::file_name);

    let mut plugins = Vec::new();
    for entry in entries {
        let plugin_dir = entry.path();
        let path = plugin_dir.join(MANIFEST_NAME);
        let Some(content) = read_manifest(&path)? else {
            debug!(dir = %plugin_dir.display(), "no plugin manifest, skipping");
            continue;
        };

        let mut manifest: PluginManifest =
            serde_yaml::from_slice(&content).map_err(|e| PluginError::ManifestParseError {
                path: path.clone(),
                message: e.to_string(),
            })?;
        if manifest.metadata.name.is_empty() {
            manifest.metadata.name = entry.file_name().to_string_lossy().into_owned();
        }

        plugins.push(DiscoveredPlugin {
            dir: plugin_dir,
            manifest,
        });
    }
    Ok(plugins)
}

/// Raw manifest bytes, or `None` when there is no manifest file.
fn read_manifest(path: &Path) -> PluginResult<Option<Vec<u8>>> {
    if path.is_dir() {
        return Ok(None);
    }
    match std::fs::read(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PluginError::ManifestReadError {
            path: path.to_path_buf(),
            source,
        }),
    }
}
