use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub sources: Vec<SourceRoot>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    /// File-name pattern for annotation files within device folders.
    #[serde(default = "default_metadata_glob")]
    pub metadata_glob: String,
    /// Reader-internal folder names (compared case-insensitively). When the
    /// first path segment under a source root is one of these, the root's
    /// own directory name is used as the device label instead.
    #[serde(default = "default_internal_folders")]
    pub internal_folders: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            metadata_glob: default_metadata_glob(),
            internal_folders: default_internal_folders(),
        }
    }
}

fn default_metadata_glob() -> String {
    "metadata.*.lua".to_string()
}

fn default_internal_folders() -> Vec<String> {
    vec![
        "storage".to_string(),
        "internal".to_string(),
        "sdcard".to_string(),
    ]
}

/// One configured base directory of per-device subfolders.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceRoot {
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// When set, every file under this root imports under this device label
    /// instead of the derived one.
    #[serde(default)]
    pub device_label: Option<String>,
}

fn default_true() -> bool {
    true
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.scan.metadata_glob.is_empty() {
        anyhow::bail!("scan.metadata_glob must not be empty");
    }
    globset::Glob::new(&config.scan.metadata_glob)
        .with_context(|| format!("invalid scan.metadata_glob: {}", config.scan.metadata_glob))?;

    for source in &config.sources {
        if source.path.as_os_str().is_empty() {
            anyhow::bail!("sources entries must have a non-empty path");
        }
    }

    Ok(config)
}
