use crate::photo::EPSG_WGS84;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_LAYER_NAME: &str = "photos";

/// Defaults applied when the command line leaves an option out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub default_format: Option<String>,
    pub layer_name: String,
    pub target_epsg: u16,
    pub recursive_default: bool,
    pub follow_links_default: bool,
    pub absolute_paths_default: bool,
    pub combined_datetime_default: bool,
    pub string_temporal_default: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_format: None,
            layer_name: DEFAULT_LAYER_NAME.to_string(),
            target_epsg: EPSG_WGS84,
            recursive_default: false,
            follow_links_default: false,
            absolute_paths_default: false,
            combined_datetime_default: false,
            string_temporal_default: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("org", "exif2geo", "exif2geo")
        .context("could not determine the configuration directory")?;
    let config_dir = proj.config_dir().to_path_buf();
    Ok(AppPaths {
        config_path: config_dir.join("config.toml"),
        config_dir,
    })
}

pub fn load_config() -> Result<AppConfig> {
    let paths = app_paths()?;
    load_config_from(&paths.config_path)
}

/// Reads `path`, falling back to defaults when it does not exist. Keys missing
/// from the file keep their default value.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read config file: {}", path.display()))?;
    let config = toml::from_str::<AppConfig>(&raw)
        .with_context(|| format!("could not parse config file: {}", path.display()))?;
    Ok(config)
}

pub fn save_config(config: &AppConfig) -> Result<()> {
    let paths = app_paths()?;
    save_config_to(config, &paths.config_path)
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("could not create config directory: {}", dir.display()))?;
    }
    let body = toml::to_string_pretty(config).context("could not serialize config")?;
    fs::write(path, body)
        .with_context(|| format!("could not write config file: {}", path.display()))?;
    Ok(())
}
