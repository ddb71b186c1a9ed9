use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::geometry::Color;

pub const APP_ID: &str = "dev.pinshot.PinShot";
const APP_DIR: &str = "pinshot";
const APP_CONFIG_FILE: &str = "config.json";
const DEFAULT_FILE_NAME_PREFIX: &str = "PinShot";
const DEFAULT_UPDATE_INTERVAL_HOURS: u64 = 24;
const DEFAULT_RELEASE_ENDPOINT: &str = "https://api.github.com/repos/pinshot/pinshot/releases/latest";
const DEFAULT_UPGRADE_COMMAND: &str = "cargo install pinshot --force";
const DEFAULT_EXCLUDED_OWNERS: [&str; 3] = ["Window Server", "Dock", "SystemUIServer"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPathError {
    MissingHomeDirectory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureTool {
    #[default]
    Grim,
    Screencapture,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UpdateCheckConfig {
    pub enabled: bool,
    pub interval_hours: u64,
    pub endpoint: String,
    pub upgrade_command: String,
}

impl Default for UpdateCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: DEFAULT_UPDATE_INTERVAL_HOURS,
            endpoint: DEFAULT_RELEASE_ENDPOINT.to_string(),
            upgrade_command: DEFAULT_UPGRADE_COMMAND.to_string(),
        }
    }
}

/// Application-level settings from `config.json`. Read-only: nothing writes this file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub capture_tool: CaptureTool,
    pub excluded_window_owners: Vec<String>,
    pub file_name_prefix: String,
    pub stroke_palette: Vec<String>,
    pub update_check: UpdateCheckConfig,
    pub ocr_language: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut excluded_window_owners: Vec<String> = DEFAULT_EXCLUDED_OWNERS
            .iter()
            .map(|owner| owner.to_string())
            .collect();
        excluded_window_owners.push(APP_ID.to_string());

        Self {
            capture_tool: CaptureTool::default(),
            excluded_window_owners,
            file_name_prefix: DEFAULT_FILE_NAME_PREFIX.to_string(),
            stroke_palette: vec![
                "#000000".to_string(),
                "#ff3b30".to_string(),
                "#007aff".to_string(),
            ],
            update_check: UpdateCheckConfig::default(),
            ocr_language: None,
        }
    }
}

impl AppConfig {
    /// Palette colors that parse; falls back to black/red/blue when none do.
    pub fn palette(&self) -> Vec<Color> {
        let colors: Vec<Color> = self
            .stroke_palette
            .iter()
            .filter_map(|value| {
                let color = Color::parse_hex(value);
                if color.is_none() {
                    tracing::warn!(value, "ignoring invalid stroke palette color");
                }
                color
            })
            .collect();
        if colors.is_empty() {
            return vec![Color::BLACK, Color::RED, Color::BLUE];
        }
        colors
    }

    pub fn default_stroke_color(&self) -> Color {
        self.palette().first().copied().unwrap_or(Color::RED)
    }
}

pub fn load_app_config() -> AppConfig {
    let (xdg_config_home, home) = config_env_dirs();
    load_app_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_app_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> AppConfig {
    let path = match app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home) {
        Ok(p) => p,
        Err(_) => return AppConfig::default(),
    };
    if !path.exists() {
        return AppConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
            AppConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            AppConfig::default()
        }
    }
}

pub fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = config_root(xdg_config_home, home)?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

fn config_root(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    if let Some(xdg) = xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigPathError::MissingHomeDirectory)?;
    Ok(home.join(".config"))
}
