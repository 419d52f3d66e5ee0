//! User configuration and on-disk locations.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    BUBBLE_MARGIN_END_DP, BUBBLE_MARGIN_TOP_DP, BUBBLE_SIZE_DP, DRAG_THRESHOLD_DP,
    FOREGROUND_PROMOTION_WINDOW, TAP_TIMEOUT,
};

const APP_DIR: &str = "popup-overlay";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no data directory available; pass --data-dir")]
    NoDataDir,
}

fn default_drag_threshold_dp() -> f32 {
    DRAG_THRESHOLD_DP
}

fn default_tap_timeout_ms() -> u64 {
    TAP_TIMEOUT.as_millis() as u64
}

fn default_bubble_size_dp() -> i32 {
    BUBBLE_SIZE_DP
}

fn default_bubble_margin_end_dp() -> i32 {
    BUBBLE_MARGIN_END_DP
}

fn default_bubble_margin_top_dp() -> i32 {
    BUBBLE_MARGIN_TOP_DP
}

/// A terminal cell is roughly eight dp wide.
fn default_density() -> f32 {
    0.125
}

fn default_sdk_level() -> u32 {
    34
}

fn default_promotion_window_ms() -> u64 {
    FOREGROUND_PROMOTION_WINDOW.as_millis() as u64
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverlayConfig {
    #[serde(default = "default_drag_threshold_dp")]
    pub drag_threshold_dp: f32,
    #[serde(default = "default_tap_timeout_ms")]
    pub tap_timeout_ms: u64,
    #[serde(default = "default_bubble_size_dp")]
    pub bubble_size_dp: i32,
    #[serde(default = "default_bubble_margin_end_dp")]
    pub bubble_margin_end_dp: i32,
    #[serde(default = "default_bubble_margin_top_dp")]
    pub bubble_margin_top_dp: i32,
    /// Screen pixels per dp.
    #[serde(default = "default_density")]
    pub density: f32,
    /// Platform level the console host reports.
    #[serde(default = "default_sdk_level")]
    pub sdk_level: u32,
    /// Where a tap on the bubble is handed off to. `None` always uses the
    /// built-in sheet; `register-picker` sets it once a handler exists.
    #[serde(default)]
    pub picker_uri: Option<String>,
    #[serde(default = "default_promotion_window_ms")]
    pub promotion_window_ms: u64,
    #[serde(default)]
    pub debug: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            drag_threshold_dp: default_drag_threshold_dp(),
            tap_timeout_ms: default_tap_timeout_ms(),
            bubble_size_dp: default_bubble_size_dp(),
            bubble_margin_end_dp: default_bubble_margin_end_dp(),
            bubble_margin_top_dp: default_bubble_margin_top_dp(),
            density: default_density(),
            sdk_level: default_sdk_level(),
            picker_uri: None,
            promotion_window_ms: default_promotion_window_ms(),
            debug: false,
        }
    }
}

impl OverlayConfig {
    /// Loads `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the whole config as JSON, creating the parent directory.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_err)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.json"))
    }

    /// Converts dp to whole screen pixels, never below one.
    pub fn px(&self, dp: i32) -> i32 {
        ((dp as f32 * self.density).round() as i32).max(1)
    }

    pub fn drag_threshold_px(&self) -> f32 {
        self.drag_threshold_dp * self.density
    }

    pub fn tap_timeout(&self) -> Duration {
        Duration::from_millis(self.tap_timeout_ms)
    }

    pub fn promotion_window(&self) -> Duration {
        Duration::from_millis(self.promotion_window_ms)
    }
}

/// Every file the overlay touches, derived from one data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub data_dir: PathBuf,
    /// Application-side item namespace.
    pub app_prefs: PathBuf,
    /// Service-side namespace: enablement flag plus the item replica.
    pub service_prefs: PathBuf,
    /// Simulated OS settings read by the console host.
    pub system_settings: PathBuf,
    pub socket: PathBuf,
    pub log_file: PathBuf,
    pub picker_lock: PathBuf,
}

impl Paths {
    /// Uses `data_dir` when given, otherwise the platform data directory.
    pub fn resolve(data_dir: Option<PathBuf>) -> Result<Self, ConfigError> {
        let explicit = data_dir.is_some();
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or(ConfigError::NoDataDir)?,
        };
        let socket = match dirs::runtime_dir() {
            Some(runtime) if !explicit => runtime.join(format!("{APP_DIR}.sock")),
            _ => data_dir.join(format!("{APP_DIR}.sock")),
        };
        Ok(Self {
            app_prefs: data_dir.join("app_prefs.json"),
            service_prefs: data_dir.join("overlay_prefs.json"),
            system_settings: data_dir.join("system_settings.json"),
            log_file: data_dir.join(format!("{APP_DIR}.log")),
            picker_lock: data_dir.join("picker.lock"),
            socket,
            data_dir,
        })
    }

    pub fn ensure_data_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.data_dir).map_err(|source| ConfigError::Io {
            path: self.data_dir.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = OverlayConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(cfg, OverlayConfig::default());
        assert_eq!(cfg.tap_timeout(), TAP_TIMEOUT);
        // no hand-off until a handler is registered
        assert_eq!(cfg.picker_uri, None);
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let cfg = OverlayConfig {
            picker_uri: Some(crate::constants::PICKER_URI.to_owned()),
            debug: true,
            ..OverlayConfig::default()
        };
        cfg.save(&path).unwrap();
        assert_eq!(OverlayConfig::load(&path).unwrap(), cfg);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"density": 1.0, "picker_uri": null}"#).unwrap();
        let cfg = OverlayConfig::load(&path).unwrap();
        assert_eq!(cfg.density, 1.0);
        assert_eq!(cfg.picker_uri, None);
        assert_eq!(cfg.bubble_size_dp, BUBBLE_SIZE_DP);
        assert_eq!(cfg.px(56), 56);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{density").unwrap();
        assert!(matches!(
            OverlayConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn explicit_data_dir_keeps_everything_inside() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::resolve(Some(dir.path().to_path_buf())).unwrap();
        for path in [
            &paths.app_prefs,
            &paths.service_prefs,
            &paths.system_settings,
            &paths.socket,
            &paths.log_file,
            &paths.picker_lock,
        ] {
            assert!(path.starts_with(dir.path()));
        }
        assert_ne!(paths.app_prefs, paths.service_prefs);
    }

    #[test]
    fn px_never_rounds_to_zero() {
        let cfg = OverlayConfig::default();
        assert_eq!(cfg.px(1), 1);
        assert_eq!(cfg.px(56), 7);
    }
}
