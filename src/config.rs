// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON in `$XDG_CONFIG_HOME/barcode-scanner/config.json`. Every
//! field has a default, so a missing file or a partial one is fine.

use crate::app::frame_processor::Symbology;
use crate::backends::camera::types::{CameraBackendType, CameraIntrinsics, CameraPosition};
use crate::constants::{self, DEFAULT_SYMBOLOGIES, app_info};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera backend to use
    pub backend: CameraBackendType,
    /// Device node to scan with; overrides `camera_position`
    pub device_path: Option<String>,
    /// Preferred camera facing
    pub camera_position: CameraPosition,
    /// Images replayed by the image-file backend
    #[serde(skip)]
    pub image_files: Vec<PathBuf>,
    /// Requested capture size
    pub capture_width: u32,
    pub capture_height: u32,
    /// Clockwise rotation making the sensor image upright (0/90/180/270)
    pub sensor_rotation: i32,
    /// Camera intrinsics handed to the detector when known
    pub intrinsics: Option<CameraIntrinsics>,
    /// Symbologies to look for
    pub symbologies: Vec<Symbology>,
    /// Longest side frames are downscaled to before detection
    pub max_dimension: u32,
    /// Frames analysed concurrently
    pub buffer_workers: usize,
    /// Minimum time between analysed frames, 0 analyses every frame
    pub min_frame_interval_ms: u64,
    /// Size of the view the overlay is drawn over
    pub view_width: f32,
    pub view_height: f32,
    /// Switch the torch on once scanning starts
    pub torch_on_start: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: CameraBackendType::default(),
            device_path: None,
            camera_position: CameraPosition::default(),
            image_files: Vec::new(),
            capture_width: constants::capture::DEFAULT_WIDTH,
            capture_height: constants::capture::DEFAULT_HEIGHT,
            sensor_rotation: 0,
            intrinsics: None,
            symbologies: DEFAULT_SYMBOLOGIES.to_vec(),
            max_dimension: constants::detector::DEFAULT_MAX_DIMENSION,
            buffer_workers: constants::dispatch::DEFAULT_WORKERS,
            min_frame_interval_ms: 0,
            view_width: constants::overlay::DEFAULT_VIEW_WIDTH,
            view_height: constants::overlay::DEFAULT_VIEW_HEIGHT,
            torch_on_start: false,
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(app_info::APP_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location
    pub fn load() -> AppResult<Self> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let config: Config = serde_json::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Invalid config {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }

    pub fn min_frame_interval(&self) -> Option<Duration> {
        (self.min_frame_interval_ms > 0).then(|| Duration::from_millis(self.min_frame_interval_ms))
    }
}
