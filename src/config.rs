//! YAML session description.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::calibration::CameraRole;
use crate::error::{Result, SessionError};
use crate::session::FrameRequest;
use crate::stereo::{DisparityFill, SgbmParams};

/// Block matcher and fill settings.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DisparityConfig {
    pub sad_window: i32,
    pub block_size: i32,
    pub min_disparity: i32,
    /// Replace invalid disparities by `fill_value` when computing depth.
    pub fill: bool,
    pub fill_value: f32,
}

impl Default for DisparityConfig {
    fn default() -> Self {
        let sgbm = SgbmParams::default();
        let fill = DisparityFill::default();
        Self {
            sad_window: sgbm.sad_window,
            block_size: sgbm.block_size,
            min_disparity: sgbm.min_disparity,
            fill: fill.enabled,
            fill_value: fill.value,
        }
    }
}

impl DisparityConfig {
    pub fn sgbm(&self) -> SgbmParams {
        SgbmParams {
            sad_window: self.sad_window,
            block_size: self.block_size,
            min_disparity: self.min_disparity,
        }
    }

    pub fn fill_policy(&self) -> DisparityFill {
        DisparityFill {
            enabled: self.fill,
            value: self.fill_value,
            ..DisparityFill::default()
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_base_camera() -> CameraRole {
    CameraRole::LeftRgb
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionConfig {
    pub left_dir: PathBuf,
    pub right_dir: PathBuf,
    #[serde(default)]
    pub label_dir: Option<PathBuf>,
    #[serde(default)]
    pub calib_file: Option<PathBuf>,
    #[serde(default)]
    pub pose_file: Option<PathBuf>,
    #[serde(default)]
    pub timestamp_file: Option<PathBuf>,
    /// JSON file with `critical_frames` ranges.
    #[serde(default)]
    pub sequence_control_file: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub gray: bool,
    #[serde(default = "default_true")]
    pub color: bool,
    /// Reference camera for depth conversion.
    #[serde(default = "default_base_camera")]
    pub base_camera: CameraRole,
    #[serde(default)]
    pub compute_depth: bool,
    #[serde(default)]
    pub disparity: DisparityConfig,
}

impl SessionConfig {
    /// Image streams only; everything optional is left out.
    pub fn new<P: Into<PathBuf>>(left_dir: P, right_dir: P) -> Self {
        Self {
            left_dir: left_dir.into(),
            right_dir: right_dir.into(),
            label_dir: None,
            calib_file: None,
            pose_file: None,
            timestamp_file: None,
            sequence_control_file: None,
            gray: true,
            color: true,
            base_camera: default_base_camera(),
            compute_depth: false,
            disparity: DisparityConfig::default(),
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| SessionError::Config(format!("invalid session config: {}", e)))
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|_| SessionError::MissingFile(path.to_path_buf()))?;
        let config: Self = serde_yaml::from_reader(file).map_err(|e| {
            SessionError::Config(format!("invalid session config {:?}: {}", path, e))
        })?;
        info!("Loaded session config from {:?}", path);
        Ok(config)
    }

    pub fn request(&self) -> FrameRequest {
        FrameRequest {
            gray: self.gray,
            color: self.color,
        }
    }
}
