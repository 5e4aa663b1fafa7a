//! Top-level YAML configuration.
//!
//! Every section falls back to its defaults, so a partial file (or no file
//! at all) is valid.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::compose::ComposeScales;
use crate::error::ConfigError;
use crate::marker::MarkerConfig;
use crate::session::SessionConfig;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "configs/anchor.yaml";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnchorConfig {
    #[serde(default)]
    pub session: SessionConfig,

    /// Vision fallback.
    #[serde(default)]
    pub marker: MarkerConfig,

    #[serde(default)]
    pub compose: ComposeScales,
}

impl AnchorConfig {
    /// Load and validate a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load `configs/anchor.yaml` if it exists, defaults otherwise.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Path::new(DEFAULT_CONFIG_PATH);
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if !(self.session.tracking_image_width_m > 0.0) {
            return invalid("session.tracking_image_width_m must be positive");
        }
        let marker = &self.marker;
        if !(marker.smoothing > 0.0 && marker.smoothing <= 1.0) {
            return invalid("marker.smoothing must be in (0, 1]");
        }
        if !(marker.marker_size_m > 0.0) {
            return invalid("marker.marker_size_m must be positive");
        }
        if marker.raster_width == 0 || marker.raster_height == 0 {
            return invalid("marker raster must be non-empty");
        }
        if !(-1.0..=1.0).contains(&marker.ndc_depth) {
            return invalid("marker.ndc_depth must be in [-1, 1]");
        }
        if !(self.compose.position_scale.is_finite() && self.compose.size_scale > 0.0) {
            return invalid("compose scales must be finite and size_scale positive");
        }
        Ok(())
    }
}
