//! Grid configuration
//!
//! Settings can be built in code, read from `TILEGRID_*` environment
//! variables, or loaded from a TOML file. Values left unset in a file fall
//! back to their defaults.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::controller::ZoomPolicy;

/// Environment variable names read by [`GridConfig::apply_env`]
pub const ENV_TILE_SIZE: &str = "TILEGRID_TILE_SIZE";
pub const ENV_MIN_TILE_SIZE: &str = "TILEGRID_MIN_TILE_SIZE";
pub const ENV_MAX_TILE_SIZE: &str = "TILEGRID_MAX_TILE_SIZE";
pub const ENV_SURFACE_INSET: &str = "TILEGRID_SURFACE_INSET_SCREENS";
pub const ENV_LOADER_WORKERS: &str = "TILEGRID_LOADER_WORKERS";
pub const ENV_CACHE_MB: &str = "TILEGRID_CACHE_MB";

/// Errors from building, loading or saving a [`GridConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("config file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Tile edge length in pixels at startup
    pub initial_tile_size: f64,
    /// Smallest tile size pinch-zoom may reach; derived from the viewport if unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_tile_size: Option<f64>,
    /// Largest tile size pinch-zoom may reach; derived from the viewport if unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tile_size: Option<f64>,
    /// Scrollable slack around the grid surface, in viewport heights
    pub surface_inset_screens: f64,
    /// Background threads producing tile content
    pub loader_workers: usize,
    /// Content cache budget in megabytes
    pub cache_mb: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            initial_tile_size: 100.0,
            min_tile_size: None,
            max_tile_size: None,
            surface_inset_screens: 100.0,
            loader_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            cache_mb: 64,
        }
    }
}

impl GridConfig {
    pub fn with_initial_tile_size(mut self, size: f64) -> Self {
        self.initial_tile_size = size;
        self
    }

    pub fn with_tile_size_range(mut self, min: f64, max: f64) -> Self {
        self.min_tile_size = Some(min);
        self.max_tile_size = Some(max);
        self
    }

    pub fn with_surface_inset_screens(mut self, screens: f64) -> Self {
        self.surface_inset_screens = screens;
        self
    }

    pub fn with_loader_workers(mut self, workers: usize) -> Self {
        self.loader_workers = workers;
        self
    }

    pub fn with_cache_mb(mut self, mb: usize) -> Self {
        self.cache_mb = mb;
        self
    }

    /// Cache budget in bytes, saturating rather than overflowing
    pub fn cache_size_bytes(&self) -> usize {
        self.cache_mb.saturating_mul(1024 * 1024)
    }

    /// Defaults overridden by whatever `TILEGRID_*` variables are set
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// Override fields from `TILEGRID_*` variables that are set
    ///
    /// Lets a file-based config be adjusted per run. The result is validated.
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Some(size) = env_value(ENV_TILE_SIZE)? {
            self.initial_tile_size = size;
        }
        if let Some(size) = env_value(ENV_MIN_TILE_SIZE)? {
            self.min_tile_size = Some(size);
        }
        if let Some(size) = env_value(ENV_MAX_TILE_SIZE)? {
            self.max_tile_size = Some(size);
        }
        if let Some(screens) = env_value(ENV_SURFACE_INSET)? {
            self.surface_inset_screens = screens;
        }
        if let Some(workers) = env_value(ENV_LOADER_WORKERS)? {
            self.loader_workers = workers;
        }
        if let Some(mb) = env_value(ENV_CACHE_MB)? {
            self.cache_mb = mb;
        }
        self.validate()?;
        Ok(self)
    }

    /// Load and validate a TOML config file
    ///
    /// ```toml
    /// initial_tile_size = 120.0
    /// min_tile_size = 40.0
    /// max_tile_size = 320.0
    /// cache_mb = 128
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: GridConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.to_toml()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_size("initial_tile_size", self.initial_tile_size)?;
        if let Some(min) = self.min_tile_size {
            check_size("min_tile_size", min)?;
        }
        if let Some(max) = self.max_tile_size {
            check_size("max_tile_size", max)?;
        }
        if let (Some(min), Some(max)) = (self.min_tile_size, self.max_tile_size) {
            if min > max {
                return Err(ConfigError::Invalid(format!(
                    "min_tile_size ({min}) is larger than max_tile_size ({max})"
                )));
            }
        }
        if !self.surface_inset_screens.is_finite() || self.surface_inset_screens < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "surface_inset_screens".to_string(),
                value: self.surface_inset_screens.to_string(),
            });
        }
        if self.loader_workers == 0 {
            return Err(ConfigError::Invalid(
                "loader_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Zoom limits for a viewport `viewport_height` pixels tall
    ///
    /// Unset limits default to 1/25 and 1/2.5 of the height.
    pub fn zoom_policy(&self, viewport_height: f64) -> ZoomPolicy {
        let derived = ZoomPolicy::for_viewport_height(viewport_height);
        ZoomPolicy::new(
            self.min_tile_size.unwrap_or(derived.min_tile_size),
            self.max_tile_size.unwrap_or(derived.max_tile_size),
        )
    }

    /// Scroll slack around the grid surface for a viewport of this height
    pub fn surface_inset(&self, viewport_height: f64) -> f64 {
        viewport_height * self.surface_inset_screens
    }
}

fn env_value<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

fn check_size(key: &str, size: f64) -> Result<(), ConfigError> {
    if size.is_finite() && size > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: size.to_string(),
        })
    }
}
