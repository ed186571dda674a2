use crate::catalog::Rgb;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "DOLLHOUSE_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
    pub eye: [f32; 3],
    pub target: [f32; 3],
    /// Fraction of the remaining orbit delta applied per frame.
    pub damping: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub max_polar_angle: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_deg: 45.0,
            near: 0.1,
            far: 1000.0,
            eye: [15.0, 15.0, 15.0],
            target: [4.0, 2.0, 3.0],
            damping: 0.05,
            min_distance: 8.0,
            max_distance: 40.0,
            max_polar_angle: std::f32::consts::FRAC_PI_2 - 0.1,
            rotate_speed: 0.005,
            zoom_speed: 0.1,
        }
    }
}

/// Layout, animation and camera constants for the viewer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub floor_height: f32,
    pub room_height: f32,
    pub explode_scale: f32,
    pub floor_separation: f32,
    pub label_offset: f32,
    pub room_opacity: f32,
    pub hover_bob_amplitude: f32,
    pub hover_bob_speed: f32,
    pub hover_emissive: Rgb,
    pub ground_size: f32,
    pub ground_color: Rgb,
    pub background_color: Rgb,
    pub min_swipe_distance: f32,
    /// Longest photo edge in pixels; larger photos are downscaled on decode.
    pub max_photo_side: u32,
    pub camera: CameraConfig,
    pub asset_root: PathBuf,
    pub catalog_path: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            floor_height: 1.5,
            room_height: 0.8,
            explode_scale: 2.0,
            floor_separation: 1.5,
            label_offset: 0.6,
            room_opacity: 0.85,
            hover_bob_amplitude: 0.05,
            hover_bob_speed: 2.0,
            hover_emissive: Rgb([0x44, 0x44, 0x44]),
            ground_size: 20.0,
            ground_color: Rgb([0x2d, 0x37, 0x48]),
            background_color: Rgb([0x1a, 0x1a, 0x2e]),
            min_swipe_distance: 50.0,
            max_photo_side: 4096,
            camera: CameraConfig::default(),
            asset_root: PathBuf::from("assets"),
            catalog_path: None,
        }
    }
}

impl ViewerConfig {
    /// Reads the file named by `DOLLHOUSE_CONFIG`, or falls back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("floor_height", self.floor_height),
            ("room_height", self.room_height),
            ("ground_size", self.ground_size),
            ("camera.near", self.camera.near),
            ("camera.min_distance", self.camera.min_distance),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be positive, got {value}"),
                });
            }
        }
        if self.max_photo_side == 0 {
            return Err(ConfigError::Invalid {
                field: "max_photo_side",
                reason: "must be positive".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.room_opacity) {
            return Err(ConfigError::Invalid {
                field: "room_opacity",
                reason: format!("must be within 0..=1, got {}", self.room_opacity),
            });
        }
        if self.camera.far <= self.camera.near {
            return Err(ConfigError::Invalid {
                field: "camera.far",
                reason: "must exceed camera.near".to_string(),
            });
        }
        if self.camera.max_distance < self.camera.min_distance {
            return Err(ConfigError::Invalid {
                field: "camera.max_distance",
                reason: "must not be below camera.min_distance".to_string(),
            });
        }
        Ok(())
    }
}
