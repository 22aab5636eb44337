// src/config.rs - Startup configuration, loaded once from JSON
use crate::denoise::DenoisePolicy;
use crate::frame::FrameGeometry;
use crate::locate::{CameraPose, LocationMode, DEFAULT_FOCAL_LENGTH_PX};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub max_fps: u32,
    /// Number of body slots the sensor labels (0..N-1).
    pub body_capacity: usize,
    /// Depth camera focal length in pixels.
    pub focal_length_px: f64,
    pub camera: CameraPose,
    pub denoise: DenoisePolicy,
    pub location_mode: LocationMode,
    pub telemetry: TelemetryConfig,
    pub overlay: OverlayConfig,
    pub edges: EdgeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub stroke_width: u32,
    /// RGBA
    pub color: [u8; 4],
    /// Blank out color pixels that are not on a body.
    pub remove_background: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    pub enabled: bool,
    pub low_threshold: f32,
    pub high_threshold: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_fps: 15,
            body_capacity: 6,
            focal_length_px: DEFAULT_FOCAL_LENGTH_PX,
            camera: CameraPose::default(),
            denoise: DenoisePolicy::MedianOfNine,
            location_mode: LocationMode::Relative,
            telemetry: TelemetryConfig::default(),
            overlay: OverlayConfig::default(),
            edges: EdgeConfig::default(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4399,
            connect_timeout_ms: 200, // keep well under one frame period
        }
    }
}

impl TelemetryConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            stroke_width: 10,
            color: [0, 0, 255, 255],
            remove_background: false,
        }
    }
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            low_threshold: 60.0,
            high_threshold: 180.0,
        }
    }
}

impl TrackerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: TrackerConfig = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise falls back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_fps == 0 {
            bail!("max_fps must be positive");
        }
        // 0xFF is the no-body label, so at most 255 slots are addressable.
        if !(1..=255).contains(&self.body_capacity) {
            bail!("body_capacity must be in 1..=255, got {}", self.body_capacity);
        }
        if !(self.focal_length_px.is_finite() && self.focal_length_px > 0.0) {
            bail!("focal_length_px must be positive, got {}", self.focal_length_px);
        }
        if self.telemetry.port == 0 {
            bail!("telemetry.port must be non-zero");
        }
        if self.overlay.stroke_width == 0 {
            bail!("overlay.stroke_width must be positive");
        }
        Ok(())
    }

    /// Checks the settings that depend on the sensor resolution. Boxes are
    /// clamped one stroke inside the color image, so two strokes must fit in
    /// both dimensions.
    pub fn validate_for(&self, geometry: FrameGeometry) -> Result<()> {
        let shortest = geometry.color.width.min(geometry.color.height);
        let stroke = self.overlay.stroke_width as usize;
        if 2 * stroke >= shortest {
            bail!(
                "overlay.stroke_width {} too large for a {}x{} color image",
                stroke,
                geometry.color.width,
                geometry.color.height
            );
        }
        Ok(())
    }

    /// `<config dir>/man_tracker/config.json` for the current user.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("edu", "iotlab", "man_tracker")
            .map(|dirs| dirs.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("./config.json"))
    }
}
