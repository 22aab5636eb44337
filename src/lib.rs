// src/lib.rs - Depth-camera body localization: per-frame pipeline, overlay and telemetry
pub mod aggregate;
pub mod config;
pub mod denoise;
pub mod frame;
pub mod locate;
pub mod mapping;
pub mod overlay;
pub mod pipeline;
pub mod plane;
pub mod record;
pub mod sensor;
pub mod synthetic;
pub mod telemetry;
pub mod throttle;

pub use config::TrackerConfig;
pub use frame::{DisplayBuffer, FrameGeometry, FrameSize};
pub use pipeline::{FrameOutcome, FrameProcessor, FrameReport};
pub use sensor::SensorDriver;
