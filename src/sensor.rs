// src/sensor.rs - Sensor driver and edge detector seams
use crate::frame::{DepthFrame, FrameGeometry, MultiSourceFrame};
use crate::mapping::SpacePoint;
use image::GrayImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("coordinate mapping failed: {0}")]
    Mapping(String),
    #[error("mapping table has {actual} entries, expected {expected}")]
    TableSize { expected: usize, actual: usize },
    #[error("sensor not available")]
    Unavailable,
}

/// The depth camera driver. Frames arrive as notifications; each call to
/// `acquire_frame` takes the latest one, or `None` when nothing is ready.
pub trait SensorDriver {
    fn geometry(&self) -> FrameGeometry;

    fn is_available(&self) -> bool;

    fn acquire_frame(&mut self) -> Option<MultiSourceFrame>;

    /// Fills `out` (one entry per color pixel) with depth-space coordinates.
    fn map_color_to_depth(&self, depth: &DepthFrame, out: &mut [SpacePoint]) -> Result<(), SensorError>;

    /// Fills `out` (one entry per depth pixel) with color-space coordinates.
    fn map_depth_to_color(&self, depth: &DepthFrame, out: &mut [SpacePoint]) -> Result<(), SensorError>;
}

/// Returns a same-size mask for a grayscale buffer, non-zero marking an edge.
pub trait EdgeDetector {
    fn detect(&self, gray: &[u8], width: usize, height: usize) -> Vec<u8>;
}

/// Canny edge detection over the raw grayscale buffer.
#[derive(Debug, Clone)]
pub struct CannyEdgeDetector {
    pub low_threshold: f32,
    pub high_threshold: f32,
}

impl Default for CannyEdgeDetector {
    fn default() -> Self {
        Self {
            low_threshold: 60.0,
            high_threshold: 180.0,
        }
    }
}

impl EdgeDetector for CannyEdgeDetector {
    fn detect(&self, gray: &[u8], width: usize, height: usize) -> Vec<u8> {
        match GrayImage::from_raw(width as u32, height as u32, gray.to_vec()) {
            Some(img) => imageproc::edges::canny(&img, self.low_threshold, self.high_threshold).into_raw(),
            // Mismatched dimensions: report no edges rather than guessing a layout.
            None => vec![0; width * height],
        }
    }
}
