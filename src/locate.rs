// src/locate.rs - Pinhole back-projection of body centers
use crate::aggregate::DetectedBody;
use crate::frame::DepthFrame;
use crate::mapping::PixelCorrespondence;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Focal length of the depth camera in pixels, `sqrt((fx² + fy²) / 2)` where
/// `fx = 512 / (2·tan(70.6°/2)) ≈ 361.6` and `fy = 424 / (2·tan(60°/2)) ≈ 367.2`.
pub const DEFAULT_FOCAL_LENGTH_PX: f64 = 364.4;

/// Fixed position and yaw of the camera in the world frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraPose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Yaw in radians.
    pub yaw: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationMode {
    #[default]
    Relative,
    Absolute,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Location {
    /// Range from the sensor in meters and horizontal pixel offset from the
    /// optical center of the depth image.
    Relative { depth: f64, offset: f64 },
    /// World-frame position anchored at the camera pose.
    Absolute(Point3<f64>),
}

impl Location {
    pub fn relative(depth: f64, offset: f64) -> Self {
        Location::Relative { depth, offset }
    }

    pub fn absolute(x: f64, y: f64, z: f64) -> Self {
        Location::Absolute(Point3::new(x, y, z))
    }
}

/// Where a body center landed in the depth image, with its range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthSample {
    pub depth_x: usize,
    pub depth_y: usize,
    /// Meters, never zero.
    pub depth: f64,
}

#[derive(Debug, Clone)]
pub struct Localizer {
    focal_length_px: f64,
    pose: CameraPose,
    mode: LocationMode,
}

impl Localizer {
    pub fn new(focal_length_px: f64, pose: CameraPose, mode: LocationMode) -> Self {
        Self {
            focal_length_px,
            pose,
            mode,
        }
    }

    /// Looks up the depth under the rect center. Bodies whose center has no
    /// depth correspondent, or whose depth reads 0, yield `None`.
    pub fn sample(
        &self,
        body: &DetectedBody,
        correspondence: &PixelCorrespondence,
        depth: &DepthFrame,
    ) -> Option<DepthSample> {
        let (cx, cy) = body.rect.center()?;
        if cx < 0 || cy < 0 {
            return None;
        }
        let (depth_x, depth_y) = correspondence.depth_pixel_for(cx as usize, cy as usize)?;
        let meters = depth.meters_at(depth_x, depth_y)?;
        Some(DepthSample {
            depth_x,
            depth_y,
            depth: meters,
        })
    }

    /// Pixel offsets of the sample from the depth image center.
    fn screen_offsets(sample: &DepthSample, depth: &DepthFrame) -> (f64, f64) {
        let screen_x = sample.depth_x as f64 - depth.width() as f64 / 2.0;
        let screen_y = sample.depth_y as f64 - depth.height() as f64 / 2.0;
        (screen_x, screen_y)
    }

    pub fn relative(&self, sample: &DepthSample, depth: &DepthFrame) -> Location {
        let (screen_x, _) = Self::screen_offsets(sample, depth);
        Location::relative(sample.depth, screen_x)
    }

    pub fn absolute(&self, sample: &DepthSample, depth: &DepthFrame) -> Location {
        let (screen_x, screen_y) = Self::screen_offsets(sample, depth);
        let d = sample.depth;
        let rate = d / self.focal_length_px;
        let (sin, cos) = self.pose.yaw.sin_cos();

        Location::absolute(
            self.pose.x + d * cos + screen_x * sin * rate,
            self.pose.y + d * sin - screen_x * cos * rate,
            self.pose.z - screen_y / self.focal_length_px * d,
        )
    }

    /// Location of one body in the configured mode.
    pub fn locate(
        &self,
        body: &DetectedBody,
        correspondence: &PixelCorrespondence,
        depth: &DepthFrame,
    ) -> Option<Location> {
        let sample = self.sample(body, correspondence, depth)?;
        Some(match self.mode {
            LocationMode::Relative => self.relative(&sample, depth),
            LocationMode::Absolute => self.absolute(&sample, depth),
        })
    }

    pub fn locate_all(
        &self,
        bodies: &[DetectedBody],
        correspondence: &PixelCorrespondence,
        depth: &DepthFrame,
    ) -> Vec<Location> {
        bodies
            .iter()
            .filter_map(|body| {
                let location = self.locate(body, correspondence, depth);
                if location.is_none() {
                    tracing::trace!(slot = body.slot, "no reliable depth at body center");
                }
                location
            })
            .collect()
    }
}
