// src/mapping.rs - Color/depth pixel correspondence tables
use crate::frame::{DepthFrame, FrameGeometry, FrameSize};
use crate::sensor::{SensorDriver, SensorError};

/// A sub-pixel coordinate in another stream's pixel space. The sensor reports
/// "no correspondence" as negative infinity on both axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpacePoint {
    pub x: f32,
    pub y: f32,
}

impl SpacePoint {
    pub const UNMAPPED: SpacePoint = SpacePoint {
        x: f32::NEG_INFINITY,
        y: f32::NEG_INFINITY,
    };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_mapped(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Nearest pixel inside `bounds`, or `None` for the sentinel and for points
    /// that land outside the grid.
    pub fn to_pixel(&self, bounds: FrameSize) -> Option<(usize, usize)> {
        if !self.is_mapped() {
            return None;
        }
        // Round half up, truncating toward zero like the sensor SDK does.
        let x = (self.x + 0.5) as i64;
        let y = (self.y + 0.5) as i64;
        bounds.contains(x, y).then_some((x as usize, y as usize))
    }
}

/// Depth-space coordinates for every color pixel, and color-space coordinates
/// for every depth pixel.
#[derive(Debug, Clone)]
pub struct PixelCorrespondence {
    geometry: FrameGeometry,
    color_to_depth: Vec<SpacePoint>,
    depth_to_color: Vec<SpacePoint>,
}

impl PixelCorrespondence {
    pub fn new(geometry: FrameGeometry) -> Self {
        Self {
            geometry,
            color_to_depth: vec![SpacePoint::UNMAPPED; geometry.color.len()],
            depth_to_color: vec![SpacePoint::UNMAPPED; geometry.depth.len()],
        }
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn color_to_depth(&self) -> &[SpacePoint] {
        &self.color_to_depth
    }

    pub fn color_to_depth_mut(&mut self) -> &mut [SpacePoint] {
        &mut self.color_to_depth
    }

    pub fn depth_to_color_mut(&mut self) -> &mut [SpacePoint] {
        &mut self.depth_to_color
    }

    /// Depth pixel corresponding to color pixel `(x, y)`.
    pub fn depth_pixel_for(&self, x: usize, y: usize) -> Option<(usize, usize)> {
        let color = self.geometry.color;
        if x >= color.width || y >= color.height {
            return None;
        }
        self.color_to_depth[color.index(x, y)].to_pixel(self.geometry.depth)
    }

    fn invalidate(&mut self) {
        self.color_to_depth.fill(SpacePoint::UNMAPPED);
        self.depth_to_color.fill(SpacePoint::UNMAPPED);
    }
}

/// Refreshes the correspondence tables each frame through the sensor driver.
pub struct CoordinateRemapper {
    correspondence: PixelCorrespondence,
}

impl CoordinateRemapper {
    pub fn new(geometry: FrameGeometry) -> Self {
        Self {
            correspondence: PixelCorrespondence::new(geometry),
        }
    }

    /// Runs both mapping calls for `depth`. On failure the tables are reset to
    /// the sentinel so nothing from a half-finished refresh can be read.
    pub fn refresh(
        &mut self,
        driver: &dyn SensorDriver,
        depth: &DepthFrame,
    ) -> Result<&PixelCorrespondence, SensorError> {
        let result = driver
            .map_color_to_depth(depth, self.correspondence.color_to_depth_mut())
            .and_then(|_| driver.map_depth_to_color(depth, self.correspondence.depth_to_color_mut()));

        if let Err(e) = result {
            self.correspondence.invalidate();
            return Err(e);
        }
        Ok(&self.correspondence)
    }

    pub fn correspondence(&self) -> &PixelCorrespondence {
        &self.correspondence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_never_maps_to_a_pixel() {
        let bounds = FrameSize::new(10, 10);
        assert_eq!(SpacePoint::UNMAPPED.to_pixel(bounds), None);
        assert_eq!(SpacePoint::new(f32::NAN, 1.0).to_pixel(bounds), None);
    }

    #[test]
    fn rounds_half_up_and_checks_bounds() {
        let bounds = FrameSize::new(10, 10);
        assert_eq!(SpacePoint::new(2.49, 3.5).to_pixel(bounds), Some((2, 4)));
        assert_eq!(SpacePoint::new(-0.4, 0.0).to_pixel(bounds), Some((0, 0)));
        assert_eq!(SpacePoint::new(-1.6, 0.0).to_pixel(bounds), None);
        assert_eq!(SpacePoint::new(9.6, 0.0).to_pixel(bounds), None);
    }
}
