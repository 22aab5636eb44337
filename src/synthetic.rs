// src/synthetic.rs - Simulated depth rig for running without hardware
use crate::frame::{BodyLabelFrame, ColorFrame, DepthFrame, FrameGeometry, FrameSize, MultiSourceFrame};
use crate::mapping::SpacePoint;
use crate::sensor::{SensorDriver, SensorError};
use image::Rgba;

const WALL_MM: u16 = 4500;
// Columns on the left of the depth image where the emitter is occluded.
const DEAD_COLUMNS: usize = 8;

/// A person pacing left and right in front of the camera.
#[derive(Debug, Clone)]
pub struct Walker {
    pub slot: u8,
    /// Horizontal center as a fraction of depth width.
    pub center: f64,
    /// Fraction of depth width covered on each side of `center`.
    pub sway: f64,
    /// Radians per second.
    pub speed: f64,
    pub depth_mm: u16,
    /// Size in depth pixels.
    pub width: usize,
    pub height: usize,
}

impl Walker {
    fn column(&self, t: f64, depth_width: usize) -> i64 {
        ((self.center + self.sway * (self.speed * t).sin()) * depth_width as f64) as i64
    }
}

/// Generates synchronized depth, color and body-label frames plus the
/// correspondence between them (a plain scale between the two resolutions).
pub struct SyntheticSensor {
    geometry: FrameGeometry,
    walkers: Vec<Walker>,
    frame_period: f64,
    sim_time: f64,
    frame_index: u64,
    /// Every n-th frame arrives without its color buffer.
    pub expire_color_every: Option<u64>,
    /// Every n-th frame's coordinate mapping fails.
    pub fail_mapping_every: Option<u64>,
    available: bool,
}

impl SyntheticSensor {
    pub fn new(geometry: FrameGeometry, walkers: Vec<Walker>, sensor_fps: f64) -> Self {
        Self {
            geometry,
            walkers,
            frame_period: 1.0 / sensor_fps.max(1.0),
            sim_time: 0.0,
            frame_index: 0,
            expire_color_every: None,
            fail_mapping_every: None,
            available: true,
        }
    }

    /// Kinect v2 resolutions with two people walking.
    pub fn kinect_like(sensor_fps: f64) -> Self {
        let geometry = FrameGeometry {
            depth: FrameSize::new(512, 424),
            color: FrameSize::new(1920, 1080),
        };
        let walkers = vec![
            Walker {
                slot: 0,
                center: 0.35,
                sway: 0.15,
                speed: 0.8,
                depth_mm: 2200,
                width: 60,
                height: 220,
            },
            Walker {
                slot: 3,
                center: 0.7,
                sway: 0.1,
                speed: 1.3,
                depth_mm: 3400,
                width: 40,
                height: 160,
            },
        ];
        Self::new(geometry, walkers, sensor_fps)
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    fn every(n: Option<u64>, index: u64) -> bool {
        matches!(n, Some(n) if n > 0 && index % n == 0)
    }

    fn render(&self) -> MultiSourceFrame {
        let depth_size = self.geometry.depth;
        let mut depth = DepthFrame::filled(depth_size, WALL_MM);
        let mut labels = BodyLabelFrame::empty(depth_size);

        for y in 0..depth_size.height {
            for x in 0..DEAD_COLUMNS.min(depth_size.width) {
                depth.set(x, y, 0);
            }
        }

        for walker in &self.walkers {
            let cx = walker.column(self.sim_time, depth_size.width);
            let left = (cx - walker.width as i64 / 2).max(0) as usize;
            let right = ((cx + walker.width as i64 / 2).max(0) as usize).min(depth_size.width);
            let bottom = depth_size.height.saturating_sub(depth_size.height / 10);
            let top = bottom.saturating_sub(walker.height);
            for y in top..bottom {
                for x in left.max(DEAD_COLUMNS)..right {
                    depth.set(x, y, walker.depth_mm);
                    labels.set(x, y, walker.slot);
                }
            }
        }

        let color = self.render_color(&labels);
        MultiSourceFrame::complete(depth, color, labels)
    }

    fn render_color(&self, labels: &BodyLabelFrame) -> ColorFrame {
        let FrameGeometry { depth, color } = self.geometry;
        ColorFrame::from_fn(color.width as u32, color.height as u32, |x, y| {
            let dx = x as usize * depth.width / color.width;
            let dy = y as usize * depth.height / color.height;
            match labels.get(dx, dy) {
                Some(slot) if slot != crate::frame::NO_BODY => {
                    Rgba([200, 120u8.wrapping_add(slot.wrapping_mul(40)), 60, 255])
                }
                _ => {
                    let shade = (y * 160 / color.height.max(1) as u32) as u8;
                    Rgba([40 + shade / 2, 50 + shade / 2, 60 + shade, 255])
                }
            }
        })
    }

    fn check_table(&self, expected: usize, out: &[SpacePoint]) -> Result<(), SensorError> {
        if !self.available {
            return Err(SensorError::Unavailable);
        }
        if out.len() != expected {
            return Err(SensorError::TableSize {
                expected,
                actual: out.len(),
            });
        }
        Ok(())
    }
}

impl SensorDriver for SyntheticSensor {
    fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn acquire_frame(&mut self) -> Option<MultiSourceFrame> {
        if !self.available {
            return None;
        }
        self.frame_index += 1;
        self.sim_time += self.frame_period;

        let mut frame = self.render();
        if Self::every(self.expire_color_every, self.frame_index) {
            frame.color = None;
        }
        Some(frame)
    }

    fn map_color_to_depth(&self, depth: &DepthFrame, out: &mut [SpacePoint]) -> Result<(), SensorError> {
        let FrameGeometry { depth: d, color: c } = self.geometry;
        self.check_table(c.len(), out)?;
        if Self::every(self.fail_mapping_every, self.frame_index) {
            return Err(SensorError::Mapping(format!("frame {} rejected by mapper", self.frame_index)));
        }

        let sx = d.width as f32 / c.width as f32;
        let sy = d.height as f32 / c.height as f32;
        for y in 0..c.height {
            for x in 0..c.width {
                let px = x as f32 * sx;
                let py = y as f32 * sy;
                let has_depth = depth
                    .get((px + 0.5) as usize, (py + 0.5) as usize)
                    .is_some_and(|mm| mm != 0);
                out[c.index(x, y)] = if has_depth {
                    SpacePoint::new(px, py)
                } else {
                    SpacePoint::UNMAPPED
                };
            }
        }
        Ok(())
    }

    fn map_depth_to_color(&self, depth: &DepthFrame, out: &mut [SpacePoint]) -> Result<(), SensorError> {
        let FrameGeometry { depth: d, color: c } = self.geometry;
        self.check_table(d.len(), out)?;

        let sx = c.width as f32 / d.width as f32;
        let sy = c.height as f32 / d.height as f32;
        for y in 0..d.height {
            for x in 0..d.width {
                out[d.index(x, y)] = match depth.get(x, y) {
                    Some(mm) if mm != 0 => SpacePoint::new(x as f32 * sx, y as f32 * sy),
                    _ => SpacePoint::UNMAPPED,
                };
            }
        }
        Ok(())
    }
}
