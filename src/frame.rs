// src/frame.rs - Per-frame sensor buffers and the shared display buffer
use image::{Rgba, RgbaImage};
use std::sync::{Arc, Mutex, MutexGuard};

/// Label value marking a depth pixel that belongs to no tracked body.
pub const NO_BODY: u8 = 0xFF;

/// Width/height of one sensor stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: usize,
    pub height: usize,
}

impl FrameSize {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }
}

/// Resolutions of the depth and color streams, fixed for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub depth: FrameSize,
    pub color: FrameSize,
}

// Row-major grid with its dimensions carried alongside the data.
macro_rules! grid_frame {
    ($name:ident, $pixel:ty) => {
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            size: FrameSize,
            data: Vec<$pixel>,
        }

        impl $name {
            /// Wraps `data`, returning `None` when its length does not match `size`.
            pub fn from_vec(size: FrameSize, data: Vec<$pixel>) -> Option<Self> {
                (data.len() == size.len()).then_some(Self { size, data })
            }

            pub fn filled(size: FrameSize, value: $pixel) -> Self {
                Self {
                    size,
                    data: vec![value; size.len()],
                }
            }

            pub fn size(&self) -> FrameSize {
                self.size
            }

            pub fn width(&self) -> usize {
                self.size.width
            }

            pub fn height(&self) -> usize {
                self.size.height
            }

            pub fn get(&self, x: usize, y: usize) -> Option<$pixel> {
                if x < self.size.width && y < self.size.height {
                    Some(self.data[self.size.index(x, y)])
                } else {
                    None
                }
            }

            pub fn set(&mut self, x: usize, y: usize, value: $pixel) {
                if x < self.size.width && y < self.size.height {
                    let idx = self.size.index(x, y);
                    self.data[idx] = value;
                }
            }

            pub fn as_slice(&self) -> &[$pixel] {
                &self.data
            }

            pub fn as_mut_slice(&mut self) -> &mut [$pixel] {
                &mut self.data
            }
        }
    };
}

grid_frame!(DepthFrame, u16);
grid_frame!(BodyLabelFrame, u8);

impl DepthFrame {
    /// Depth at a pixel in meters, `None` outside the grid or where the sensor
    /// reported 0 (unknown distance).
    pub fn meters_at(&self, x: usize, y: usize) -> Option<f64> {
        match self.get(x, y)? {
            0 => None,
            mm => Some(f64::from(mm) / 1000.0),
        }
    }
}

impl BodyLabelFrame {
    pub fn empty(size: FrameSize) -> Self {
        Self::filled(size, NO_BODY)
    }
}

/// Color image as delivered by the sensor, RGBA.
pub type ColorFrame = RgbaImage;

/// One multi-source notification. Any of the three buffers may have expired
/// by the time the frame is acquired.
#[derive(Debug, Clone, Default)]
pub struct MultiSourceFrame {
    pub depth: Option<DepthFrame>,
    pub color: Option<ColorFrame>,
    pub body_labels: Option<BodyLabelFrame>,
}

/// A synchronized triple with all three buffers present.
#[derive(Debug, Clone)]
pub struct FrameSet {
    pub depth: DepthFrame,
    pub color: ColorFrame,
    pub body_labels: BodyLabelFrame,
}

impl MultiSourceFrame {
    pub fn complete(depth: DepthFrame, color: ColorFrame, body_labels: BodyLabelFrame) -> Self {
        Self {
            depth: Some(depth),
            color: Some(color),
            body_labels: Some(body_labels),
        }
    }

    pub fn into_frame_set(self) -> Option<FrameSet> {
        Some(FrameSet {
            depth: self.depth?,
            color: self.color?,
            body_labels: self.body_labels?,
        })
    }
}

/// Color buffer shared between the pipeline (sole writer) and the display
/// surface (sole reader).
#[derive(Debug, Clone)]
pub struct DisplayBuffer {
    inner: Arc<Mutex<RgbaImage>>,
}

impl DisplayBuffer {
    pub fn new(size: FrameSize) -> Self {
        let image = RgbaImage::from_pixel(size.width as u32, size.height as u32, Rgba([0, 0, 0, 255]));
        Self {
            inner: Arc::new(Mutex::new(image)),
        }
    }

    /// Locks the buffer for the duration of the returned guard. A panic on a
    /// previous holder does not make the image unusable, so poisoning is
    /// cleared rather than propagated.
    pub fn lock(&self) -> MutexGuard<'_, RgbaImage> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> RgbaImage {
        self.lock().clone()
    }

    pub fn try_is_locked(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}
