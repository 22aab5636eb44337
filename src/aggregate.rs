// src/aggregate.rs - Per-body bounding boxes in color-pixel space
use crate::frame::{BodyLabelFrame, NO_BODY};
use crate::mapping::PixelCorrespondence;

/// Axis-aligned box over color pixels, bounds inclusive.
///
/// `BodyRect::EMPTY` uses inverted extremes so that min/max accumulation grows
/// it from the first pixel on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyRect {
    pub top: i32,
    pub bottom: i32,
    pub left: i32,
    pub right: i32,
}

impl Default for BodyRect {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl BodyRect {
    pub const EMPTY: BodyRect = BodyRect {
        top: i32::MAX,
        bottom: i32::MIN,
        left: i32::MAX,
        right: i32::MIN,
    };

    pub fn new(top: i32, bottom: i32, left: i32, right: i32) -> Self {
        Self {
            top,
            bottom,
            left,
            right,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    pub fn include(&mut self, x: i32, y: i32) {
        self.top = self.top.min(y);
        self.bottom = self.bottom.max(y);
        self.left = self.left.min(x);
        self.right = self.right.max(x);
    }

    pub fn merge(&mut self, other: &BodyRect) {
        self.top = self.top.min(other.top);
        self.bottom = self.bottom.max(other.bottom);
        self.left = self.left.min(other.left);
        self.right = self.right.max(other.right);
    }

    /// Geometric center, rounded down.
    pub fn center(&self) -> Option<(i32, i32)> {
        if self.is_empty() {
            return None;
        }
        Some(((self.left + self.right) / 2, (self.top + self.bottom) / 2))
    }

    pub fn width(&self) -> i32 {
        if self.is_empty() {
            0
        } else {
            self.right - self.left + 1
        }
    }

    pub fn height(&self) -> i32 {
        if self.is_empty() {
            0
        } else {
            self.bottom - self.top + 1
        }
    }
}

/// A rect together with the body slot it was aggregated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedBody {
    pub slot: u8,
    pub rect: BodyRect,
}

/// Grows one rect per body slot from the color-resolution grid. Slot count
/// is fixed at construction.
#[derive(Debug, Clone)]
pub struct BodyAggregator {
    rects: Vec<BodyRect>,
}

impl BodyAggregator {
    pub fn new(capacity: usize) -> Self {
        Self {
            rects: vec![BodyRect::EMPTY; capacity],
        }
    }

    /// One pass over every color pixel. Returns the rects of all slots, empty
    /// ones included.
    pub fn aggregate(&mut self, correspondence: &PixelCorrespondence, labels: &BodyLabelFrame) -> &[BodyRect] {
        self.rects.fill(BodyRect::EMPTY);
        let geometry = correspondence.geometry();
        if labels.size() != geometry.depth {
            return &self.rects;
        }

        let color = geometry.color;
        let table = correspondence.color_to_depth();
        for y in 0..color.height {
            let row = &table[y * color.width..(y + 1) * color.width];
            for (x, point) in row.iter().enumerate() {
                let Some((dx, dy)) = point.to_pixel(geometry.depth) else {
                    continue;
                };
                let label = labels.as_slice()[geometry.depth.index(dx, dy)];
                if label == NO_BODY {
                    continue;
                }
                if let Some(rect) = self.rects.get_mut(label as usize) {
                    rect.include(x as i32, y as i32);
                }
            }
        }
        &self.rects
    }

    pub fn rects(&self) -> &[BodyRect] {
        &self.rects
    }

    /// Slots whose rect grew during the last scan.
    pub fn detected(&self) -> Vec<DetectedBody> {
        self.rects
            .iter()
            .enumerate()
            .filter(|(_, rect)| !rect.is_empty())
            .map(|(slot, rect)| DetectedBody {
                slot: slot as u8,
                rect: *rect,
            })
            .collect()
    }
}
