// src/overlay.rs - Drawing detections onto the display buffer
use crate::aggregate::BodyRect;
use crate::frame::{BodyLabelFrame, NO_BODY};
use crate::mapping::PixelCorrespondence;
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

pub const BOX_COLOR: Rgba<u8> = Rgba([0, 0, 255, 255]);
pub const EDGE_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const CLEARED: Rgba<u8> = Rgba([0, 0, 0, 0]);

#[derive(Debug, Clone)]
pub struct Overlay {
    pub stroke: u32,
    pub color: Rgba<u8>,
}

impl Default for Overlay {
    fn default() -> Self {
        Self {
            stroke: 10,
            color: BOX_COLOR,
        }
    }
}

impl Overlay {
    pub fn new(stroke: u32, color: Rgba<u8>) -> Self {
        Self { stroke, color }
    }

    /// Draws the four edges of `rect`. Every side is clamped into
    /// `[stroke, dim - stroke]` so no stroke leaves the buffer; a rect hugging
    /// the border collapses onto the clamp line rather than vanishing. Empty
    /// rects, and images narrower than two strokes, draw nothing.
    pub fn draw_rect(&self, image: &mut RgbaImage, rect: &BodyRect) {
        if rect.is_empty() {
            return;
        }
        let stroke = self.stroke.max(1) as i32;
        let (width, height) = (image.width() as i32, image.height() as i32);
        if width < 2 * stroke || height < 2 * stroke {
            return;
        }

        let left = rect.left.clamp(stroke, width - stroke);
        let top = rect.top.clamp(stroke, height - stroke);
        let right = rect.right.clamp(left, width - stroke);
        let bottom = rect.bottom.clamp(top, height - stroke);

        let half = stroke / 2;
        let span_x = (right - left + stroke) as u32;
        let span_y = (bottom - top + stroke) as u32;
        let thickness = stroke as u32;

        // top, bottom, left, right
        draw_filled_rect_mut(image, Rect::at(left - half, top - half).of_size(span_x, thickness), self.color);
        draw_filled_rect_mut(image, Rect::at(left - half, bottom - half).of_size(span_x, thickness), self.color);
        draw_filled_rect_mut(image, Rect::at(left - half, top - half).of_size(thickness, span_y), self.color);
        draw_filled_rect_mut(image, Rect::at(right - half, top - half).of_size(thickness, span_y), self.color);
    }

    pub fn draw_rects<'a>(&self, image: &mut RgbaImage, rects: impl IntoIterator<Item = &'a BodyRect>) {
        for rect in rects {
            self.draw_rect(image, rect);
        }
    }
}

/// Paints color pixels whose depth correspondent is marked in `edges`.
pub fn highlight_edges(image: &mut RgbaImage, correspondence: &PixelCorrespondence, edges: &[u8]) {
    let geometry = correspondence.geometry();
    if edges.len() != geometry.depth.len() || !same_size(image, correspondence) {
        return;
    }
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        if let Some((dx, dy)) = correspondence.depth_pixel_for(x as usize, y as usize) {
            if edges[geometry.depth.index(dx, dy)] > 0 {
                *pixel = EDGE_COLOR;
            }
        }
    }
}

/// Clears every color pixel that does not land on a body pixel.
pub fn remove_background(image: &mut RgbaImage, correspondence: &PixelCorrespondence, labels: &BodyLabelFrame) {
    if labels.size() != correspondence.geometry().depth || !same_size(image, correspondence) {
        return;
    }
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let on_body = correspondence
            .depth_pixel_for(x as usize, y as usize)
            .and_then(|(dx, dy)| labels.get(dx, dy))
            .is_some_and(|label| label != NO_BODY);
        if !on_body {
            *pixel = CLEARED;
        }
    }
}

fn same_size(image: &RgbaImage, correspondence: &PixelCorrespondence) -> bool {
    let color = correspondence.geometry().color;
    image.width() as usize == color.width && image.height() as usize == color.height
}
