// Colour region detection on a rasterised page
use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};

use crate::config::DetectionConfig;
use crate::types::{BoundingBox, Rgb};

/// Finds the externally bounded regions of one colour and maps them to points.
#[derive(Debug, Clone)]
pub struct RegionDetector {
    tolerance: u8,
    scale: f32,
}

impl RegionDetector {
    pub fn new(tolerance: u8, scale: f32) -> Self {
        Self { tolerance, scale }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.color_tolerance, config.scale())
    }

    /// Bounding boxes, in document space, of every outer contour whose pixels
    /// fall in the tolerance window around `target`. No area filter is applied.
    pub fn detect(&self, image: &RgbImage, target: Rgb) -> Vec<BoundingBox> {
        let mask = self.color_mask(image, target);

        let boxes: Vec<BoundingBox> = find_contours::<u32>(&mask)
            .iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .filter_map(|c| self.contour_box(c))
            .collect();

        tracing::debug!(color = ?target.0, regions = boxes.len(), "colour regions detected");
        boxes
    }

    /// Binary mask: 255 where every channel is inside the inclusive window.
    pub fn color_mask(&self, image: &RgbImage, target: Rgb) -> GrayImage {
        let (lower, upper) = target.window(self.tolerance);

        GrayImage::from_fn(image.width(), image.height(), |x, y| {
            let px = image.get_pixel(x, y).0;
            let inside = (0..3).all(|i| px[i] >= lower[i] && px[i] <= upper[i]);
            Luma([if inside { 255 } else { 0 }])
        })
    }

    fn contour_box(&self, contour: &Contour<u32>) -> Option<BoundingBox> {
        let first = contour.points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);

        for p in &contour.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        // Pixel rectangles are inclusive, so the far edge is max + 1
        Some(BoundingBox::new(
            min_x as f32 * self.scale,
            min_y as f32 * self.scale,
            (max_x + 1) as f32 * self.scale,
            (max_y + 1) as f32 * self.scale,
        ))
    }
}
