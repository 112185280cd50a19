use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::GalleryError;

/// Axis-aligned face box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

/// One face reported by the detector for a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,

    /// Tracker identity, stable across frames when the detector tracks.
    pub track_id: Option<u32>,
}

/// Finds (and optionally tracks) faces in a frame.
///
/// Detection models live outside this crate; implementations wrap them.
pub trait FaceDetector {
    /// Returns zero or more faces for `frame`.
    fn track(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, GalleryError>;

    /// Reports whether the underlying model loaded.
    fn is_available(&self) -> bool {
        true
    }
}

/// Crops a region around `bbox`, grown by `scale` about its centre and
/// clamped to the frame.
///
/// Box coordinates are truncated to whole pixels; degenerate boxes count
/// as one pixel wide/high. Returns `None` when the clamped region is empty.
pub fn crop_face(frame: &RgbImage, bbox: &BoundingBox, scale: f32) -> Option<RgbImage> {
    let coords = [bbox.x1, bbox.y1, bbox.x2, bbox.y2];
    if coords.iter().any(|c| !c.is_finite()) || !scale.is_finite() {
        return None;
    }
    // Whole-pixel arithmetic in f64 so extreme boxes cannot overflow.
    let [x1, y1, x2, y2] = coords.map(|c| (c as f64).trunc());
    let (w, h) = (frame.width() as f64, frame.height() as f64);
    let scale = scale as f64;

    let box_w = (x2 - x1).max(1.0);
    let box_h = (y2 - y1).max(1.0);
    let cx = x1 + (box_w / 2.0).floor();
    let cy = y1 + (box_h / 2.0).floor();
    let half_w = ((box_w * scale).trunc() / 2.0).trunc();
    let half_h = ((box_h * scale).trunc() / 2.0).trunc();

    let left = (cx - half_w).max(0.0);
    let top = (cy - half_h).max(0.0);
    let right = (cx + half_w).min(w);
    let bottom = (cy + half_h).min(h);
    if right - left < 1.0 || bottom - top < 1.0 {
        return None;
    }

    let view = image::imageops::crop_imm(
        frame,
        left as u32,
        top as u32,
        (right - left) as u32,
        (bottom - top) as u32,
    );
    Some(view.to_image())
}
