//! Capture geometry: element bounding boxes and padded clip rectangles.

use serde::{Deserialize, Serialize};

/// An element's bounding box in CSS pixels, relative to the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// The region a cropped screenshot captures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ClipRect {
    /// Expand a bounding box by `padding` on every side.
    ///
    /// The origin is clamped at zero so a box near the viewport edge never
    /// produces a negative-origin capture region. The far edges are not
    /// clamped; a padded box may extend past the viewport and the driver
    /// clips it further.
    pub fn padded(bounds: &BoundingBox, padding: f64) -> Self {
        Self {
            x: (bounds.x - padding).max(0.0),
            y: (bounds.y - padding).max(0.0),
            width: bounds.width + 2.0 * padding,
            height: bounds.height + 2.0 * padding,
        }
    }
}
