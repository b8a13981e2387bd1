use serde::{Deserialize, Serialize};

use crate::errors::{PilotError, PilotResult};

/// A rectangle in some 2-D coordinate space. Which space (stitched-image
/// pixels, global logical points) is documented at each use site.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// One display's placement in the global space. Logical (point) origin and
/// size plus the physical pixel size of its framebuffer. The origin may be
/// negative for displays left of or above the primary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayBounds {
    pub origin_x: f64,
    pub origin_y: f64,
    pub width: f64,
    pub height: f64,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl DisplayBounds {
    /// Validates the geometry invariants: positive logical size and the same
    /// pixel/logical ratio on both axes.
    pub fn new(
        origin_x: f64,
        origin_y: f64,
        width: f64,
        height: f64,
        pixel_width: u32,
        pixel_height: u32,
    ) -> PilotResult<Self> {
        if width <= 0.0 || height <= 0.0 {
            return Err(PilotError::Config(format!(
                "display bounds must have positive size, got {width}x{height}"
            )));
        }
        let sx = pixel_width as f64 / width;
        let sy = pixel_height as f64 / height;
        if (sx - sy).abs() > 1e-6 {
            return Err(PilotError::Config(format!(
                "anisotropic scale factor ({sx} vs {sy}) is not supported"
            )));
        }
        Ok(Self {
            origin_x,
            origin_y,
            width,
            height,
            pixel_width,
            pixel_height,
        })
    }

    pub fn scale_factor(&self) -> f64 {
        self.pixel_width as f64 / self.width
    }

    /// Half-open containment: right/bottom edges are exclusive.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.origin_x
            && x < self.origin_x + self.width
            && y >= self.origin_y
            && y < self.origin_y + self.height
    }
}

/// Position of a display relative to the primary. Derived per enumeration
/// snapshot, never stored authoritatively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arrangement {
    Primary,
    Left,
    Right,
    Above,
    Below,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayDescriptor {
    pub id: u32,
    pub bounds: DisplayBounds,
    pub is_primary: bool,
    pub scale_factor: f64,
    pub arrangement: Arrangement,
}

/// Bounding box of every display in the snapshot, in global logical
/// coordinates. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombinedSpace {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl CombinedSpace {
    pub fn total_width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn total_height(&self) -> f64 {
        self.max_y - self.min_y
    }
}
