//! Conversions between a display's local space, the global space, and the
//! pixel space of a stitched multi-display capture.
//!
//! All operations here are pure and total for well-formed inputs; malformed
//! geometry is rejected at `DisplayBounds` construction, not here.

use crate::display::types::{Arrangement, CombinedSpace, DisplayBounds, DisplayDescriptor, Rect};
use crate::perception::types::CapturedImage;

/// Local display coordinates to global coordinates.
pub fn to_global(display: &DisplayDescriptor, local_x: f64, local_y: f64) -> (f64, f64) {
    (
        display.bounds.origin_x + local_x,
        display.bounds.origin_y + local_y,
    )
}

/// Global coordinates to coordinates local to `display`. Exact inverse of
/// [`to_global`] for any input.
pub fn to_local(display: &DisplayDescriptor, global_x: f64, global_y: f64) -> (f64, f64) {
    (
        global_x - display.bounds.origin_x,
        global_y - display.bounds.origin_y,
    )
}

/// Finds the display containing a global point. Containment is half-open
/// (right/bottom edges exclusive). If displays overlap the first match in
/// list order wins; that tie-break is deliberate, not an error.
pub fn locate_display<'a>(
    displays: &'a [DisplayDescriptor],
    global_x: f64,
    global_y: f64,
) -> Option<&'a DisplayDescriptor> {
    displays.iter().find(|d| d.bounds.contains(global_x, global_y))
}

/// Bounding box of all displays. An empty snapshot yields a zero-sized
/// space at the origin.
pub fn build_combined_space(displays: &[DisplayDescriptor]) -> CombinedSpace {
    if displays.is_empty() {
        return CombinedSpace {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 0.0,
            max_y: 0.0,
        };
    }
    let mut space = CombinedSpace {
        min_x: f64::INFINITY,
        min_y: f64::INFINITY,
        max_x: f64::NEG_INFINITY,
        max_y: f64::NEG_INFINITY,
    };
    for d in displays {
        space.min_x = space.min_x.min(d.bounds.origin_x);
        space.min_y = space.min_y.min(d.bounds.origin_y);
        space.max_x = space.max_x.max(d.bounds.origin_x + d.bounds.width);
        space.max_y = space.max_y.max(d.bounds.origin_y + d.bounds.height);
    }
    space
}

/// Stitched-capture pixel coordinates to global coordinates.
///
/// The stitcher scales every display to the capture's maximum scale factor
/// and places it at `(origin - min) * max_scale`; this is the exact inverse:
/// divide by the scale factor, then shift by the combined-space minimum.
pub fn image_to_global(image: &CapturedImage, img_x: f64, img_y: f64) -> (f64, f64) {
    (
        img_x / image.scale_factor + image.combined_space.min_x,
        img_y / image.scale_factor + image.combined_space.min_y,
    )
}

/// Maps a locator bounding box (stitched-capture pixels) into global space.
pub fn image_rect_to_global(image: &CapturedImage, rect: &Rect) -> Rect {
    let (x, y) = image_to_global(image, rect.x, rect.y);
    Rect {
        x,
        y,
        width: rect.width / image.scale_factor,
        height: rect.height / image.scale_factor,
    }
}

/// Classifies a display's position relative to the primary.
///
/// Strict side tests first (entirely left of / right of / above / below the
/// primary's bounds). Degenerate overlapping layouts fall back to the
/// dominant center-offset axis, with X winning ties.
pub fn classify_arrangement(bounds: &DisplayBounds, primary: &DisplayBounds) -> Arrangement {
    if bounds == primary {
        return Arrangement::Primary;
    }
    if bounds.origin_x + bounds.width <= primary.origin_x {
        return Arrangement::Left;
    }
    if bounds.origin_x >= primary.origin_x + primary.width {
        return Arrangement::Right;
    }
    if bounds.origin_y + bounds.height <= primary.origin_y {
        return Arrangement::Above;
    }
    if bounds.origin_y >= primary.origin_y + primary.height {
        return Arrangement::Below;
    }

    let dx = (bounds.origin_x + bounds.width / 2.0) - (primary.origin_x + primary.width / 2.0);
    let dy = (bounds.origin_y + bounds.height / 2.0) - (primary.origin_y + primary.height / 2.0);
    if dx.abs() >= dy.abs() {
        if dx < 0.0 {
            Arrangement::Left
        } else {
            Arrangement::Right
        }
    } else if dy < 0.0 {
        Arrangement::Above
    } else {
        Arrangement::Below
    }
}
