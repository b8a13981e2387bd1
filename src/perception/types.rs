use serde::{Deserialize, Serialize};

use crate::display::types::{CombinedSpace, DisplayDescriptor, Rect};

/// One stitched capture of every display, plus the metadata needed to map
/// its pixel space back to global coordinates. Owned by the capture call
/// that produced it and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedImage {
    /// PNG-encoded stitched image.
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Common scale factor the stitcher normalized every display to (the
    /// maximum scale factor across the snapshot).
    pub scale_factor: f64,
    pub combined_space: CombinedSpace,
    pub displays: Vec<DisplayDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Button,
    Input,
    Link,
    Text,
    Icon,
    Menu,
    Panel,
    Unknown,
}

/// A located element in the pixel space of the `CapturedImage` it was
/// resolved against. Meaningless without that image's scale factor and
/// combined space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementLocation {
    pub x: f64,
    pub y: f64,
    /// Always present and in [0, 1].
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<Rect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ElementKind>,
}
