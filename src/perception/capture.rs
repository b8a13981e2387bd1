//! Native stitched multi-display capture.
//!
//! Captures every monitor, normalizes all frames to the snapshot's maximum
//! scale factor, and composites them into one image placed at
//! `(origin - combined_space.min) * max_scale`. `display::space::image_to_global`
//! is the exact inverse of that placement.

use std::io::Cursor;

use async_trait::async_trait;
use image::{imageops, DynamicImage, ImageFormat, RgbaImage};
use xcap::Monitor;

use crate::display::space::{build_combined_space, classify_arrangement};
use crate::display::types::{Arrangement, DisplayBounds, DisplayDescriptor};
use crate::errors::{PilotError, PilotResult};
use crate::perception::traits::CaptureAdapter;
use crate::perception::types::CapturedImage;

pub struct XcapCapture;

#[async_trait]
impl CaptureAdapter for XcapCapture {
    async fn capture_all(&self) -> PilotResult<CapturedImage> {
        // xcap monitor handles are not Send; do the whole grab on a
        // blocking thread and hand back plain data.
        tokio::task::spawn_blocking(capture_all_sync)
            .await
            .map_err(|e| PilotError::Capture(format!("capture task failed: {e}")))?
    }
}

struct Grab {
    id: u32,
    bounds: DisplayBounds,
    is_primary: bool,
    frame: RgbaImage,
}

fn capture_all_sync() -> PilotResult<CapturedImage> {
    let monitors =
        Monitor::all().map_err(|e| PilotError::Capture(format!("monitor enumeration: {e}")))?;
    if monitors.is_empty() {
        return Err(PilotError::Capture("no displays available".into()));
    }

    let mut grabs = Vec::with_capacity(monitors.len());
    for mon in &monitors {
        let id = mon
            .id()
            .map_err(|e| PilotError::Capture(format!("monitor id: {e}")))?;
        let x = mon
            .x()
            .map_err(|e| PilotError::Capture(format!("monitor x: {e}")))?;
        let y = mon
            .y()
            .map_err(|e| PilotError::Capture(format!("monitor y: {e}")))?;
        let width = mon
            .width()
            .map_err(|e| PilotError::Capture(format!("monitor width: {e}")))?;
        let height = mon
            .height()
            .map_err(|e| PilotError::Capture(format!("monitor height: {e}")))?;
        let is_primary = mon
            .is_primary()
            .map_err(|e| PilotError::Capture(format!("monitor primary flag: {e}")))?;
        let frame = mon
            .capture_image()
            .map_err(|e| PilotError::Capture(format!("capture monitor {id}: {e}")))?;

        let bounds = DisplayBounds::new(
            x as f64,
            y as f64,
            width as f64,
            height as f64,
            frame.width(),
            frame.height(),
        )
        .map_err(|e| PilotError::Capture(format!("monitor {id} geometry: {e}")))?;

        tracing::debug!(
            id,
            x,
            y,
            width,
            height,
            scale = bounds.scale_factor(),
            is_primary,
            "captured monitor"
        );
        grabs.push(Grab {
            id,
            bounds,
            is_primary,
            frame,
        });
    }

    let primary_bounds = grabs
        .iter()
        .find(|g| g.is_primary)
        .unwrap_or(&grabs[0])
        .bounds;

    let displays: Vec<DisplayDescriptor> = grabs
        .iter()
        .map(|g| DisplayDescriptor {
            id: g.id,
            bounds: g.bounds,
            is_primary: g.is_primary,
            scale_factor: g.bounds.scale_factor(),
            arrangement: if g.is_primary {
                Arrangement::Primary
            } else {
                classify_arrangement(&g.bounds, &primary_bounds)
            },
        })
        .collect();

    let combined_space = build_combined_space(&displays);
    let max_scale = displays
        .iter()
        .map(|d| d.scale_factor)
        .fold(1.0_f64, f64::max);

    let canvas_w = (combined_space.total_width() * max_scale).round() as u32;
    let canvas_h = (combined_space.total_height() * max_scale).round() as u32;
    let mut canvas = RgbaImage::new(canvas_w, canvas_h);

    for g in &grabs {
        let target_w = (g.bounds.width * max_scale).round() as u32;
        let target_h = (g.bounds.height * max_scale).round() as u32;
        let placed_x = ((g.bounds.origin_x - combined_space.min_x) * max_scale).round() as i64;
        let placed_y = ((g.bounds.origin_y - combined_space.min_y) * max_scale).round() as i64;

        if g.frame.width() == target_w && g.frame.height() == target_h {
            imageops::replace(&mut canvas, &g.frame, placed_x, placed_y);
        } else {
            let resized =
                imageops::resize(&g.frame, target_w, target_h, imageops::FilterType::Triangle);
            imageops::replace(&mut canvas, &resized, placed_x, placed_y);
        }
    }

    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| PilotError::Capture(format!("PNG encode: {e}")))?;

    tracing::debug!(
        displays = displays.len(),
        width = canvas_w,
        height = canvas_h,
        scale = max_scale,
        "stitched capture ready"
    );

    Ok(CapturedImage {
        bytes,
        width: canvas_w,
        height: canvas_h,
        scale_factor: max_scale,
        combined_space,
        displays,
    })
}
