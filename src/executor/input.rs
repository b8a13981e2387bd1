//! Synthetic pointer events via enigo.
//!
//! enigo's connection handle is not Send, so each operation opens its own
//! handle on a blocking thread.

use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};

use crate::errors::{PilotError, PilotResult};
use crate::executor::traits::PointerDriver;

pub struct EnigoPointerDriver;

fn open() -> PilotResult<Enigo> {
    Enigo::new(&Settings::default()).map_err(|e| PilotError::ClickPost(e.to_string()))
}

fn click_sync(x: i32, y: i32) -> PilotResult<()> {
    let mut enigo = open()?;
    enigo
        .move_mouse(x, y, Coordinate::Abs)
        .map_err(|e| PilotError::ClickPost(e.to_string()))?;
    enigo
        .button(Button::Left, Direction::Click)
        .map_err(|e| PilotError::ClickPost(e.to_string()))
}

fn double_click_sync(x: i32, y: i32) -> PilotResult<()> {
    let mut enigo = open()?;
    enigo
        .move_mouse(x, y, Coordinate::Abs)
        .map_err(|e| PilotError::ClickPost(e.to_string()))?;
    enigo
        .button(Button::Left, Direction::Click)
        .map_err(|e| PilotError::ClickPost(e.to_string()))?;
    thread::sleep(Duration::from_millis(50));
    enigo
        .button(Button::Left, Direction::Click)
        .map_err(|e| PilotError::ClickPost(e.to_string()))
}

fn drag_sync(x1: i32, y1: i32, x2: i32, y2: i32, steps: u32) -> PilotResult<()> {
    let mut enigo = open()?;
    enigo
        .move_mouse(x1, y1, Coordinate::Abs)
        .map_err(|e| PilotError::ClickPost(e.to_string()))?;
    enigo
        .button(Button::Left, Direction::Press)
        .map_err(|e| PilotError::ClickPost(e.to_string()))?;
    thread::sleep(Duration::from_millis(50));

    let steps = steps.max(1);
    for i in 1..=steps {
        let t = i as f64 / steps as f64;
        let x = x1 as f64 + (x2 - x1) as f64 * t;
        let y = y1 as f64 + (y2 - y1) as f64 * t;
        enigo
            .move_mouse(x.round() as i32, y.round() as i32, Coordinate::Abs)
            .map_err(|e| PilotError::ClickPost(e.to_string()))?;
        thread::sleep(Duration::from_millis(10));
    }

    thread::sleep(Duration::from_millis(50));
    enigo
        .button(Button::Left, Direction::Release)
        .map_err(|e| PilotError::ClickPost(e.to_string()))
}

async fn run_blocking<F>(op: F) -> PilotResult<()>
where
    F: FnOnce() -> PilotResult<()> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| PilotError::ClickPost(format!("input task failed: {e}")))?
}

#[async_trait]
impl PointerDriver for EnigoPointerDriver {
    async fn click(&self, x: i32, y: i32) -> PilotResult<()> {
        tracing::debug!(x, y, "posting click");
        run_blocking(move || click_sync(x, y)).await
    }

    async fn double_click(&self, x: i32, y: i32) -> PilotResult<()> {
        tracing::debug!(x, y, "posting double click");
        run_blocking(move || double_click_sync(x, y)).await
    }

    async fn drag(&self, x1: i32, y1: i32, x2: i32, y2: i32, steps: u32) -> PilotResult<()> {
        tracing::debug!(x1, y1, x2, y2, steps, "posting drag");
        run_blocking(move || drag_sync(x1, y1, x2, y2, steps)).await
    }
}
