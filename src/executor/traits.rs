use async_trait::async_trait;

use crate::errors::PilotResult;
use crate::perception::types::CapturedImage;

/// Structural (accessibility-level) click primitive.
///
/// `Ok(true)` only on confirmed activation. Every expected failure mode —
/// element not found, ambiguous match, internal timeout — is `Ok(false)`,
/// never an error.
#[async_trait]
pub trait StructuralClicker: Send + Sync {
    async fn click(&self, app: &str, element: &str, window: Option<&str>) -> PilotResult<bool>;
}

/// Posts synthetic pointer-button sequences at global coordinates.
/// Success means the events were posted, not that the target reacted.
#[async_trait]
pub trait PointerDriver: Send + Sync {
    async fn click(&self, x: i32, y: i32) -> PilotResult<()>;
    async fn double_click(&self, x: i32, y: i32) -> PilotResult<()>;
    async fn drag(&self, x1: i32, y1: i32, x2: i32, y2: i32, steps: u32) -> PilotResult<()>;
}

/// Observational before/after hooks around a click call. Never affects the
/// outcome; capture errors inside the hooks are swallowed by the engine.
#[async_trait]
pub trait ClickObserver: Send + Sync {
    async fn before_click(&self, element: &str, image: &CapturedImage);
    async fn after_click(&self, element: &str, image: &CapturedImage);
}
