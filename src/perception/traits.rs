use async_trait::async_trait;

use crate::errors::PilotResult;
use crate::perception::types::{CapturedImage, ElementLocation};

/// Produces a stitched capture of every display with consistent metadata.
/// Errors only on total capture failure (no displays, permission denied).
#[async_trait]
pub trait CaptureAdapter: Send + Sync {
    async fn capture_all(&self) -> PilotResult<CapturedImage>;
}

/// Resolves a natural-language description against a capture.
///
/// Returned coordinates are in the input image's pixel space; `Ok(None)`
/// means "not found" and is not an error.
#[async_trait]
pub trait ElementLocator: Send + Sync {
    async fn locate(
        &self,
        image: &CapturedImage,
        description: &str,
    ) -> PilotResult<Option<ElementLocation>>;
}
