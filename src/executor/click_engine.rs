//! Layered element interaction: structural click first, vision-guided
//! coordinate click as fallback, with confidence gating and full attempt
//! provenance.
//!
//! Within one call the attempts are strictly ordered (structural before
//! vision) and never run concurrently; that ordering is part of the
//! contract. Failures inside a branch never escape the call — they fold
//! into the returned `ClickOutcome`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::display::space::{image_rect_to_global, image_to_global};
use crate::display::types::Rect;
use crate::executor::traits::{ClickObserver, PointerDriver, StructuralClicker};
use crate::perception::traits::{CaptureAdapter, ElementLocator};
use crate::perception::types::ElementLocation;

/// Default minimum locator confidence before a vision coordinate is trusted
/// for a click. A false-positive hit can activate the wrong control, so the
/// engine prefers "no click" over a low-confidence click.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptMethod {
    Structural,
    VisionCoordinate,
}

/// One strategy tried during a click call. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickAttempt {
    pub method: AttemptMethod,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Locator confidence, recorded even when the gate rejects it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    pub timestamp_ms: i64,
}

impl ClickAttempt {
    fn record(
        method: AttemptMethod,
        succeeded: bool,
        error: Option<String>,
        confidence: Option<f32>,
    ) -> Self {
        Self {
            method,
            succeeded,
            error,
            confidence,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// How a successful click landed. The vision variant carries the global
/// coordinates that were clicked and the gating confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ClickMethod {
    Structural,
    VisionCoordinate { x: f64, y: f64, confidence: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    CaptureFailure,
    LocatorUnavailable,
    LocatorError,
    ElementNotFound,
    LowConfidence,
    ClickPostFailure,
}

/// The engine's sole return value. Fully determines what happened without
/// inspecting side logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<ClickMethod>,
    /// Locator bounding box mapped to global space, when one was reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds_found: Option<Rect>,
    pub attempts: Vec<ClickAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
}

impl ClickOutcome {
    fn failed(attempts: Vec<ClickAttempt>, reason: FallbackReason) -> Self {
        Self {
            success: false,
            method: None,
            bounds_found: None,
            attempts,
            fallback_reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClickOptions {
    /// Skip the structural attempt entirely.
    pub vision_only: bool,
    /// Explicit per-call confidence gate. `None` uses the engine's gate.
    pub min_confidence: Option<f32>,
}

/// Which interaction strategies this engine instance can actually attempt,
/// derived from the injected collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineCapabilities {
    pub has_structural_clicker: bool,
    pub has_vision_locator: bool,
}

pub struct ClickFallbackEngine {
    capture: Arc<dyn CaptureAdapter>,
    pointer: Arc<dyn PointerDriver>,
    structural: Option<Arc<dyn StructuralClicker>>,
    locator: Option<Arc<dyn ElementLocator>>,
    observer: Option<Arc<dyn ClickObserver>>,
    min_confidence: f32,
}

impl ClickFallbackEngine {
    /// Capture and pointer collaborators are required; the optional
    /// strategies are added with the `with_*` builders.
    pub fn new(capture: Arc<dyn CaptureAdapter>, pointer: Arc<dyn PointerDriver>) -> Self {
        Self {
            capture,
            pointer,
            structural: None,
            locator: None,
            observer: None,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    pub fn with_structural(mut self, structural: Arc<dyn StructuralClicker>) -> Self {
        self.structural = Some(structural);
        self
    }

    pub fn with_locator(mut self, locator: Arc<dyn ElementLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ClickObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            has_structural_clicker: self.structural.is_some(),
            has_vision_locator: self.locator.is_some(),
        }
    }

    /// Clicks the described element with the cheapest reliable method
    /// first, escalating to vision only on failure.
    pub async fn click_element(
        &self,
        app: &str,
        element: &str,
        window: Option<&str>,
        opts: &ClickOptions,
    ) -> ClickOutcome {
        if let Some(observer) = &self.observer {
            if let Ok(image) = self.capture.capture_all().await {
                observer.before_click(element, &image).await;
            }
        }

        let outcome = self.run(app, element, window, opts).await;

        if let Some(observer) = &self.observer {
            if let Ok(image) = self.capture.capture_all().await {
                observer.after_click(element, &image).await;
            }
        }

        tracing::info!(
            app,
            element,
            success = outcome.success,
            attempts = outcome.attempts.len(),
            reason = ?outcome.fallback_reason,
            "click finished"
        );
        outcome
    }

    async fn run(
        &self,
        app: &str,
        element: &str,
        window: Option<&str>,
        opts: &ClickOptions,
    ) -> ClickOutcome {
        let mut attempts = Vec::new();

        if !opts.vision_only {
            if let Some(structural) = &self.structural {
                match structural.click(app, element, window).await {
                    Ok(true) => {
                        attempts.push(ClickAttempt::record(
                            AttemptMethod::Structural,
                            true,
                            None,
                            None,
                        ));
                        return ClickOutcome {
                            success: true,
                            method: Some(ClickMethod::Structural),
                            bounds_found: None,
                            attempts,
                            fallback_reason: None,
                        };
                    }
                    Ok(false) => {
                        tracing::debug!(app, element, "structural click failed, escalating");
                        attempts.push(ClickAttempt::record(
                            AttemptMethod::Structural,
                            false,
                            Some("element not activated".into()),
                            None,
                        ));
                    }
                    Err(e) => {
                        tracing::debug!(app, element, error = %e, "structural clicker errored, escalating");
                        attempts.push(ClickAttempt::record(
                            AttemptMethod::Structural,
                            false,
                            Some(e.to_string()),
                            None,
                        ));
                    }
                }
            }
        }

        let Some(locator) = &self.locator else {
            return ClickOutcome::failed(attempts, FallbackReason::LocatorUnavailable);
        };

        let image = match self.capture.capture_all().await {
            Ok(image) => image,
            Err(e) => {
                attempts.push(ClickAttempt::record(
                    AttemptMethod::VisionCoordinate,
                    false,
                    Some(e.to_string()),
                    None,
                ));
                return ClickOutcome::failed(attempts, FallbackReason::CaptureFailure);
            }
        };

        let phrase = build_search_phrase(app, element, window);
        let location: ElementLocation = match locator.locate(&image, &phrase).await {
            Err(e) => {
                attempts.push(ClickAttempt::record(
                    AttemptMethod::VisionCoordinate,
                    false,
                    Some(e.to_string()),
                    None,
                ));
                return ClickOutcome::failed(attempts, FallbackReason::LocatorError);
            }
            Ok(None) => {
                attempts.push(ClickAttempt::record(
                    AttemptMethod::VisionCoordinate,
                    false,
                    Some(format!("no match for \"{phrase}\"")),
                    None,
                ));
                return ClickOutcome::failed(attempts, FallbackReason::ElementNotFound);
            }
            Ok(Some(location)) => location,
        };

        let bounds_found = location
            .bounding_box
            .as_ref()
            .map(|r| image_rect_to_global(&image, r));

        let gate = opts.min_confidence.unwrap_or(self.min_confidence);
        if location.confidence < gate {
            tracing::debug!(
                confidence = location.confidence,
                gate,
                "locator hit rejected by confidence gate"
            );
            attempts.push(ClickAttempt::record(
                AttemptMethod::VisionCoordinate,
                false,
                Some(format!(
                    "confidence {:.2} below gate {:.2}",
                    location.confidence, gate
                )),
                Some(location.confidence),
            ));
            return ClickOutcome {
                success: false,
                method: None,
                bounds_found,
                attempts,
                fallback_reason: Some(FallbackReason::LowConfidence),
            };
        }

        let (x, y) = image_to_global(&image, location.x, location.y);
        match self.pointer.click(x.round() as i32, y.round() as i32).await {
            Ok(()) => {
                attempts.push(ClickAttempt::record(
                    AttemptMethod::VisionCoordinate,
                    true,
                    None,
                    Some(location.confidence),
                ));
                ClickOutcome {
                    success: true,
                    method: Some(ClickMethod::VisionCoordinate {
                        x,
                        y,
                        confidence: location.confidence,
                    }),
                    bounds_found,
                    attempts,
                    fallback_reason: None,
                }
            }
            // Terminal for the call: no further fallback after a rejected post.
            Err(e) => {
                attempts.push(ClickAttempt::record(
                    AttemptMethod::VisionCoordinate,
                    false,
                    Some(e.to_string()),
                    Some(location.confidence),
                ));
                ClickOutcome {
                    success: false,
                    method: None,
                    bounds_found,
                    attempts,
                    fallback_reason: Some(FallbackReason::ClickPostFailure),
                }
            }
        }
    }
}

/// Search phrase handed to the locator: the element name with application
/// (and window, when known) context.
fn build_search_phrase(app: &str, element: &str, window: Option<&str>) -> String {
    match window {
        Some(w) => format!("the \"{element}\" element in the \"{w}\" window of the {app} application"),
        None => format!("the \"{element}\" element in the {app} application"),
    }
}
