//! Time-boxed polling.
//!
//! One generic loop serves every wait flavor: element appeared, element
//! disappeared, text appeared, any-of-N. The loop protocol is strict:
//! cancellation is checked first at each iteration boundary, the timeout is
//! checked before doing work (so a `Timeout` outcome always reports
//! `elapsed_ms >= timeout`), evaluation errors are soft and retried, and a
//! satisfied predicate returns immediately without sleeping.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::errors::PilotResult;
use crate::perception::traits::{CaptureAdapter, ElementLocator};
use crate::perception::types::ElementLocation;

/// Cooperative cancellation flag, checked only at iteration boundaries —
/// never pre-emptive mid-evaluation.
pub type CancelFlag = Arc<AtomicBool>;

pub fn new_cancel_flag() -> CancelFlag {
    Arc::new(AtomicBool::new(false))
}

#[derive(Debug, Clone)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Consecutive evaluation errors tolerated before giving up with
    /// reason `Error`. `None` retries errors until the timeout.
    pub max_error_streak: Option<u32>,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
            max_error_streak: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitReason {
    Success,
    Timeout,
    Cancelled,
    Error,
}

/// Outcome of a wait. `elapsed_ms` and `iterations` are measured during the
/// loop, not reconstructed afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct WaitOutcome<T> {
    pub success: bool,
    pub reason: WaitReason,
    pub elapsed_ms: u64,
    pub iterations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T> WaitOutcome<T> {
    fn finish(
        reason: WaitReason,
        started: Instant,
        iterations: u32,
        last_error: Option<String>,
        result: Option<T>,
    ) -> Self {
        Self {
            success: reason == WaitReason::Success,
            reason,
            elapsed_ms: started.elapsed().as_millis() as u64,
            iterations,
            last_error,
            result,
        }
    }
}

/// Polls `evaluate` until `predicate` holds, the timeout elapses, or the
/// cancel flag is raised.
///
/// The predicate is not applied to errored iterations; an evaluation error
/// must never satisfy an "element gone" style predicate.
pub async fn wait_until<T, F, Fut, P>(
    config: &WaitConfig,
    cancel: Option<CancelFlag>,
    mut evaluate: F,
    predicate: P,
) -> WaitOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PilotResult<Option<T>>>,
    P: Fn(&Option<T>) -> bool,
{
    let started = Instant::now();
    let mut iterations: u32 = 0;
    let mut last_error: Option<String> = None;
    let mut error_streak: u32 = 0;

    loop {
        if let Some(flag) = &cancel {
            if flag.load(Ordering::Relaxed) {
                tracing::debug!(iterations, "wait cancelled");
                return WaitOutcome::finish(
                    WaitReason::Cancelled,
                    started,
                    iterations,
                    last_error,
                    None,
                );
            }
        }

        if started.elapsed() >= config.timeout {
            tracing::debug!(iterations, timeout_ms = config.timeout.as_millis() as u64, "wait timed out");
            return WaitOutcome::finish(
                WaitReason::Timeout,
                started,
                iterations,
                last_error,
                None,
            );
        }

        iterations += 1;
        match evaluate().await {
            Ok(result) => {
                error_streak = 0;
                if predicate(&result) {
                    return WaitOutcome::finish(
                        WaitReason::Success,
                        started,
                        iterations,
                        last_error,
                        result,
                    );
                }
            }
            Err(e) => {
                error_streak += 1;
                tracing::debug!(error = %e, error_streak, "wait evaluation errored, retrying");
                last_error = Some(e.to_string());
                if let Some(max) = config.max_error_streak {
                    if error_streak >= max {
                        return WaitOutcome::finish(
                            WaitReason::Error,
                            started,
                            iterations,
                            last_error,
                            None,
                        );
                    }
                }
            }
        }

        tokio::time::sleep(config.poll_interval).await;
    }
}

type ProbeFuture =
    std::pin::Pin<Box<dyn Future<Output = PilotResult<Option<ElementLocation>>> + Send>>;

/// Wait helpers bound to a capture adapter and locator. A hit below the
/// confidence gate counts as "not present".
pub struct WaitEngine {
    capture: Arc<dyn CaptureAdapter>,
    locator: Arc<dyn ElementLocator>,
    config: WaitConfig,
    min_confidence: f32,
}

impl WaitEngine {
    pub fn new(capture: Arc<dyn CaptureAdapter>, locator: Arc<dyn ElementLocator>) -> Self {
        Self {
            capture,
            locator,
            config: WaitConfig::default(),
            min_confidence: crate::executor::click_engine::DEFAULT_MIN_CONFIDENCE,
        }
    }

    pub fn with_config(mut self, config: WaitConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn config(&self) -> &WaitConfig {
        &self.config
    }

    pub async fn wait_for_element(
        &self,
        description: &str,
        cancel: Option<CancelFlag>,
    ) -> WaitOutcome<ElementLocation> {
        let evaluate = self.single_probe(description);
        wait_until(&self.config, cancel, evaluate, |r| r.is_some()).await
    }

    pub async fn wait_for_element_gone(
        &self,
        description: &str,
        cancel: Option<CancelFlag>,
    ) -> WaitOutcome<ElementLocation> {
        let evaluate = self.single_probe(description);
        wait_until(&self.config, cancel, evaluate, |r| r.is_none()).await
    }

    pub async fn wait_for_text(
        &self,
        text: &str,
        cancel: Option<CancelFlag>,
    ) -> WaitOutcome<ElementLocation> {
        let description = format!("the visible text \"{text}\"");
        let evaluate = self.single_probe(&description);
        wait_until(&self.config, cancel, evaluate, |r| r.is_some()).await
    }

    /// Evaluates all descriptions each iteration; the first hit wins. The
    /// result carries the index of the matching description.
    pub async fn wait_for_any(
        &self,
        descriptions: &[&str],
        cancel: Option<CancelFlag>,
    ) -> WaitOutcome<(usize, ElementLocation)> {
        let capture = self.capture.clone();
        let locator = self.locator.clone();
        let descriptions: Vec<String> = descriptions.iter().map(|d| d.to_string()).collect();
        let min_confidence = self.min_confidence;

        let evaluate = move || {
            let capture = capture.clone();
            let locator = locator.clone();
            let descriptions = descriptions.clone();
            async move {
                let image = capture.capture_all().await?;
                for (index, description) in descriptions.iter().enumerate() {
                    if let Some(location) = locator.locate(&image, description).await? {
                        if location.confidence >= min_confidence {
                            return Ok(Some((index, location)));
                        }
                    }
                }
                Ok(None)
            }
        };
        wait_until(&self.config, cancel, evaluate, |r| r.is_some()).await
    }

    fn single_probe(&self, description: &str) -> impl FnMut() -> ProbeFuture {
        let capture = self.capture.clone();
        let locator = self.locator.clone();
        let description = description.to_string();
        let min_confidence = self.min_confidence;
        move || -> ProbeFuture {
            let capture = capture.clone();
            let locator = locator.clone();
            let description = description.clone();
            Box::pin(async move {
                let image = capture.capture_all().await?;
                match locator.locate(&image, &description).await? {
                    Some(location) if location.confidence >= min_confidence => Ok(Some(location)),
                    _ => Ok(None),
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::display::types::CombinedSpace;
    use crate::errors::PilotError;
    use crate::perception::types::CapturedImage;

    #[tokio::test]
    async fn timeout_outcome_reports_full_elapsed_and_iterations() {
        let config = WaitConfig {
            timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(20),
            max_error_streak: None,
        };
        let outcome: WaitOutcome<()> =
            wait_until(&config, None, || async { Ok(None) }, |_| false).await;

        assert!(!outcome.success);
        assert_eq!(outcome.reason, WaitReason::Timeout);
        assert!(outcome.elapsed_ms >= 100, "elapsed {}", outcome.elapsed_ms);
        assert!(outcome.iterations >= 5, "iterations {}", outcome.iterations);
    }

    #[tokio::test]
    async fn immediate_success_does_not_sleep() {
        let config = WaitConfig {
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(60),
            max_error_streak: None,
        };
        let started = Instant::now();
        let outcome = wait_until(&config, None, || async { Ok(Some(42)) }, |r| r.is_some()).await;

        assert!(outcome.success);
        assert_eq!(outcome.reason, WaitReason::Success);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.result, Some(42));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn raised_flag_cancels_at_iteration_boundary() {
        let config = WaitConfig::default();
        let cancel = new_cancel_flag();
        cancel.store(true, Ordering::Relaxed);

        let outcome: WaitOutcome<()> =
            wait_until(&config, Some(cancel), || async { Ok(Some(())) }, |_| true).await;

        assert_eq!(outcome.reason, WaitReason::Cancelled);
        assert_eq!(outcome.iterations, 0);
    }

    #[tokio::test]
    async fn evaluation_errors_are_retried_then_succeed() {
        let config = WaitConfig {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(5),
            max_error_streak: None,
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = calls.clone();
        let outcome = wait_until(
            &config,
            None,
            move || {
                let calls = calls_in.clone();
                async move {
                    match calls.fetch_add(1, Ordering::SeqCst) {
                        0 | 1 => Err(PilotError::Locator("transient".into())),
                        _ => Ok(Some("found")),
                    }
                }
            },
            |r| r.is_some(),
        )
        .await;

        assert!(outcome.success);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.last_error.as_deref(), Some("Locator error: transient"));
    }

    #[tokio::test]
    async fn error_streak_cutoff_aborts_with_error_reason() {
        let config = WaitConfig {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(5),
            max_error_streak: Some(3),
        };
        let outcome: WaitOutcome<()> = wait_until(
            &config,
            None,
            || async { Err(PilotError::Capture("gone".into())) },
            |_| true,
        )
        .await;

        assert!(!outcome.success);
        assert_eq!(outcome.reason, WaitReason::Error);
        assert_eq!(outcome.iterations, 3);
        assert!(outcome.last_error.is_some());
    }

    #[tokio::test]
    async fn errored_iteration_never_satisfies_a_gone_predicate() {
        let config = WaitConfig {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(5),
            max_error_streak: None,
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = calls.clone();
        let outcome: WaitOutcome<()> = wait_until(
            &config,
            None,
            move || {
                let calls = calls_in.clone();
                async move {
                    match calls.fetch_add(1, Ordering::SeqCst) {
                        0 => Err(PilotError::Locator("flaky".into())),
                        _ => Ok(None),
                    }
                }
            },
            |r| r.is_none(),
        )
        .await;

        // The error iteration is skipped; only the clean None matches.
        assert!(outcome.success);
        assert_eq!(outcome.iterations, 2);
    }

    fn empty_image() -> CapturedImage {
        CapturedImage {
            bytes: Vec::new(),
            width: 1920,
            height: 1080,
            scale_factor: 1.0,
            combined_space: CombinedSpace {
                min_x: 0.0,
                min_y: 0.0,
                max_x: 1920.0,
                max_y: 1080.0,
            },
            displays: Vec::new(),
        }
    }

    struct StubCapture;

    #[async_trait]
    impl CaptureAdapter for StubCapture {
        async fn capture_all(&self) -> PilotResult<CapturedImage> {
            Ok(empty_image())
        }
    }

    /// Replays a scripted sequence of locate responses keyed by call order;
    /// repeats the last response once the script is exhausted.
    struct ScriptedLocator {
        script: Mutex<Vec<Option<ElementLocation>>>,
        last: Mutex<Option<ElementLocation>>,
        match_description: Option<String>,
    }

    impl ScriptedLocator {
        fn new(script: Vec<Option<ElementLocation>>) -> Self {
            Self {
                script: Mutex::new(script),
                last: Mutex::new(None),
                match_description: None,
            }
        }

        fn matching(description: &str, location: ElementLocation) -> Self {
            Self {
                script: Mutex::new(Vec::new()),
                last: Mutex::new(Some(location)),
                match_description: Some(description.to_string()),
            }
        }
    }

    #[async_trait]
    impl ElementLocator for ScriptedLocator {
        async fn locate(
            &self,
            _: &CapturedImage,
            description: &str,
        ) -> PilotResult<Option<ElementLocation>> {
            if let Some(expected) = &self.match_description {
                if description != expected {
                    return Ok(None);
                }
                return Ok(self.last.lock().expect("not poisoned").clone());
            }
            let mut script = self.script.lock().expect("not poisoned");
            if script.is_empty() {
                return Ok(self.last.lock().expect("not poisoned").clone());
            }
            let next = script.remove(0);
            *self.last.lock().expect("not poisoned") = next.clone();
            Ok(next)
        }
    }

    fn location(confidence: f32) -> ElementLocation {
        ElementLocation {
            x: 100.0,
            y: 200.0,
            confidence,
            bounding_box: None,
            kind: None,
        }
    }

    fn fast_config() -> WaitConfig {
        WaitConfig {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(5),
            max_error_streak: None,
        }
    }

    #[tokio::test]
    async fn wait_for_element_polls_until_hit() {
        let locator = Arc::new(ScriptedLocator::new(vec![
            None,
            None,
            Some(location(0.9)),
        ]));
        let engine =
            WaitEngine::new(Arc::new(StubCapture), locator).with_config(fast_config());

        let outcome = engine.wait_for_element("the Run button", None).await;
        assert!(outcome.success);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.result.map(|l| l.confidence), Some(0.9));
    }

    #[tokio::test]
    async fn low_confidence_hit_counts_as_absent() {
        let locator = Arc::new(ScriptedLocator::new(vec![Some(location(0.3))]));
        let engine = WaitEngine::new(Arc::new(StubCapture), locator).with_config(WaitConfig {
            timeout: Duration::from_millis(50),
            poll_interval: Duration::from_millis(5),
            max_error_streak: None,
        });

        let outcome = engine.wait_for_element("the Run button", None).await;
        assert_eq!(outcome.reason, WaitReason::Timeout);
    }

    #[tokio::test]
    async fn wait_for_element_gone_succeeds_when_locator_misses() {
        let locator = Arc::new(ScriptedLocator::new(vec![
            Some(location(0.9)),
            Some(location(0.9)),
            None,
        ]));
        let engine =
            WaitEngine::new(Arc::new(StubCapture), locator).with_config(fast_config());

        let outcome = engine.wait_for_element_gone("the spinner", None).await;
        assert!(outcome.success);
        assert_eq!(outcome.iterations, 3);
    }

    #[tokio::test]
    async fn wait_for_any_reports_matching_index() {
        let locator = Arc::new(ScriptedLocator::matching(
            "the Cancel button",
            location(0.95),
        ));
        let engine =
            WaitEngine::new(Arc::new(StubCapture), locator).with_config(fast_config());

        let outcome = engine
            .wait_for_any(&["the OK button", "the Cancel button"], None)
            .await;
        assert!(outcome.success);
        let (index, hit) = outcome.result.expect("hit");
        assert_eq!(index, 1);
        assert_eq!(hit.confidence, 0.95);
    }
}
