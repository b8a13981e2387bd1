//! Session facade: one automation target, explicitly injected collaborators.
//!
//! A session owns its click and wait engines and shares no mutable state
//! with other sessions except (optionally) the `LocationCache`, which
//! serializes access internally. Collaborators are passed at construction;
//! availability is visible through `capabilities()`, never probed at call
//! time.

use std::sync::Arc;

use uuid::Uuid;

use crate::cache::LocationCache;
use crate::config::PilotConfig;
use crate::display::space::image_rect_to_global;
use crate::display::types::Rect;
use crate::errors::{PilotError, PilotResult};
use crate::executor::click_engine::{
    ClickFallbackEngine, ClickOptions, ClickOutcome, EngineCapabilities,
};
use crate::executor::input::EnigoPointerDriver;
use crate::executor::structural::OsaScriptClicker;
use crate::executor::traits::{ClickObserver, PointerDriver, StructuralClicker};
use crate::perception::capture::XcapCapture;
use crate::perception::traits::{CaptureAdapter, ElementLocator};
use crate::perception::types::ElementLocation;
use crate::perception::vision::HttpVisionLocator;
use crate::wait::{CancelFlag, WaitEngine, WaitOutcome};

pub struct SessionBuilder {
    config: PilotConfig,
    capture: Option<Arc<dyn CaptureAdapter>>,
    pointer: Option<Arc<dyn PointerDriver>>,
    structural: Option<Arc<dyn StructuralClicker>>,
    locator: Option<Arc<dyn ElementLocator>>,
    observer: Option<Arc<dyn ClickObserver>>,
    cache: Option<Arc<LocationCache>>,
}

impl SessionBuilder {
    pub fn new(config: PilotConfig) -> Self {
        Self {
            config,
            capture: None,
            pointer: None,
            structural: None,
            locator: None,
            observer: None,
            cache: None,
        }
    }

    pub fn capture(mut self, capture: Arc<dyn CaptureAdapter>) -> Self {
        self.capture = Some(capture);
        self
    }

    pub fn pointer(mut self, pointer: Arc<dyn PointerDriver>) -> Self {
        self.pointer = Some(pointer);
        self
    }

    pub fn structural(mut self, structural: Arc<dyn StructuralClicker>) -> Self {
        self.structural = Some(structural);
        self
    }

    pub fn locator(mut self, locator: Arc<dyn ElementLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ClickObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Share a cache across sessions; a private one is created otherwise.
    pub fn shared_cache(mut self, cache: Arc<LocationCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> PilotResult<AutomationSession> {
        let capture = self
            .capture
            .ok_or_else(|| PilotError::Config("session requires a capture adapter".into()))?;
        let pointer = self
            .pointer
            .ok_or_else(|| PilotError::Config("session requires a pointer driver".into()))?;

        let mut click = ClickFallbackEngine::new(capture.clone(), pointer.clone())
            .with_min_confidence(self.config.engine.min_confidence);
        if let Some(structural) = self.structural {
            click = click.with_structural(structural);
        }
        if let Some(locator) = &self.locator {
            click = click.with_locator(locator.clone());
        }
        if let Some(observer) = self.observer {
            click = click.with_observer(observer);
        }

        let wait = self.locator.as_ref().map(|locator| {
            WaitEngine::new(capture.clone(), locator.clone())
                .with_config((&self.config.wait).into())
                .with_min_confidence(self.config.engine.min_confidence)
        });

        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(LocationCache::new(self.config.engine.cache_ttl())));

        let session = AutomationSession {
            id: Uuid::new_v4(),
            click,
            wait,
            cache,
            capture,
            pointer,
            locator: self.locator,
        };
        tracing::info!(
            session = %session.id,
            capabilities = ?session.capabilities(),
            "session ready"
        );
        Ok(session)
    }
}

pub struct AutomationSession {
    id: Uuid,
    click: ClickFallbackEngine,
    wait: Option<WaitEngine>,
    cache: Arc<LocationCache>,
    capture: Arc<dyn CaptureAdapter>,
    pointer: Arc<dyn PointerDriver>,
    locator: Option<Arc<dyn ElementLocator>>,
}

impl AutomationSession {
    pub fn builder(config: PilotConfig) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    /// Wires the native adapters: xcap capture, enigo pointer, osascript
    /// structural clicker, and the HTTP vision locator when configured.
    pub fn native(config: PilotConfig) -> PilotResult<Self> {
        let mut builder = SessionBuilder::new(config.clone())
            .capture(Arc::new(XcapCapture))
            .pointer(Arc::new(EnigoPointerDriver))
            .structural(Arc::new(OsaScriptClicker));
        if let Some(vision) = &config.vision {
            let api_key = vision.resolve_api_key()?;
            builder = builder.locator(Arc::new(HttpVisionLocator::new(
                vision.api_base.clone(),
                api_key,
                vision.model.clone(),
            )));
        }
        builder.build()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn capabilities(&self) -> EngineCapabilities {
        self.click.capabilities()
    }

    pub async fn click_element(
        &self,
        app: &str,
        element: &str,
        window: Option<&str>,
        opts: &ClickOptions,
    ) -> ClickOutcome {
        self.click.click_element(app, element, window, opts).await
    }

    /// Resolves a named panel's global-space region, consulting the cache
    /// first. A locator miss is `Ok(None)`, not an error; only a capture or
    /// locator failure errors.
    pub async fn find_panel(&self, name: &str) -> PilotResult<Option<Rect>> {
        if let Some(region) = self.cache.get(name) {
            tracing::debug!(session = %self.id, panel = name, "panel cache hit");
            return Ok(Some(region));
        }

        let locator = self.locator.as_ref().ok_or(PilotError::LocatorUnavailable)?;
        let image = self.capture.capture_all().await?;
        let description = format!("the {name} panel");
        match locator.locate(&image, &description).await? {
            None => Ok(None),
            Some(location) => {
                let region = panel_region(&image, &location);
                self.cache.put(name, region);
                tracing::debug!(session = %self.id, panel = name, ?region, "panel resolved");
                Ok(Some(region))
            }
        }
    }

    pub fn invalidate_panel(&self, name: Option<&str>) {
        self.cache.invalidate(name);
    }

    pub async fn wait_for_element(
        &self,
        description: &str,
        cancel: Option<CancelFlag>,
    ) -> PilotResult<WaitOutcome<ElementLocation>> {
        let wait = self.wait.as_ref().ok_or(PilotError::LocatorUnavailable)?;
        Ok(wait.wait_for_element(description, cancel).await)
    }

    pub async fn wait_for_element_gone(
        &self,
        description: &str,
        cancel: Option<CancelFlag>,
    ) -> PilotResult<WaitOutcome<ElementLocation>> {
        let wait = self.wait.as_ref().ok_or(PilotError::LocatorUnavailable)?;
        Ok(wait.wait_for_element_gone(description, cancel).await)
    }

    pub async fn wait_for_text(
        &self,
        text: &str,
        cancel: Option<CancelFlag>,
    ) -> PilotResult<WaitOutcome<ElementLocation>> {
        let wait = self.wait.as_ref().ok_or(PilotError::LocatorUnavailable)?;
        Ok(wait.wait_for_text(text, cancel).await)
    }

    pub async fn wait_for_any(
        &self,
        descriptions: &[&str],
        cancel: Option<CancelFlag>,
    ) -> PilotResult<WaitOutcome<(usize, ElementLocation)>> {
        let wait = self.wait.as_ref().ok_or(PilotError::LocatorUnavailable)?;
        Ok(wait.wait_for_any(descriptions, cancel).await)
    }

    pub async fn double_click(&self, x: i32, y: i32) -> PilotResult<()> {
        self.pointer.double_click(x, y).await
    }

    pub async fn drag(&self, from: (i32, i32), to: (i32, i32), steps: u32) -> PilotResult<()> {
        self.pointer.drag(from.0, from.1, to.0, to.1, steps).await
    }
}

/// Global-space region for a resolved panel: the locator's bounding box
/// when present, otherwise a zero-sized region at the click point (its
/// center is still the point to interact with).
fn panel_region(
    image: &crate::perception::types::CapturedImage,
    location: &ElementLocation,
) -> Rect {
    match &location.bounding_box {
        Some(bbox) => image_rect_to_global(image, bbox),
        None => {
            let (x, y) = crate::display::space::image_to_global(image, location.x, location.y);
            Rect::new(x, y, 0.0, 0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::display::types::CombinedSpace;
    use crate::perception::types::CapturedImage;

    struct StubCapture;

    #[async_trait]
    impl CaptureAdapter for StubCapture {
        async fn capture_all(&self) -> PilotResult<CapturedImage> {
            Ok(CapturedImage {
                bytes: Vec::new(),
                width: 3840,
                height: 1080,
                scale_factor: 1.0,
                combined_space: CombinedSpace {
                    min_x: -1920.0,
                    min_y: 0.0,
                    max_x: 1920.0,
                    max_y: 1080.0,
                },
                displays: Vec::new(),
            })
        }
    }

    struct CountingLocator {
        calls: AtomicUsize,
        hit: bool,
    }

    #[async_trait]
    impl ElementLocator for CountingLocator {
        async fn locate(
            &self,
            _: &CapturedImage,
            _: &str,
        ) -> PilotResult<Option<ElementLocation>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.hit {
                return Ok(None);
            }
            Ok(Some(ElementLocation {
                x: 2000.0,
                y: 100.0,
                confidence: 0.9,
                bounding_box: Some(Rect::new(1900.0, 50.0, 200.0, 100.0)),
                kind: None,
            }))
        }
    }

    struct NullPointer;

    #[async_trait]
    impl PointerDriver for NullPointer {
        async fn click(&self, _: i32, _: i32) -> PilotResult<()> {
            Ok(())
        }
        async fn double_click(&self, _: i32, _: i32) -> PilotResult<()> {
            Ok(())
        }
        async fn drag(&self, _: i32, _: i32, _: i32, _: i32, _: u32) -> PilotResult<()> {
            Ok(())
        }
    }

    fn session(locator: Arc<CountingLocator>) -> AutomationSession {
        AutomationSession::builder(PilotConfig::default())
            .capture(Arc::new(StubCapture))
            .pointer(Arc::new(NullPointer))
            .locator(locator)
            .build()
            .expect("session builds")
    }

    #[tokio::test]
    async fn panel_lookup_hits_locator_once_then_serves_from_cache() {
        let locator = Arc::new(CountingLocator {
            calls: AtomicUsize::new(0),
            hit: true,
        });
        let s = session(locator.clone());

        let first = s.find_panel("Console").await.expect("lookup").expect("found");
        // Bounding box mapped from image pixels into global space.
        assert_eq!(first, Rect::new(-20.0, 50.0, 200.0, 100.0));

        let second = s.find_panel("Debug Console").await.expect("lookup").expect("found");
        assert_eq!(second, first);
        assert_eq!(locator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panel_miss_is_not_an_error_and_is_not_cached() {
        let locator = Arc::new(CountingLocator {
            calls: AtomicUsize::new(0),
            hit: false,
        });
        let s = session(locator.clone());

        assert!(s.find_panel("Console").await.expect("lookup").is_none());
        assert!(s.find_panel("Console").await.expect("lookup").is_none());
        assert_eq!(locator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidation_forces_a_fresh_lookup() {
        let locator = Arc::new(CountingLocator {
            calls: AtomicUsize::new(0),
            hit: true,
        });
        let s = session(locator.clone());

        s.find_panel("Console").await.expect("lookup");
        s.invalidate_panel(Some("Console"));
        s.find_panel("Console").await.expect("lookup");
        assert_eq!(locator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn session_without_locator_reports_unavailable() {
        let s = AutomationSession::builder(PilotConfig::default())
            .capture(Arc::new(StubCapture))
            .pointer(Arc::new(NullPointer))
            .build()
            .expect("session builds");

        assert!(!s.capabilities().has_vision_locator);
        assert!(matches!(
            s.find_panel("Console").await,
            Err(PilotError::LocatorUnavailable)
        ));
        assert!(matches!(
            s.wait_for_element("anything", None).await,
            Err(PilotError::LocatorUnavailable)
        ));
    }

    #[test]
    fn builder_requires_capture_and_pointer() {
        let result = AutomationSession::builder(PilotConfig::default()).build();
        assert!(matches!(result, Err(PilotError::Config(_))));
    }
}
