use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{PilotError, PilotResult};
use crate::wait::WaitConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PilotConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub wait: WaitSettings,
    /// Vision locator endpoint. Absent means sessions run without a vision
    /// locator (structural-only capability).
    #[serde(default)]
    pub vision: Option<VisionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum locator confidence before a vision coordinate is clicked.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// Lifetime of cached panel regions.
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            cache_ttl_ms: default_cache_ttl_ms(),
        }
    }
}

impl EngineConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

fn default_min_confidence() -> f32 {
    crate::executor::click_engine::DEFAULT_MIN_CONFIDENCE
}

fn default_cache_ttl_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitSettings {
    #[serde(default = "default_wait_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub max_error_streak: Option<u32>,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_wait_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_error_streak: None,
        }
    }
}

impl From<&WaitSettings> for WaitConfig {
    fn from(settings: &WaitSettings) -> Self {
        Self {
            timeout: Duration::from_millis(settings.timeout_ms),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            max_error_streak: settings.max_error_streak,
        }
    }
}

fn default_wait_timeout_ms() -> u64 {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Chat-completions endpoint of the vision model.
    pub api_base: String,
    pub model: String,
    /// API key stored in config.toml (falls back to env var
    /// SCREENPILOT_VISION_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
}

impl VisionConfig {
    pub fn resolve_api_key(&self) -> PilotResult<String> {
        if let Some(key) = &self.api_key {
            if !key.is_empty() {
                return Ok(key.clone());
            }
        }
        std::env::var("SCREENPILOT_VISION_API_KEY").map_err(|_| {
            PilotError::Config(
                "vision API key not set in config.toml or SCREENPILOT_VISION_API_KEY".into(),
            )
        })
    }
}

fn resolve_config_path() -> PilotResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("screenpilot.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("screenpilot.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(PilotError::Config(
        "screenpilot.toml not found next to executable or in working directory".into(),
    ))
}

pub fn load_config() -> PilotResult<PilotConfig> {
    // Load .env first so api-key env fallbacks work (ignore if absent).
    let _ = dotenvy::dotenv();

    let path = resolve_config_path()?;
    let content = std::fs::read_to_string(&path)?;
    let config: PilotConfig = toml::from_str(&content)?;
    tracing::info!(
        path = %path.display(),
        min_confidence = config.engine.min_confidence,
        has_vision = config.vision.is_some(),
        "config loaded"
    );
    Ok(config)
}

pub fn save_config(config: &PilotConfig) -> PilotResult<()> {
    let path = resolve_config_path()?;
    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
