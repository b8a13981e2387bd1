use thiserror::Error;

#[derive(Debug, Error)]
pub enum PilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capture failure: {0}")]
    Capture(String),

    #[error("No vision locator configured")]
    LocatorUnavailable,

    #[error("Locator error: {0}")]
    Locator(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Confidence {confidence:.2} below gate {threshold:.2}")]
    LowConfidence { confidence: f32, threshold: f32 },

    #[error("Pointer event rejected: {0}")]
    ClickPost(String),

    #[error("Timed out")]
    Timeout,

    #[error("Cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl serde::Serialize for PilotError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type PilotResult<T> = Result<T, PilotError>;
