//! HTTP vision locator.
//!
//! Sends the stitched capture plus a natural-language description to an
//! OpenAI-compatible multimodal endpoint and parses a JSON answer out of
//! the reply. Coordinates in the answer are pixels in the submitted image.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;

use crate::display::types::Rect;
use crate::errors::{PilotError, PilotResult};
use crate::perception::traits::ElementLocator;
use crate::perception::types::{CapturedImage, ElementKind, ElementLocation};

pub struct HttpVisionLocator {
    api_base: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl HttpVisionLocator {
    pub fn new(api_base: String, api_key: String, model: String) -> Self {
        Self {
            api_base,
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct LocatorAnswer {
    found: bool,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    bbox: Option<[f64; 4]>,
    #[serde(default)]
    kind: Option<String>,
}

#[async_trait]
impl ElementLocator for HttpVisionLocator {
    async fn locate(
        &self,
        image: &CapturedImage,
        description: &str,
    ) -> PilotResult<Option<ElementLocation>> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
        let prompt = format!(
            "Locate this UI element in the screenshot: {description}. \
             The screenshot is {w}x{h} pixels. Reply with exactly one JSON object: \
             {{\"found\": true|false, \"x\": <px>, \"y\": <px>, \"confidence\": <0..1>, \
             \"bbox\": [x, y, width, height] or null, \"kind\": \"button|input|link|text|icon|menu|panel\" or null}}. \
             x and y are the pixel coordinates of the element's click point.",
            w = image.width,
            h = image.height,
        );

        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0.0,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    {
                        "type": "image_url",
                        "image_url": { "url": format!("data:image/png;base64,{encoded}") }
                    }
                ]
            }],
        });

        // Log without the base64 payload.
        tracing::debug!(
            model = %self.model,
            description = %description,
            image_bytes = image.bytes.len(),
            "sending locate request"
        );

        let response = self
            .client
            .post(&self.api_base)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(PilotError::Locator(format!("{status}: {err_body}")));
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| PilotError::Locator("response has no choices".into()))?;

        let answer = parse_answer(content)?;
        if !answer.found {
            tracing::debug!(description = %description, "locator reports element not found");
            return Ok(None);
        }

        let location = ElementLocation {
            x: answer.x,
            y: answer.y,
            confidence: answer.confidence.clamp(0.0, 1.0),
            bounding_box: answer
                .bbox
                .map(|[x, y, w, h]| Rect::new(x, y, w, h)),
            kind: answer.kind.as_deref().map(parse_kind),
        };
        tracing::debug!(
            x = location.x,
            y = location.y,
            confidence = location.confidence,
            "locator hit"
        );
        Ok(Some(location))
    }
}

/// Extracts the first JSON object from the model's reply. Tolerates prose
/// or code fences around it.
fn parse_answer(content: &str) -> PilotResult<LocatorAnswer> {
    let start = content
        .find('{')
        .ok_or_else(|| PilotError::Locator(format!("no JSON object in reply: {content}")))?;
    let end = content
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| PilotError::Locator(format!("unterminated JSON in reply: {content}")))?;
    serde_json::from_str(&content[start..=end])
        .map_err(|e| PilotError::Locator(format!("malformed locator answer: {e}")))
}

fn parse_kind(kind: &str) -> ElementKind {
    match kind.to_ascii_lowercase().as_str() {
        "button" => ElementKind::Button,
        "input" => ElementKind::Input,
        "link" => ElementKind::Link,
        "text" => ElementKind::Text,
        "icon" => ElementKind::Icon,
        "menu" => ElementKind::Menu,
        "panel" => ElementKind::Panel,
        _ => ElementKind::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_answer_with_surrounding_prose() {
        let content = "Here is the result:\n```json\n{\"found\": true, \"x\": 120.5, \
                       \"y\": 64, \"confidence\": 0.92, \"bbox\": [100, 50, 40, 28], \
                       \"kind\": \"button\"}\n```";
        let answer = parse_answer(content).expect("parses");
        assert!(answer.found);
        assert_eq!(answer.x, 120.5);
        assert_eq!(answer.bbox, Some([100.0, 50.0, 40.0, 28.0]));
    }

    #[test]
    fn rejects_reply_without_json() {
        assert!(parse_answer("I could not find it, sorry.").is_err());
    }

    #[test]
    fn kind_parsing_is_lenient() {
        assert_eq!(parse_kind("Button"), ElementKind::Button);
        assert_eq!(parse_kind("toolbar"), ElementKind::Unknown);
    }
}
