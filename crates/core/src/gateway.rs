//! Remote keyword classification of a cropped chat region.
//!
//! Every failure (missing key, network, timeout, status, body) degrades to a
//! zero-confidence "not related" verdict so the caller keeps scanning.

use std::io::Cursor;
use std::sync::OnceLock;
use std::time::Duration;

use base64::{engine::general_purpose, Engine};
use image::{DynamicImage, ImageFormat, RgbaImage};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AutomationError, Result};
use crate::logger;
use crate::settings::GatewaySettings;

/// Minimum confidence (0-100) for a verdict to count as a match, whatever
/// the gateway itself claims.
pub const ACCEPT_CONFIDENCE: u8 = 70;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub is_related: bool,
    pub confidence: u8,
    pub explanation: String,
    pub extracted_content: String,
}

impl Verdict {
    pub fn unrelated(explanation: impl Into<String>) -> Self {
        Self {
            explanation: explanation.into(),
            ..Self::default()
        }
    }

    pub fn accepts(&self) -> bool {
        self.is_related && self.confidence >= ACCEPT_CONFIDENCE
    }
}

/// Decides whether an image region relates to any of `keywords`.
pub trait Classifier {
    fn classify(&mut self, region: &RgbaImage, keywords: &[String]) -> Verdict;
}

#[derive(Deserialize)]
struct RawVerdict {
    is_related: Option<bool>,
    is_related_to_any: Option<bool>,
    confidence: Option<f64>,
    explanation: Option<String>,
    extracted_content: Option<String>,
}

fn fence_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[a-zA-Z]*\s*(.*?)\s*```").ok())
        .as_ref()
}

/// Parse the classifier's reply. Tolerates code fences and prose around the
/// JSON object.
pub fn parse_verdict(text: &str) -> Result<Verdict> {
    let mut body = text.trim();
    if let Some(caps) = fence_re().and_then(|re| re.captures(body)) {
        if let Some(inner) = caps.get(1) {
            body = inner.as_str();
        }
    }
    let start = body.find('{');
    let end = body.rfind('}');
    let json_text = match (start, end) {
        (Some(s), Some(e)) if s < e => &body[s..=e],
        _ => return Err(AutomationError::Gateway(format!("no JSON object in reply: {:?}", text))),
    };

    let raw: RawVerdict = serde_json::from_str(json_text)
        .map_err(|e| AutomationError::Gateway(format!("malformed verdict: {}", e)))?;

    Ok(Verdict {
        is_related: raw.is_related.unwrap_or(false) || raw.is_related_to_any.unwrap_or(false),
        confidence: raw.confidence.unwrap_or(0.0).round().clamp(0.0, 100.0) as u8,
        explanation: raw.explanation.unwrap_or_default(),
        extracted_content: raw.extracted_content.unwrap_or_default(),
    })
}

/// Natural-language instruction sent along with the image.
pub fn instruction(keywords: &[String]) -> String {
    let reply = "Reply with only a JSON object: \
        {\"is_related\": true|false, \"confidence\": 0-100, \
        \"explanation\": \"...\", \"extracted_content\": \"...\"}. \
        extracted_content is the text you read in the image, in its original language.";
    match keywords {
        [single] => format!(
            "This image is a chat message block from a Chinese mobile game. \
             Decide whether the message is related to the keyword \"{}\". {}",
            single, reply
        ),
        many => format!(
            "This image is a chat message block from a Chinese mobile game. \
             Decide whether the message is related to any of these keywords: {}. {}",
            many.iter().map(|k| format!("\"{}\"", k)).collect::<Vec<_>>().join(", "),
            reply
        ),
    }
}

pub fn encode_png_base64(region: &RgbaImage) -> Result<String> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(region.clone())
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| AutomationError::Gateway(format!("png encode: {}", e)))?;
    Ok(general_purpose::STANDARD.encode(&buf))
}

/// Chat-completions vision endpoint (OpenAI-compatible).
pub struct OpenAiGateway {
    settings: GatewaySettings,
    api_key: Option<String>,
    client: Option<reqwest::blocking::Client>,
}

impl OpenAiGateway {
    /// Reads the API key from the configured environment variable.
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        let api_key = std::env::var(&settings.api_key_env).ok().filter(|k| !k.is_empty());
        Self::new(settings, api_key)
    }

    pub fn new(settings: &GatewaySettings, api_key: Option<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build();
        let client = match client {
            Ok(c) => Some(c),
            Err(e) => {
                logger::error_p("gateway", &format!("failed to build HTTP client: {}", e));
                None
            }
        };
        Self { settings: settings.clone(), api_key, client }
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() && self.client.is_some()
    }

    fn request(&self, region: &RgbaImage, keywords: &[String]) -> Result<Verdict> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            AutomationError::Gateway(format!("no API key (set {})", self.settings.api_key_env))
        })?;
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AutomationError::Gateway("HTTP client unavailable".into()))?;

        let image_b64 = encode_png_base64(region)?;
        let payload = json!({
            "model": self.settings.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": instruction(keywords) },
                    { "type": "image_url", "image_url": { "url": format!("data:image/png;base64,{}", image_b64) } }
                ]
            }],
            "max_tokens": self.settings.max_tokens,
        });

        let resp = client
            .post(&self.settings.api_url)
            .bearer_auth(key)
            .json(&payload)
            .send()
            .map_err(|e| AutomationError::Gateway(format!("request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(AutomationError::Gateway(format!("status {}: {}", status, text)));
        }

        let body: serde_json::Value = resp
            .json()
            .map_err(|e| AutomationError::Gateway(format!("unreadable response: {}", e)))?;
        let content = body
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AutomationError::Gateway("response has no message content".into()))?;

        parse_verdict(content)
    }
}

impl Classifier for OpenAiGateway {
    fn classify(&mut self, region: &RgbaImage, keywords: &[String]) -> Verdict {
        match self.request(region, keywords) {
            Ok(v) => {
                logger::debug_p(
                    "gateway",
                    &format!("related={} confidence={} ({})", v.is_related, v.confidence, v.explanation),
                );
                v
            }
            Err(e) => {
                logger::warn_p("gateway", &e.to_string());
                Verdict::unrelated(e.to_string())
            }
        }
    }
}
