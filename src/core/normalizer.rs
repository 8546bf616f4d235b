//! Extracts assistant text from the payload shapes gateways actually send.
//!
//! OpenAI-compatible backends disagree on where incremental text lives. The
//! known places are listed below as two ordered extractor chains:
//! [`APPENDING`] contributions are concatenated in order, and [`FALLBACKS`]
//! are consulted only when the appending chain produced nothing, first
//! non-empty hit wins. An `error` object in the payload short-circuits
//! everything.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::api::{ChatResponse, ChatResponseChoice, Usage};
use crate::core::errors::ApiError;
use crate::core::frames::StreamFrame;

pub const GENERATED_IMAGE_ALT: &str = "Generated Image";

/// Text contributed by one frame. `text` may be empty, and empty text is
/// never forwarded as a token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedDelta {
    pub text: String,
    pub terminal: bool,
}

impl NormalizedDelta {
    fn text(text: String) -> Self {
        Self {
            text,
            terminal: false,
        }
    }

    fn terminal() -> Self {
        Self {
            text: String::new(),
            terminal: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The JSON ended early; upstream buffering sometimes does this.
    Truncated,
    /// The payload is not JSON of any recognisable shape.
    Malformed(String),
    /// The payload parsed and carried an error object.
    Upstream(ApiError),
}

impl FrameError {
    fn from_json(err: serde_json::Error) -> Self {
        if err.is_eof() {
            FrameError::Truncated
        } else {
            FrameError::Malformed(err.to_string())
        }
    }
}

pub struct Extractor {
    pub name: &'static str,
    pub extract: fn(&ChatResponseChoice) -> Option<String>,
}

pub const APPENDING: &[Extractor] = &[
    Extractor {
        name: "delta.content",
        extract: delta_content,
    },
    Extractor {
        name: "delta.reasoning",
        extract: delta_reasoning,
    },
    Extractor {
        name: "delta.images",
        extract: delta_images,
    },
];

pub const FALLBACKS: &[Extractor] = &[
    Extractor {
        name: "text",
        extract: legacy_text,
    },
    Extractor {
        name: "message.content",
        extract: message_content,
    },
];

fn non_empty(text: Option<&String>) -> Option<String> {
    text.filter(|text| !text.is_empty()).cloned()
}

fn delta_content(choice: &ChatResponseChoice) -> Option<String> {
    non_empty(choice.delta.as_ref()?.content.as_ref())
}

fn delta_reasoning(choice: &ChatResponseChoice) -> Option<String> {
    let delta = choice.delta.as_ref()?;
    non_empty(delta.reasoning.as_ref()).or_else(|| non_empty(delta.reasoning_content.as_ref()))
}

fn delta_images(choice: &ChatResponseChoice) -> Option<String> {
    let images = choice.delta.as_ref()?.images.as_ref()?;
    let rendered: String = images
        .iter()
        .filter_map(|image| image.resolved_url())
        .map(|url| format!("\n{}\n", image_markdown(url)))
        .collect();
    (!rendered.is_empty()).then_some(rendered)
}

fn legacy_text(choice: &ChatResponseChoice) -> Option<String> {
    non_empty(choice.text.as_ref())
}

fn message_content(choice: &ChatResponseChoice) -> Option<String> {
    non_empty(choice.message.as_ref()?.content.as_ref())
}

pub fn image_markdown(url: &str) -> String {
    format!("![{GENERATED_IMAGE_ALT}]({url})")
}

/// Runs both chains over the first choice.
pub fn extract_text(response: &ChatResponse) -> String {
    let Some(choice) = response.choices.first() else {
        return String::new();
    };

    let text: String = APPENDING
        .iter()
        .filter_map(|extractor| (extractor.extract)(choice))
        .collect();
    if !text.is_empty() {
        return text;
    }

    FALLBACKS
        .iter()
        .find_map(|extractor| (extractor.extract)(choice))
        .unwrap_or_default()
}

fn parse_response(payload: &str, status: StatusCode) -> Result<ChatResponse, FrameError> {
    let value: Value = serde_json::from_str(payload).map_err(FrameError::from_json)?;
    if let Some(err) = ApiError::from_payload(status, &value) {
        return Err(FrameError::Upstream(err));
    }
    ChatResponse::deserialize(&value).map_err(FrameError::from_json)
}

/// Normalizes the JSON payload of one `data:` line.
pub fn normalize_payload(payload: &str, status: StatusCode) -> Result<NormalizedDelta, FrameError> {
    let response = parse_response(payload, status)?;
    Ok(NormalizedDelta::text(extract_text(&response)))
}

pub fn normalize_frame(
    frame: &StreamFrame,
    status: StatusCode,
) -> Result<NormalizedDelta, FrameError> {
    match frame {
        StreamFrame::Data(payload) => normalize_payload(payload, status),
        StreamFrame::Done => Ok(NormalizedDelta::terminal()),
        StreamFrame::Ignored => Ok(NormalizedDelta::default()),
        StreamFrame::Invalid => Err(FrameError::Malformed(
            "data line is not valid UTF-8".to_string(),
        )),
    }
}

/// A whole non-streaming response body, reduced to text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedDocument {
    pub text: String,
    pub usage: Option<Usage>,
}

/// Normalizes a complete JSON body. Image-generation responses (a top-level
/// `data` array of assets) become a single inline image reference.
pub fn normalize_document(
    body: &str,
    status: StatusCode,
) -> Result<NormalizedDocument, FrameError> {
    let response = parse_response(body, status)?;

    let generated = response
        .data
        .as_ref()
        .and_then(|assets| assets.first())
        .and_then(|asset| asset.url.as_deref())
        .filter(|url| !url.is_empty());
    if let Some(url) = generated {
        return Ok(NormalizedDocument {
            text: image_markdown(url),
            usage: Some(response.usage.clone().unwrap_or_default()),
        });
    }

    Ok(NormalizedDocument {
        text: extract_text(&response),
        usage: response.usage,
    })
}
