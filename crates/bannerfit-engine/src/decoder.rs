use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bannerfit_contracts::image::{ImagePayload, DEFAULT_IMAGE_MIME};
use serde_json::Value;

const TEXT_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The model answered with text (usually a refusal) instead of an image.
    UnexpectedText { preview: String },
    /// An inline part was present but its `data` is not valid base64.
    InvalidImageData { message: String },
    Empty,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedText { preview } => {
                write!(f, "model returned text instead of an image: {preview}")
            }
            Self::InvalidImageData { message } => {
                write!(f, "inline image data is not valid base64: {message}")
            }
            Self::Empty => f.write_str("no image generated in response"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Pulls the first inline image out of the first candidate.
pub fn decode(response: &Value) -> Result<ImagePayload, DecodeError> {
    let parts = response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    if let Some(payload) = parts.iter().find_map(inline_image) {
        BASE64
            .decode(payload.base64_data.as_bytes())
            .map_err(|err| DecodeError::InvalidImageData {
                message: err.to_string(),
            })?;
        return Ok(payload);
    }

    let text = parts.iter().find_map(|part| {
        part.get("text")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
    });
    match text {
        Some(text) => Err(DecodeError::UnexpectedText {
            preview: truncate_text(text, TEXT_PREVIEW_CHARS),
        }),
        None => Err(DecodeError::Empty),
    }
}

fn inline_image(part: &Value) -> Option<ImagePayload> {
    let inline = part
        .get("inlineData")
        .or_else(|| part.get("inline_data"))
        .and_then(Value::as_object)?;
    let data = inline
        .get("data")
        .and_then(Value::as_str)
        .filter(|data| !data.is_empty())?;
    let mime_type = inline
        .get("mimeType")
        .or_else(|| inline.get("mime_type"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|mime| !mime.is_empty())
        .unwrap_or(DEFAULT_IMAGE_MIME);
    Some(ImagePayload {
        mime_type: mime_type.to_string(),
        base64_data: data.to_string(),
    })
}

/// Keeps the first `max_chars` characters, marking a cut with `...`.
pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "..."
}
