use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

pub const DEFAULT_IMAGE_MIME: &str = "image/png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataUriError {
    MissingScheme,
    MissingSeparator,
    NotBase64,
    MissingMimeType,
    EmptyPayload,
}

impl fmt::Display for DataUriError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::MissingScheme => "data URI must start with `data:`",
            Self::MissingSeparator => "data URI has no `,` between header and payload",
            Self::NotBase64 => "data URI header is missing the `;base64` marker",
            Self::MissingMimeType => "data URI header has no MIME type",
            Self::EmptyPayload => "data URI payload is empty",
        };
        f.write_str(message)
    }
}

impl std::error::Error for DataUriError {}

/// Splits `data:<mime>[;param=value]*;base64,<payload>` into `(mime, payload)`.
/// Parameters such as `name=` or `charset=` are skipped.
pub fn parse_data_uri(raw: &str) -> Result<(&str, &str), DataUriError> {
    let rest = raw
        .trim()
        .strip_prefix("data:")
        .ok_or(DataUriError::MissingScheme)?;
    let (header, payload) = rest.split_once(',').ok_or(DataUriError::MissingSeparator)?;
    let (mime, params) = header.split_once(';').ok_or(DataUriError::NotBase64)?;
    let encoding = params.rsplit(';').next().unwrap_or_default().trim();
    if !encoding.eq_ignore_ascii_case("base64") {
        return Err(DataUriError::NotBase64);
    }
    let mime = mime.trim();
    if mime.is_empty() {
        return Err(DataUriError::MissingMimeType);
    }
    if payload.is_empty() {
        return Err(DataUriError::EmptyPayload);
    }
    Ok((mime, payload))
}

pub fn format_data_uri(mime_type: &str, base64_data: &str) -> String {
    format!("data:{mime_type};base64,{base64_data}")
}

/// Image the caller wants edited, held as MIME type plus base64 payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub mime_type: String,
    pub base64_data: String,
}

impl SourceImage {
    pub fn from_data_uri(raw: &str) -> Result<Self, DataUriError> {
        let (mime_type, base64_data) = parse_data_uri(raw)?;
        Ok(Self {
            mime_type: mime_type.to_string(),
            base64_data: base64_data.to_string(),
        })
    }

    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            base64_data: BASE64.encode(bytes),
        }
    }

    pub fn to_data_uri(&self) -> String {
        format_data_uri(&self.mime_type, &self.base64_data)
    }
}

/// Image returned by the provider for one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub mime_type: String,
    pub base64_data: String,
}

impl ImagePayload {
    pub fn from_data_uri(raw: &str) -> Result<Self, DataUriError> {
        let (mime_type, base64_data) = parse_data_uri(raw)?;
        Ok(Self {
            mime_type: mime_type.to_string(),
            base64_data: base64_data.to_string(),
        })
    }

    pub fn to_data_uri(&self) -> String {
        format_data_uri(&self.mime_type, &self.base64_data)
    }

    pub fn decode_bytes(&self) -> anyhow::Result<Vec<u8>> {
        Ok(BASE64.decode(self.base64_data.as_bytes())?)
    }

    /// File extension matching the MIME type, `png` when unknown.
    pub fn extension(&self) -> &'static str {
        let lowered = self.mime_type.to_ascii_lowercase();
        if lowered.contains("jpeg") || lowered.contains("jpg") {
            return "jpg";
        }
        if lowered.contains("webp") {
            return "webp";
        }
        "png"
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_data_uri, DataUriError, ImagePayload, SourceImage};

    #[test]
    fn parses_standard_data_uri() -> anyhow::Result<()> {
        let image = SourceImage::from_data_uri("data:image/jpeg;base64,/9j/4AAQ")?;
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.base64_data, "/9j/4AAQ");
        assert_eq!(image.to_data_uri(), "data:image/jpeg;base64,/9j/4AAQ");
        Ok(())
    }

    #[test]
    fn rejects_malformed_data_uris() {
        assert_eq!(
            parse_data_uri("image/png;base64,AAAA"),
            Err(DataUriError::MissingScheme)
        );
        assert_eq!(
            parse_data_uri("data:image/png;base64"),
            Err(DataUriError::MissingSeparator)
        );
        assert_eq!(
            parse_data_uri("data:image/png,AAAA"),
            Err(DataUriError::NotBase64)
        );
        assert_eq!(
            parse_data_uri("data:;base64,AAAA"),
            Err(DataUriError::MissingMimeType)
        );
        assert_eq!(
            parse_data_uri("data:image/png;base64,"),
            Err(DataUriError::EmptyPayload)
        );
        assert_eq!(
            parse_data_uri("data:image/png;base64;charset=utf-8,AAAA"),
            Err(DataUriError::NotBase64)
        );
    }

    #[test]
    fn header_parameters_before_base64_are_skipped() -> anyhow::Result<()> {
        assert_eq!(
            parse_data_uri("data:image/png;name=banner.png;base64,AAAA")?,
            ("image/png", "AAAA")
        );
        let image =
            SourceImage::from_data_uri("data:image/jpeg;charset=binary;name=a.jpg;base64,/9j/")?;
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.base64_data, "/9j/");
        Ok(())
    }

    #[test]
    fn from_bytes_encodes_payload() {
        let image = SourceImage::from_bytes("image/png", b"png-bytes");
        assert_eq!(image.base64_data, "cG5nLWJ5dGVz");
    }

    #[test]
    fn payload_decodes_and_picks_extension() -> anyhow::Result<()> {
        let payload = ImagePayload::from_data_uri("data:image/jpeg;base64,cG5nLWJ5dGVz")?;
        assert_eq!(payload.decode_bytes()?, b"png-bytes".to_vec());
        assert_eq!(payload.extension(), "jpg");

        let webp = ImagePayload {
            mime_type: "image/webp".to_string(),
            base64_data: String::new(),
        };
        assert_eq!(webp.extension(), "webp");
        Ok(())
    }
}
