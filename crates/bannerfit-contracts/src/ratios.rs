use std::fmt;

use serde::{Deserialize, Serialize};

/// Ratio tokens the image model accepts, in display order.
pub const SUPPORTED_RATIOS: [(&str, &str); 6] = [
    ("16:9", "Landscape (16:9) - video thumbnails"),
    ("4:3", "Standard (4:3) - slides"),
    ("1:1", "Square (1:1) - social feed"),
    ("9:16", "Portrait (9:16) - short video"),
    ("3:4", "Portrait (3:4) - mobile"),
    ("21:9", "Ultra-wide (21:9)"),
];

const DEFAULT_SELECTION: [&str; 4] = ["16:9", "4:3", "1:1", "9:16"];

/// Target aspect ratio token such as `16:9`.
///
/// Tokens outside [`SUPPORTED_RATIOS`] are kept verbatim; the provider decides
/// whether it accepts them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AspectRatio(String);

impl AspectRatio {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_supported(&self) -> bool {
        SUPPORTED_RATIOS
            .iter()
            .any(|(token, _)| *token == self.0.as_str())
    }

    pub fn label(&self) -> Option<&'static str> {
        SUPPORTED_RATIOS
            .iter()
            .find(|(token, _)| *token == self.0.as_str())
            .map(|(_, label)| *label)
    }

    /// Filesystem-friendly form, `16:9` becomes `16x9`.
    pub fn file_stem(&self) -> String {
        self.0
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { 'x' })
            .collect()
    }

    pub fn supported() -> Vec<AspectRatio> {
        SUPPORTED_RATIOS
            .iter()
            .map(|(token, _)| AspectRatio::new(*token))
            .collect()
    }

    pub fn default_selection() -> Vec<AspectRatio> {
        DEFAULT_SELECTION
            .iter()
            .map(|token| AspectRatio::new(*token))
            .collect()
    }

    /// Splits a comma separated list, dropping blank entries.
    pub fn parse_list(raw: &str) -> Vec<AspectRatio> {
        raw.split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(AspectRatio::new)
            .collect()
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AspectRatio {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
