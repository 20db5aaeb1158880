use serde::{Deserialize, Serialize};

use crate::ratios::AspectRatio;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimited,
    ModelNotFound,
    HttpStatus,
    Network,
    InvalidPayload,
    UnexpectedText,
    EmptyResponse,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::ModelNotFound => "model_not_found",
            Self::HttpStatus => "http_status",
            Self::Network => "network",
            Self::InvalidPayload => "invalid_payload",
            Self::UnexpectedText => "unexpected_text",
            Self::EmptyResponse => "empty_response",
        }
    }
}

/// Outcome of the diagnostic models listing issued after a 404.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModelDiscovery {
    Listed { models: Vec<String> },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VariantResult {
    Success {
        id: String,
        ratio: AspectRatio,
        image_url: String,
    },
    Failure {
        id: String,
        ratio: AspectRatio,
        kind: FailureKind,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        discovery: Option<ModelDiscovery>,
    },
}

impl VariantResult {
    pub fn id(&self) -> &str {
        match self {
            Self::Success { id, .. } | Self::Failure { id, .. } => id.as_str(),
        }
    }

    pub fn ratio(&self) -> &AspectRatio {
        match self {
            Self::Success { ratio, .. } | Self::Failure { ratio, .. } => ratio,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn image_url(&self) -> Option<&str> {
        match self {
            Self::Success { image_url, .. } => Some(image_url.as_str()),
            Self::Failure { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { message, .. } => Some(message.as_str()),
        }
    }
}

/// Ordered outcomes, one per requested ratio.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub variants: Vec<VariantResult>,
}

impl BatchResult {
    pub fn new(variants: Vec<VariantResult>) -> Self {
        Self { variants }
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariantResult> {
        self.variants.iter()
    }

    pub fn succeeded(&self) -> usize {
        self.variants.iter().filter(|row| row.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// True when there is something to export and nothing failed.
    pub fn all_succeeded(&self) -> bool {
        !self.is_empty() && self.failed() == 0
    }
}
