use std::fmt;
use std::thread;

use bannerfit_contracts::events::{EventKind, EventLog};
use bannerfit_contracts::image::{DataUriError, SourceImage};
use bannerfit_contracts::ratios::AspectRatio;
use bannerfit_contracts::variants::{BatchResult, FailureKind, ModelDiscovery, VariantResult};
use serde_json::{json, Map, Value};

use crate::codec::encode;
use crate::config::EngineConfig;
use crate::decoder::{decode, truncate_text, DecodeError};
use crate::discovery::discover_models;
use crate::transport::{GenerationTransport, TransportError};

const ERROR_BODY_MAX_CHARS: usize = 512;

/// Reasons a whole batch is refused before any request goes out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    MissingCredential,
    MissingImage,
    MalformedImage(DataUriError),
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredential => f.write_str("no API key was provided"),
            Self::MissingImage => f.write_str("no source image was provided"),
            Self::MalformedImage(err) => write!(f, "source image is not a usable data URI: {err}"),
        }
    }
}

impl std::error::Error for BatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MalformedImage(err) => Some(err),
            _ => None,
        }
    }
}

/// Runs one provider call per ratio, strictly one at a time, in input order.
///
/// Per-ratio problems are folded into [`VariantResult::Failure`]; only the
/// preconditions in [`BatchError`] make [`generate_batch`](Self::generate_batch)
/// return `Err`.
pub struct BatchOrchestrator<T: GenerationTransport> {
    transport: T,
    config: EngineConfig,
    events: Option<EventLog>,
}

impl<T: GenerationTransport> BatchOrchestrator<T> {
    pub fn new(transport: T, config: EngineConfig) -> Self {
        Self {
            transport,
            config,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn generate_batch(
        &self,
        source_image: Option<&str>,
        ratios: &[AspectRatio],
        api_key: Option<&str>,
        prompt: &str,
    ) -> Result<BatchResult, BatchError> {
        let api_key = api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(BatchError::MissingCredential)?;
        let raw_image = source_image
            .map(str::trim)
            .filter(|image| !image.is_empty())
            .ok_or(BatchError::MissingImage)?;
        let source = SourceImage::from_data_uri(raw_image).map_err(BatchError::MalformedImage)?;

        let ratio_tokens: Vec<&str> = ratios.iter().map(AspectRatio::as_str).collect();
        self.emit(
            EventKind::BatchStarted,
            json!({
                "model": self.config.model,
                "ratios": ratio_tokens,
                "source_mime_type": source.mime_type,
                "prompt_chars": prompt.chars().count(),
                "pacing_delay_ms": self.config.pacing_delay.as_millis() as u64,
            }),
        );

        let mut variants = Vec::with_capacity(ratios.len());
        for (idx, ratio) in ratios.iter().enumerate() {
            let variant = self.generate_variant(idx, &source, prompt, ratio, api_key);
            self.record_outcome(idx, &variant);
            variants.push(variant);

            let is_last = idx + 1 == ratios.len();
            if !is_last || self.config.pace_after_last {
                self.pace(ratio);
            }
        }

        let batch = BatchResult::new(variants);
        self.emit(
            EventKind::BatchFinished,
            json!({
                "requested": batch.len(),
                "succeeded": batch.succeeded(),
                "failed": batch.failed(),
            }),
        );
        Ok(batch)
    }

    fn generate_variant(
        &self,
        idx: usize,
        source: &SourceImage,
        prompt: &str,
        ratio: &AspectRatio,
        api_key: &str,
    ) -> VariantResult {
        let id = new_variant_id();
        let body = encode(source, prompt, ratio);
        self.emit(
            EventKind::VariantDispatched,
            json!({ "index": idx, "id": id, "ratio": ratio.as_str() }),
        );

        let response = match self.transport.generate(&body, api_key) {
            Ok(response) => response,
            Err(err) => return self.transport_failure(id, ratio, err, api_key),
        };

        match decode(&response) {
            Ok(payload) => VariantResult::Success {
                id,
                ratio: ratio.clone(),
                image_url: payload.to_data_uri(),
            },
            Err(err) => {
                let kind = match err {
                    DecodeError::UnexpectedText { .. } => FailureKind::UnexpectedText,
                    DecodeError::InvalidImageData { .. } => FailureKind::InvalidPayload,
                    DecodeError::Empty => FailureKind::EmptyResponse,
                };
                VariantResult::Failure {
                    id,
                    ratio: ratio.clone(),
                    kind,
                    message: err.to_string(),
                    discovery: None,
                }
            }
        }
    }

    fn transport_failure(
        &self,
        id: String,
        ratio: &AspectRatio,
        err: TransportError,
        api_key: &str,
    ) -> VariantResult {
        let mut discovery = None;
        let (kind, message) = match &err {
            TransportError::Status { status: 429, .. } => (
                FailureKind::RateLimited,
                "rate limit exceeded (429); wait a while before retrying".to_string(),
            ),
            TransportError::Status { status: 404, body } => {
                let listed = discover_models(&self.transport, api_key);
                self.emit(EventKind::ModelDiscovery, discovery_payload(ratio, &listed));
                let message = format!(
                    "model `{}` not found (404); {}: {}",
                    self.config.model,
                    discovery_hint(&listed),
                    truncate_text(body, ERROR_BODY_MAX_CHARS)
                );
                discovery = Some(listed);
                (FailureKind::ModelNotFound, message)
            }
            TransportError::Status { status, body } => (
                FailureKind::HttpStatus,
                format!(
                    "API error ({status}): {}",
                    truncate_text(body, ERROR_BODY_MAX_CHARS)
                ),
            ),
            TransportError::Network { .. } => (FailureKind::Network, err.to_string()),
            TransportError::InvalidJson { .. } => (FailureKind::InvalidPayload, err.to_string()),
        };
        VariantResult::Failure {
            id,
            ratio: ratio.clone(),
            kind,
            message,
            discovery,
        }
    }

    fn record_outcome(&self, idx: usize, variant: &VariantResult) {
        match variant {
            VariantResult::Success { id, ratio, .. } => self.emit(
                EventKind::VariantSucceeded,
                json!({ "index": idx, "id": id, "ratio": ratio.as_str() }),
            ),
            VariantResult::Failure {
                id,
                ratio,
                kind,
                message,
                ..
            } => self.emit(
                EventKind::VariantFailed,
                json!({
                    "index": idx,
                    "id": id,
                    "ratio": ratio.as_str(),
                    "kind": kind.as_str(),
                    "message": message,
                }),
            ),
        }
    }

    fn pace(&self, after: &AspectRatio) {
        let delay = self.config.pacing_delay;
        self.emit(
            EventKind::PacingWait,
            json!({ "after_ratio": after.as_str(), "delay_ms": delay.as_millis() as u64 }),
        );
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }

    fn emit(&self, kind: EventKind, payload: Value) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        // Diagnostics only: a failed write leaves the batch untouched.
        let _ = events.emit(kind, map_object(payload));
    }
}

fn discovery_payload(ratio: &AspectRatio, discovery: &ModelDiscovery) -> Value {
    let mut payload = map_object(serde_json::to_value(discovery).unwrap_or(Value::Null));
    payload.insert(
        "ratio".to_string(),
        Value::String(ratio.as_str().to_string()),
    );
    Value::Object(payload)
}

fn discovery_hint(discovery: &ModelDiscovery) -> String {
    match discovery {
        ModelDiscovery::Listed { models } => {
            format!("{} models are available to this key", models.len())
        }
        ModelDiscovery::Failed { message } => format!("listing models also failed ({message})"),
    }
}

fn new_variant_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn map_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
