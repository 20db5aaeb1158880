use std::env;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-3-pro-image-preview";
/// Upper bound for the inter-call pause, wherever it comes from.
pub const MAX_PACING_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub api_base: String,
    pub model: String,
    /// Wait between two consecutive provider calls.
    pub pacing_delay: Duration,
    pub request_timeout: Duration,
    pub pace_after_last: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            pacing_delay: Duration::from_millis(5000),
            request_timeout: Duration::from_secs(90),
            pace_after_last: false,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; blank values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let api_base = read("GEMINI_API_BASE")
            .map(|value| value.trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.api_base);
        let model = read("BANNERFIT_MODEL")
            .map(|value| value.trim_start_matches("models/").to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.model);
        let pacing_ms = parse_clamped(
            read("BANNERFIT_PACING_MS"),
            5000.0,
            0.0,
            MAX_PACING_MS as f64,
        );
        let timeout_s = parse_clamped(read("BANNERFIT_REQUEST_TIMEOUT"), 90.0, 15.0, 300.0);
        let pace_after_last = read("BANNERFIT_PACE_AFTER_LAST")
            .map(|value| parse_flag(&value))
            .unwrap_or(defaults.pace_after_last);

        Self {
            api_base,
            model,
            pacing_delay: Duration::from_millis(pacing_ms.round() as u64),
            request_timeout: Duration::from_secs_f64(timeout_s),
            pace_after_last,
        }
    }

    /// Overrides the pause, capped at [`MAX_PACING_MS`].
    pub fn with_pacing_delay(mut self, delay: Duration) -> Self {
        self.pacing_delay = delay.min(Duration::from_millis(MAX_PACING_MS));
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn generate_endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    pub fn models_endpoint(&self) -> String {
        format!("{}/models", self.api_base)
    }
}

/// First non-blank of `GEMINI_API_KEY`, `GOOGLE_API_KEY`.
pub fn api_key_from_env() -> Option<String> {
    non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_clamped(raw: Option<String>, default: f64, min: f64, max: f64) -> f64 {
    raw.and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(default)
        .clamp(min, max)
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
