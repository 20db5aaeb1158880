use std::fmt;
use std::time::Duration;

use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::Value;

use crate::config::EngineConfig;

pub const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Non-2xx reply; `body` is the raw response text.
    Status { status: u16, body: String },
    Network { message: String },
    InvalidJson { message: String },
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { status, body } => write!(f, "request failed ({status}): {body}"),
            Self::Network { message } => write!(f, "request could not be completed: {message}"),
            Self::InvalidJson { message } => write!(f, "response was not valid JSON: {message}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// One network round trip per call, never retried.
pub trait GenerationTransport {
    fn generate(&self, body: &Value, api_key: &str) -> Result<Value, TransportError>;

    /// Read-only models listing used for diagnostics.
    fn list_models(&self, api_key: &str) -> Result<Value, TransportError>;
}

impl<T: GenerationTransport + ?Sized> GenerationTransport for &T {
    fn generate(&self, body: &Value, api_key: &str) -> Result<Value, TransportError> {
        (**self).generate(body, api_key)
    }

    fn list_models(&self, api_key: &str) -> Result<Value, TransportError> {
        (**self).list_models(api_key)
    }
}

pub struct GeminiTransport {
    http: HttpClient,
    generate_endpoint: String,
    models_endpoint: String,
    timeout: Duration,
}

impl GeminiTransport {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            http: HttpClient::new(),
            generate_endpoint: config.generate_endpoint(),
            models_endpoint: config.models_endpoint(),
            timeout: config.request_timeout,
        }
    }

    pub fn generate_endpoint(&self) -> &str {
        &self.generate_endpoint
    }
}

impl GenerationTransport for GeminiTransport {
    fn generate(&self, body: &Value, api_key: &str) -> Result<Value, TransportError> {
        let response = self
            .http
            .post(&self.generate_endpoint)
            .header(API_KEY_HEADER, api_key)
            .timeout(self.timeout)
            .json(body)
            .send()
            .map_err(|err| network_error(&self.generate_endpoint, err))?;
        read_response(response)
    }

    fn list_models(&self, api_key: &str) -> Result<Value, TransportError> {
        let response = self
            .http
            .get(&self.models_endpoint)
            .header(API_KEY_HEADER, api_key)
            .timeout(self.timeout)
            .send()
            .map_err(|err| network_error(&self.models_endpoint, err))?;
        read_response(response)
    }
}

fn network_error(endpoint: &str, err: reqwest::Error) -> TransportError {
    // The key travels in a header, so the URL in reqwest's message is safe to log.
    TransportError::Network {
        message: format!("{endpoint}: {err}"),
    }
}

fn read_response(response: HttpResponse) -> Result<Value, TransportError> {
    let status = response.status().as_u16();
    let body = response.text().map_err(|err| TransportError::Network {
        message: format!("response body read failed: {err}"),
    })?;
    parse_response(status, &body)
}

/// 2xx bodies are parsed as JSON, anything else becomes `Status`.
pub fn parse_response(status: u16, body: &str) -> Result<Value, TransportError> {
    if !(200..300).contains(&status) {
        return Err(TransportError::Status {
            status,
            body: body.to_string(),
        });
    }
    serde_json::from_str(body).map_err(|err| TransportError::InvalidJson {
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_response, GeminiTransport, TransportError};
    use crate::config::EngineConfig;

    #[test]
    fn success_status_parses_json() {
        let parsed = parse_response(200, r#"{"candidates":[]}"#);
        assert_eq!(parsed, Ok(json!({ "candidates": [] })));
    }

    #[test]
    fn non_success_status_keeps_raw_body() {
        let err = parse_response(429, "Resource exhausted").unwrap_err();
        assert_eq!(
            err,
            TransportError::Status {
                status: 429,
                body: "Resource exhausted".to_string(),
            }
        );
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.to_string(), "request failed (429): Resource exhausted");
    }

    #[test]
    fn success_with_garbage_body_is_invalid_json() {
        let err = parse_response(204, "").unwrap_err();
        assert!(matches!(err, TransportError::InvalidJson { .. }));
        assert_eq!(err.status(), None);
    }

    #[test]
    fn transport_targets_configured_model() {
        let config = EngineConfig::default().with_model("gemini-2.5-flash-image");
        let transport = GeminiTransport::new(&config);
        assert!(transport
            .generate_endpoint()
            .ends_with("/models/gemini-2.5-flash-image:generateContent"));
    }

    mod http {
        use std::time::Duration;

        use bannerfit_contracts::variants::ModelDiscovery;
        use serde_json::{json, Value};
        use wiremock::matchers::{body_json, header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        use super::super::{GeminiTransport, GenerationTransport, TransportError, API_KEY_HEADER};
        use crate::config::EngineConfig;
        use crate::discovery::discover_models;

        const KEY: &str = "secret-key";

        fn config_for(server: &MockServer) -> EngineConfig {
            EngineConfig {
                api_base: format!("{}/v1beta", server.uri()),
                request_timeout: Duration::from_secs(5),
                ..EngineConfig::default()
            }
            .with_model("gemini-test")
        }

        /// The blocking client owns its own runtime, so it has to live off the async workers.
        async fn with_transport<F, R>(config: EngineConfig, call: F) -> R
        where
            F: FnOnce(&GeminiTransport) -> R + Send + 'static,
            R: Send + 'static,
        {
            tokio::task::spawn_blocking(move || call(&GeminiTransport::new(&config)))
                .await
                .expect("blocking transport task panicked")
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn generate_posts_json_body_with_key_header() {
            let server = MockServer::start().await;
            let request = json!({
                "contents": [{ "parts": [{ "text": "reframe" }] }],
                "generationConfig": { "imageConfig": { "aspectRatio": "16:9" } }
            });
            let reply = json!({ "candidates": [] });
            Mock::given(method("POST"))
                .and(path("/v1beta/models/gemini-test:generateContent"))
                .and(header(API_KEY_HEADER, KEY))
                .and(body_json(&request))
                .respond_with(ResponseTemplate::new(200).set_body_json(&reply))
                .expect(1)
                .mount(&server)
                .await;

            let body = request.clone();
            let result = with_transport(config_for(&server), move |transport| {
                transport.generate(&body, KEY)
            })
            .await;
            assert_eq!(result, Ok(reply));

            let received = server.received_requests().await.unwrap_or_default();
            assert_eq!(received.len(), 1);
            let sent = &received[0];
            assert_eq!(sent.url.query(), None);
            assert!(!sent.url.as_str().contains(KEY));
            assert!(!String::from_utf8_lossy(&sent.body).contains(KEY));
            let sent_body: Value = serde_json::from_slice(&sent.body).unwrap();
            assert_eq!(sent_body, request);
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn error_status_keeps_raw_body() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1beta/models/gemini-test:generateContent"))
                .respond_with(ResponseTemplate::new(429).set_body_string("Resource exhausted"))
                .expect(1)
                .mount(&server)
                .await;

            let result = with_transport(config_for(&server), |transport| {
                transport.generate(&json!({}), KEY)
            })
            .await;
            assert_eq!(
                result,
                Err(TransportError::Status {
                    status: 429,
                    body: "Resource exhausted".to_string(),
                })
            );
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn success_with_non_json_body_is_invalid_json() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1beta/models/gemini-test:generateContent"))
                .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
                .mount(&server)
                .await;

            let result = with_transport(config_for(&server), |transport| {
                transport.generate(&json!({}), KEY)
            })
            .await;
            assert!(matches!(result, Err(TransportError::InvalidJson { .. })));
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn list_models_gets_models_endpoint() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v1beta/models"))
                .and(header(API_KEY_HEADER, KEY))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "models": [
                        { "name": "models/gemini-test" },
                        { "name": "models/gemini-2.5-flash-image" }
                    ]
                })))
                .expect(1)
                .mount(&server)
                .await;

            let discovery =
                with_transport(config_for(&server), |transport| discover_models(transport, KEY))
                    .await;
            assert_eq!(
                discovery,
                ModelDiscovery::Listed {
                    models: vec![
                        "models/gemini-test".to_string(),
                        "models/gemini-2.5-flash-image".to_string(),
                    ],
                }
            );

            let received = server.received_requests().await.unwrap_or_default();
            assert_eq!(received.len(), 1);
            assert_eq!(received[0].url.query(), None);
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn list_models_not_found_is_status_error() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v1beta/models"))
                .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
                .mount(&server)
                .await;

            let result =
                with_transport(config_for(&server), |transport| transport.list_models(KEY)).await;
            assert_eq!(result.unwrap_err().status(), Some(404));
        }

        #[test]
        fn unreachable_host_is_network_error() {
            let port = std::net::TcpListener::bind("127.0.0.1:0")
                .and_then(|listener| listener.local_addr())
                .unwrap()
                .port();
            let config = EngineConfig {
                api_base: format!("http://127.0.0.1:{port}/v1beta"),
                request_timeout: Duration::from_secs(5),
                ..EngineConfig::default()
            }
            .with_model("gemini-test");

            let result = GeminiTransport::new(&config).generate(&json!({}), KEY);
            match result {
                Err(TransportError::Network { message }) => {
                    assert!(message.contains("gemini-test:generateContent"));
                    assert!(!message.contains(KEY));
                }
                other => panic!("expected network error, got {other:?}"),
            }
        }
    }
}
