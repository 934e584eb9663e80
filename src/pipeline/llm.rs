//! Model client: send the prompt to the generation endpoint, return raw text.
//!
//! [`GenerationBackend`] is the seam the orchestrator talks to;
//! [`GeminiClient`] is the HTTP implementation of the `generateContent` wire
//! contract. Prompt engineering lives in [`crate::prompts`] and response
//! cleanup in [`crate::pipeline::parse`], so this module only deals with
//! transport, status codes and the candidate envelope.
//!
//! ## Retry Strategy
//!
//! [`generate_with_retry`] wraps any backend with a per-attempt timeout and
//! exponential backoff (`retry_backoff_ms * 2^(attempt-1)`). Only transient
//! failures are retried (see [`StageError::is_retryable`]); an answer with the
//! wrong shape is returned to the caller immediately.

use crate::config::{ApiKey, ConversionConfig, GenerationParams, API_KEY_ENV};
use crate::error::{Cf2LcError, StageError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Something that turns a prompt into raw generated text.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Send one request. Returns the first candidate's text, untrimmed.
    async fn generate(&self, prompt: &str) -> Result<String, StageError>;

    /// Backend name for logs.
    fn name(&self) -> &str {
        "custom"
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationParams,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Pull `candidates[0].content.parts[0].text` out of a response body.
fn first_candidate_text(body: &str) -> Result<String, StageError> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|e| StageError::UpstreamShape {
            detail: format!("body is not a generateContent response: {e}"),
        })?;

    response
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .and_then(|c| c.parts)
        .and_then(|p| p.into_iter().next())
        .and_then(|p| p.text)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| StageError::UpstreamShape {
            detail: "missing candidates[0].content.parts[0].text".into(),
        })
}

// ── Gemini HTTP client ───────────────────────────────────────────────────

/// HTTP client for the `generateContent` endpoint.
///
/// The credential travels as the `key` query parameter. It is never logged,
/// and transport errors are stripped of the request URL before they are
/// turned into messages.
pub struct GeminiClient {
    http: reqwest::Client,
    url: String,
    api_key: ApiKey,
    params: GenerationParams,
    request_timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(config: &ConversionConfig) -> Result<Self, Cf2LcError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Cf2LcError::MissingCredential {
                hint: format!("Set {API_KEY_ENV} or pass --api-key."),
            })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("cf2lc/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Cf2LcError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            url: config.generate_url(),
            api_key,
            params: config.generation,
            request_timeout_secs: config.request_timeout_secs,
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> StageError {
        if e.is_timeout() {
            StageError::UpstreamTimeout {
                secs: self.request_timeout_secs,
            }
        } else {
            StageError::Transport {
                detail: e.without_url().to_string(),
            }
        }
    }
}

#[async_trait]
impl GenerationBackend for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, StageError> {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: self.params,
        };

        let response = self
            .http
            .post(&self.url)
            .query(&[("key", self.api_key.expose())])
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            // Unreadable error body: keep the status, drop the body.
            let body = response.text().await.unwrap_or_default();
            return Err(StageError::UpstreamHttp {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        debug!("Gemini responded {} with {} bytes", status.as_u16(), body.len());
        first_candidate_text(&body)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ── Retry wrapper ────────────────────────────────────────────────────────

/// Call the backend with a per-attempt timeout and bounded retries.
pub async fn generate_with_retry(
    backend: &dyn GenerationBackend,
    prompt: &str,
    config: &ConversionConfig,
) -> Result<String, StageError> {
    let start = Instant::now();
    let attempt_timeout = Duration::from_secs(config.request_timeout_secs);
    let mut last_err: Option<StageError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config
                .retry_backoff_ms
                .saturating_mul(2u64.saturating_pow(attempt - 1));
            warn!(
                "{}: retry {}/{} after {}ms",
                backend.name(),
                attempt,
                config.max_retries,
                backoff
            );
            if let (Some(cb), Some(e)) = (&config.progress_callback, &last_err) {
                cb.on_retry(attempt, config.max_retries, &e.to_string());
            }
            sleep(Duration::from_millis(backoff)).await;
        }

        let result = match timeout(attempt_timeout, backend.generate(prompt)).await {
            Ok(r) => r,
            Err(_) => Err(StageError::UpstreamTimeout {
                secs: config.request_timeout_secs,
            }),
        };

        match result {
            Ok(text) => {
                info!(
                    "{}: {} chars generated in {:?} ({} retries)",
                    backend.name(),
                    text.len(),
                    start.elapsed(),
                    attempt
                );
                return Ok(text);
            }
            Err(e) if e.is_retryable() => {
                warn!("{}: attempt {} failed: {}", backend.name(), attempt + 1, e);
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| StageError::Transport {
        detail: "no attempt was made".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed script of results, one per call.
    struct ScriptedBackend {
        script: Mutex<VecDeque<Result<String, StageError>>>,
        calls: AtomicU32,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<String, StageError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn generate(&self, _prompt: &str) -> Result<String, StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("{}".into()))
        }
    }

    struct SlowBackend;

    #[async_trait]
    impl GenerationBackend for SlowBackend {
        async fn generate(&self, _prompt: &str) -> Result<String, StageError> {
            sleep(Duration::from_secs(30)).await;
            Ok(String::new())
        }
    }

    fn fast_retry_config(max_retries: u32) -> ConversionConfig {
        ConversionConfig::builder()
            .max_retries(max_retries)
            .retry_backoff_ms(1)
            .request_timeout_secs(1)
            .build()
            .unwrap()
    }

    #[test]
    fn request_body_matches_wire_shape() {
        let req = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: "hello" }],
            }],
            generation_config: GenerationParams::default(),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(v["generationConfig"]["topK"], 40);
        assert_eq!(v["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn first_candidate_text_is_untrimmed() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"  {\"a\":1}\n"}]}}]}"#;
        assert_eq!(first_candidate_text(body).unwrap(), "  {\"a\":1}\n");
    }

    #[test]
    fn empty_candidates_is_shape_error() {
        for body in [
            r#"{"candidates":[]}"#,
            r#"{}"#,
            r#"{"candidates":null}"#,
            r#"{"candidates":[{"content":{"parts":[]}}]}"#,
            r#"{"candidates":[{"finishReason":"SAFETY"}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"text":""}]}}]}"#,
            "not json at all",
        ] {
            let err = first_candidate_text(body).unwrap_err();
            assert!(
                matches!(err, StageError::UpstreamShape { .. }),
                "{body}: got {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn retries_transient_errors_then_succeeds() {
        let backend = ScriptedBackend::new(vec![
            Err(StageError::UpstreamHttp {
                status: 503,
                body: "overloaded".into(),
            }),
            Err(StageError::Transport {
                detail: "connection reset".into(),
            }),
            Ok("done".into()),
        ]);
        let out = generate_with_retry(&backend, "p", &fast_retry_config(2))
            .await
            .unwrap();
        assert_eq!(out, "done");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_shape_errors() {
        let backend = ScriptedBackend::new(vec![Err(StageError::UpstreamShape {
            detail: "no candidates".into(),
        })]);
        let err = generate_with_retry(&backend, "p", &fast_retry_config(3))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::UpstreamShape { .. }));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() {
        let backend = ScriptedBackend::new(vec![Err(StageError::UpstreamHttp {
            status: 400,
            body: "bad request".into(),
        })]);
        let err = generate_with_retry(&backend, "p", &fast_retry_config(3))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn returns_last_error_when_retries_exhausted() {
        let backend = ScriptedBackend::new(vec![
            Err(StageError::UpstreamHttp { status: 500, body: "a".into() }),
            Err(StageError::UpstreamHttp { status: 502, body: "b".into() }),
        ]);
        let err = generate_with_retry(&backend, "p", &fast_retry_config(1))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(502));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let err = generate_with_retry(&SlowBackend, "p", &fast_retry_config(0))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::UpstreamTimeout { secs: 1 }));
    }

    #[test]
    fn client_requires_credential() {
        let config = ConversionConfig::default();
        let err = GeminiClient::new(&config).err().unwrap();
        assert!(matches!(err, Cf2LcError::MissingCredential { .. }));
    }
}
