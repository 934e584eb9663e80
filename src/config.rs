//! Configuration types for problem conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`] or resolved from the environment with
//! [`ConversionConfig::from_env`]. The API key is injected here at startup and
//! never appears in source or in log output.

use crate::error::Cf2LcError;
use crate::pipeline::llm::GenerationBackend;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default base URL of the generation API.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Placeholder a custom prompt template must contain.
pub const PROBLEM_PLACEHOLDER: &str = "{problem}";

/// An API credential. `Debug` and `Display` never print the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw secret, for attaching to the request only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Sampling parameters sent as `generationConfig` on every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 2048,
        }
    }
}

/// Configuration for a problem conversion.
///
/// # Example
/// ```rust
/// use cf2lc::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .api_key("test-key")
///     .model("gemini-1.5-flash")
///     .max_retries(1)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Credential attached to each request as the `key` query parameter.
    pub api_key: Option<ApiKey>,

    /// Base URL of the generation API. Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,

    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Sampling parameters. Default: temperature 0.7, top-k 40, top-p 0.95, 2048 tokens.
    pub generation: GenerationParams,

    /// Per-attempt HTTP timeout in seconds. Default: 60.
    pub request_timeout_secs: u64,

    /// Retry attempts after a transient failure. Default: 2.
    ///
    /// Only transport errors, timeouts, 429 and 5xx are retried; see
    /// [`crate::error::StageError::is_retryable`].
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Deadline for the whole extract → parse run, in seconds. Default: none.
    pub deadline_secs: Option<u64>,

    /// Timeout for fetching a remote problem page, in seconds. Default: 30.
    pub page_timeout_secs: u64,

    /// Custom prompt template containing [`PROBLEM_PLACEHOLDER`]. If None, uses the built-in one.
    pub prompt_template: Option<String>,

    /// Pre-constructed generation backend. Takes precedence over `api_key`.
    pub backend: Option<Arc<dyn GenerationBackend>>,

    /// Optional stage-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            generation: GenerationParams::default(),
            request_timeout_secs: 60,
            max_retries: 2,
            retry_backoff_ms: 500,
            deadline_secs: None,
            page_timeout_secs: 30,
            prompt_template: None,
            backend: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("api_key", &self.api_key)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("generation", &self.generation)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("deadline_secs", &self.deadline_secs)
            .field("page_timeout_secs", &self.page_timeout_secs)
            .field("prompt_template", &self.prompt_template.as_ref().map(|t| t.len()))
            .field("backend", &self.backend.as_ref().map(|_| "<dyn GenerationBackend>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Resolve a configuration from the process environment.
    ///
    /// Reads `GEMINI_API_KEY`, `CF2LC_MODEL` and `CF2LC_ENDPOINT`; empty
    /// values are ignored. A missing key is not an error here: it surfaces as
    /// [`Cf2LcError::MissingCredential`] when a model call is attempted.
    pub fn from_env() -> Result<Self, Cf2LcError> {
        let mut builder = Self::builder();
        if let Some(key) = non_empty_env(API_KEY_ENV) {
            builder = builder.api_key(key);
        }
        if let Some(model) = non_empty_env("CF2LC_MODEL") {
            builder = builder.model(model);
        }
        if let Some(endpoint) = non_empty_env("CF2LC_ENDPOINT") {
            builder = builder.endpoint(endpoint);
        }
        builder.build()
    }

    /// Full `generateContent` URL, without the credential.
    pub fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(ApiKey::new(key));
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn generation(mut self, params: GenerationParams) -> Self {
        self.config.generation = params;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.generation.temperature = t;
        self
    }

    pub fn top_k(mut self, k: u32) -> Self {
        self.config.generation.top_k = k;
        self
    }

    pub fn top_p(mut self, p: f32) -> Self {
        self.config.generation.top_p = p;
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.generation.max_output_tokens = n;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn deadline_secs(mut self, secs: u64) -> Self {
        self.config.deadline_secs = Some(secs);
        self
    }

    pub fn page_timeout_secs(mut self, secs: u64) -> Self {
        self.config.page_timeout_secs = secs;
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = Some(template.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Cf2LcError> {
        let c = &self.config;
        let g = &c.generation;

        if !(0.0..=2.0).contains(&g.temperature) {
            return Err(Cf2LcError::InvalidConfig(format!(
                "temperature must be 0.0–2.0, got {}",
                g.temperature
            )));
        }
        if !(g.top_p > 0.0 && g.top_p <= 1.0) {
            return Err(Cf2LcError::InvalidConfig(format!(
                "top_p must be in (0, 1], got {}",
                g.top_p
            )));
        }
        if g.top_k == 0 {
            return Err(Cf2LcError::InvalidConfig("top_k must be ≥ 1".into()));
        }
        if g.max_output_tokens == 0 {
            return Err(Cf2LcError::InvalidConfig(
                "max_output_tokens must be ≥ 1".into(),
            ));
        }
        if !(c.endpoint.starts_with("http://") || c.endpoint.starts_with("https://")) {
            return Err(Cf2LcError::InvalidConfig(format!(
                "endpoint must be an http(s) URL, got '{}'",
                c.endpoint
            )));
        }
        if c.model.trim().is_empty() {
            return Err(Cf2LcError::InvalidConfig("model must not be empty".into()));
        }
        if c.request_timeout_secs == 0 {
            return Err(Cf2LcError::InvalidConfig(
                "request timeout must be ≥ 1s".into(),
            ));
        }
        if let Some(ref t) = c.prompt_template {
            if !t.contains(PROBLEM_PLACEHOLDER) {
                return Err(Cf2LcError::InvalidConfig(format!(
                    "prompt template must contain the {} placeholder",
                    PROBLEM_PLACEHOLDER
                )));
            }
        }
        Ok(self.config)
    }
}
