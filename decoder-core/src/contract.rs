//! # contract: Interface to the generative-text API
//!
//! This module defines the single trait ([`Generator`]) the report pipeline
//! depends on, together with its request/response/error types and the
//! injectable [`BackoffStrategy`] used when the API throttles us.
//!
//! ## Interface & Extensibility
//! - Implement [`Generator`] to plug in a concrete transport (the CLI crate
//!   ships an Anthropic HTTP client).
//! - The core never sees HTTP: it only sees a text response, a non-text
//!   response, a throttling error, or some other error.
//! - Usage accounting (`output_tokens`) travels with every successful response
//!   and feeds the token budget limiter.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`, so consumers (including the CLI
//!   crate's tests, via the default `test-export-mocks` feature) get a
//!   `MockGenerator`.
//! - [`FixedBackoff::none`] gives a zero-delay strategy for tests.

use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;

/// Sampling parameters sent with every generation request.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SamplingConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl SamplingConfig {
    /// Lowest-variability sampling: output is reproducible for a given prompt.
    pub fn deterministic(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            temperature: 0.0,
        }
    }
}

/// One request to the generation API.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Fixed system role description.
    pub system: String,
    /// User prompt, including the full corpus.
    pub prompt: String,
    pub sampling: SamplingConfig,
}

/// What came back in the first content block of a response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseContent {
    Text(String),
    /// Any non-textual block (tool use, images, ...). Carries the block type.
    NonText(String),
}

/// Usage metadata attached to successful responses.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Usage {
    pub output_tokens: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResponse {
    pub content: ResponseContent,
    pub usage: Usage,
}

impl GenerationResponse {
    /// Convenience constructor for a plain text response.
    pub fn text(text: impl Into<String>, output_tokens: u64) -> Self {
        Self {
            content: ResponseContent::Text(text.into()),
            usage: Usage { output_tokens },
        }
    }
}

/// Errors surfaced by a [`Generator`] and by the section generator.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The API reports we exceeded its request/token rate. Recoverable.
    #[error("rate limited by generation API: {0}")]
    Throttled(String),
    /// Any other API-level failure (bad request, auth, server error).
    #[error("generation API error (status {status:?}): {message}")]
    Api {
        status: Option<u16>,
        message: String,
    },
    /// The request never produced an API response.
    #[error("generation request failed: {0}")]
    Transport(String),
    /// The API answered, but not with text.
    #[error("unexpected response format: expected text, got {0}")]
    UnexpectedContent(String),
}

impl GenerationError {
    pub fn is_throttled(&self) -> bool {
        matches!(self, GenerationError::Throttled(_))
    }
}

/// Trait for the generative-text API.
/// Implemented by real clients and by test mocks.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    /// Issue one generation request.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError>;
}

/// How long to back off after the API throttled a request.
pub trait BackoffStrategy: Send + Sync {
    fn throttle_backoff(&self) -> Duration;
}

/// Same delay after every throttling response. No jitter, no growth.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff(pub Duration);

impl FixedBackoff {
    pub fn none() -> Self {
        FixedBackoff(Duration::ZERO)
    }
}

impl BackoffStrategy for FixedBackoff {
    fn throttle_backoff(&self) -> Duration {
        self.0
    }
}
