#![doc = "Generation API integration for the CLI: bridges the core `Generator` trait to the Anthropic Messages API."]
//
//! # Anthropic client (CLI <-> Core)
//!
//! This module wires the [`Generator`] trait from [`decoder_core::contract`]
//! to a real HTTP endpoint. The core only ever sees text, non-text, throttled
//! or failed; everything HTTP-shaped stays here.
//!
//! ## Client Usage
//!
//! - Construct [`AnthropicClient`] from the environment (`ANTHROPIC_API_KEY`,
//!   optional `ANTHROPIC_BASE_URL`).
//! - HTTP 429 and `rate_limit_error` bodies map to
//!   [`GenerationError::Throttled`]; every other failure is non-recoverable.

use std::env;

use anyhow::{Context, Result};
use async_trait::async_trait;
use decoder_core::contract::{
    GenerationError, GenerationRequest, GenerationResponse, Generator, ResponseContent, Usage,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn new_from_env() -> Result<Self> {
        let api_key = env::var("ANTHROPIC_API_KEY").map_err(|e| {
            tracing::error!(error = ?e, "ANTHROPIC_API_KEY missing in environment");
            e
        })
        .context("ANTHROPIC_API_KEY environment variable not set")?;
        let base_url = env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        tracing::info!(
            api_key_set = !api_key.is_empty(),
            base_url = %base_url,
            "Initialized AnthropicClient from environment"
        );
        Ok(Self::new(api_key, base_url))
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<TextBlock<'a>>,
}

#[derive(Debug, Serialize)]
struct TextBlock<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    usage: ResponseUsage,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseUsage {
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

fn request_body(req: &GenerationRequest) -> MessagesRequest<'_> {
    MessagesRequest {
        model: &req.sampling.model,
        max_tokens: req.sampling.max_tokens,
        temperature: req.sampling.temperature,
        system: &req.system,
        messages: vec![Message {
            role: "user",
            content: vec![TextBlock {
                kind: "text",
                text: &req.prompt,
            }],
        }],
    }
}

/// Map a non-success HTTP answer to the core error taxonomy.
fn classify_error(status: u16, body: &str) -> GenerationError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let message = detail
        .as_ref()
        .map(|d| d.message.clone())
        .unwrap_or_else(|| body.to_string());
    let rate_limited = detail.as_ref().is_some_and(|d| d.kind == "rate_limit_error");

    if status == 429 || rate_limited {
        GenerationError::Throttled(message)
    } else {
        GenerationError::Api {
            status: Some(status),
            message,
        }
    }
}

/// Only the first content block counts; it has to be text.
fn parse_response(body: &str) -> Result<GenerationResponse, GenerationError> {
    let parsed: MessagesResponse = serde_json::from_str(body).map_err(|e| GenerationError::Api {
        status: None,
        message: format!("invalid response body: {e}"),
    })?;
    let usage = Usage {
        output_tokens: parsed.usage.output_tokens,
    };
    let content = match parsed.content.into_iter().next() {
        Some(ResponseBlock {
            kind,
            text: Some(text),
        }) if kind == "text" => ResponseContent::Text(text),
        Some(block) => ResponseContent::NonText(block.kind),
        None => ResponseContent::NonText("empty".to_string()),
    };
    Ok(GenerationResponse { content, usage })
}

#[async_trait]
impl Generator for AnthropicClient {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        tracing::info!(
            model = %request.sampling.model,
            prompt_bytes = request.prompt.len(),
            "Sending generation request"
        );

        let response = self
            .http
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body(&request))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, "Generation request failed to send");
                GenerationError::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            tracing::error!(error = ?e, status = status.as_u16(), "Failed to read response body");
            GenerationError::Transport(e.to_string())
        })?;

        if !status.is_success() {
            let err = classify_error(status.as_u16(), &body);
            if err.is_throttled() {
                tracing::warn!(status = status.as_u16(), "Generation API rate limited the request");
            } else {
                tracing::error!(status = status.as_u16(), error = %err, "Generation API returned an error");
            }
            return Err(err);
        }

        let parsed = parse_response(&body)?;
        tracing::info!(
            output_tokens = parsed.usage.output_tokens,
            "Received generation response"
        );
        Ok(parsed)
    }
}
