//! One report section, one generation request.
//!
//! [`SectionGenerator::generate`] never surfaces throttling: it backs off
//! through the shared [`TokenBudgetLimiter`] and retries the same section
//! until it gets text or a non-recoverable error.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::contract::{
    BackoffStrategy, GenerationError, GenerationRequest, Generator, ResponseContent,
    SamplingConfig,
};
use crate::limiter::TokenBudgetLimiter;

pub const DEFAULT_SYSTEM_ROLE: &str = "You are a senior software architect with extensive experience in code analysis, documentation, and technical communication. Your task is to provide an in-depth, detailed analysis of software projects, explaining them thoroughly for other senior developers and architects.";

/// A named report section and the instruction used to generate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub instruction: String,
}

impl Section {
    pub fn new(title: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            instruction: instruction.into(),
        }
    }
}

/// Generated text for one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionResult {
    pub title: String,
    pub text: String,
}

/// Builds the user prompt: instruction first, then the whole corpus verbatim.
pub fn build_prompt(instruction: &str, corpus: &str) -> String {
    format!(
        "Analyze the following project content and {instruction}\n\n\
         Here is the project structure and files:\n\
         <code>\n{corpus}\n</code>\n\n\
         Provide a detailed and comprehensive response for this section. Do not summarize or omit details."
    )
}

pub struct SectionGenerator<G> {
    client: G,
    limiter: Arc<TokenBudgetLimiter>,
    backoff: Box<dyn BackoffStrategy>,
    sampling: SamplingConfig,
    system_role: String,
}

impl<G: Generator> SectionGenerator<G> {
    pub fn new(
        client: G,
        limiter: Arc<TokenBudgetLimiter>,
        backoff: Box<dyn BackoffStrategy>,
        sampling: SamplingConfig,
    ) -> Self {
        Self {
            client,
            limiter,
            backoff,
            sampling,
            system_role: DEFAULT_SYSTEM_ROLE.to_string(),
        }
    }

    pub fn with_system_role(mut self, system_role: impl Into<String>) -> Self {
        self.system_role = system_role.into();
        self
    }

    pub fn limiter(&self) -> &Arc<TokenBudgetLimiter> {
        &self.limiter
    }

    pub async fn generate(
        &self,
        section: &Section,
        corpus: &str,
    ) -> Result<SectionResult, GenerationError> {
        let prompt = build_prompt(&section.instruction, corpus);
        let mut attempt: u64 = 0;

        loop {
            self.limiter.consult_and_wait_if_needed().await;
            attempt += 1;
            debug!(section = %section.title, attempt, "Issuing generation request");

            let request = GenerationRequest {
                system: self.system_role.clone(),
                prompt: prompt.clone(),
                sampling: self.sampling.clone(),
            };

            match self.client.generate(request).await {
                Ok(response) => match response.content {
                    ResponseContent::Text(text) => {
                        self.limiter.record_usage(response.usage.output_tokens).await;
                        // Completion order; the scheduler reports progress in section order.
                        debug!(
                            section = %section.title,
                            attempt,
                            output_tokens = response.usage.output_tokens,
                            "Section generated"
                        );
                        return Ok(SectionResult {
                            title: section.title.clone(),
                            text,
                        });
                    }
                    ResponseContent::NonText(kind) => {
                        error!(section = %section.title, kind = %kind, "Unexpected response format");
                        return Err(GenerationError::UnexpectedContent(kind));
                    }
                },
                Err(e) if e.is_throttled() => {
                    let backoff = self.backoff.throttle_backoff();
                    warn!(
                        section = %section.title,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Rate limited, backing off before retrying section"
                    );
                    self.limiter.force_exhaust_and_backoff(backoff).await;
                }
                Err(e) => {
                    error!(section = %section.title, attempt, error = %e, "Section generation failed");
                    return Err(e);
                }
            }
        }
    }
}
