use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::contract::SamplingConfig;
use crate::filter::FilterConfig;
use crate::generate::{Section, DEFAULT_SYSTEM_ROLE};
use crate::limiter::LimiterConfig;
use crate::report::{default_sections, DispatchMode};

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20240620";
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Everything a report run needs, apart from the root directory and secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub output_dir: PathBuf,
    pub filter: FilterConfig,
    pub generation: GenerationSettings,
    pub limiter: LimiterConfig,
    pub report: ReportSettings,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("archive"),
            filter: FilterConfig::default(),
            generation: GenerationSettings::default(),
            limiter: LimiterConfig::default(),
            report: ReportSettings::default(),
        }
    }
}

impl DecoderConfig {
    pub fn trace_loaded(&self) {
        info!(
            output_dir = %self.output_dir.display(),
            model = %self.generation.model,
            max_tokens = self.generation.max_tokens,
            sections = self.report.sections.len(),
            dispatch = ?self.report.dispatch,
            tokens_per_window = self.limiter.tokens_per_window,
            "Loaded DecoderConfig"
        );
        debug!(?self, "Config loaded (full debug)");
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub model: String,
    pub max_tokens: u32,
    pub system_role: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system_role: DEFAULT_SYSTEM_ROLE.to_string(),
        }
    }
}

impl GenerationSettings {
    pub fn sampling(&self) -> SamplingConfig {
        SamplingConfig::deterministic(self.model.clone(), self.max_tokens)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub dispatch: DispatchMode,
    pub sections: Vec<Section>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            dispatch: DispatchMode::Concurrent,
            sections: default_sections(),
        }
    }
}
