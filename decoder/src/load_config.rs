/// `load_config` module: Loads the optional YAML config file and applies environment overrides, producing a `DecoderConfig`.
///
/// This module is the only place where user-supplied YAML is parsed and mapped to the core's strongly-typed config.
///
/// # Responsibilities
/// - Parse the YAML file, if one is given; every key is optional and falls back to the core defaults
/// - Apply environment overrides (`AI_MODEL`, `MAX_TOKENS`); environment wins over the file
/// - Surface clear diagnostics: any failure in loading must name the file or variable at fault
///
/// Secrets (`ANTHROPIC_API_KEY`) are never read from the file; see [`crate::client`].
///
/// # Errors
/// All errors in this module use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use decoder_core::config::DecoderConfig;
use std::env;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub fn load_config(path: Option<&Path>) -> Result<DecoderConfig> {
    let mut config = match path {
        Some(path_ref) => read_config_file(path_ref)?,
        None => {
            info!("No config file given, using defaults");
            DecoderConfig::default()
        }
    };

    if let Ok(model) = env::var("AI_MODEL") {
        info!(model = %model, "AI_MODEL found in env");
        config.generation.model = model;
    }

    if let Ok(raw) = env::var("MAX_TOKENS") {
        config.generation.max_tokens = match raw.parse::<u32>() {
            Ok(value) => value,
            Err(e) => {
                error!(error = ?e, var = ?raw, "MAX_TOKENS must be a valid integer");
                return Err(anyhow::anyhow!("MAX_TOKENS must be a valid integer: {e}"));
            }
        };
    }

    config.trace_loaded();
    Ok(config)
}

fn read_config_file(path_ref: &Path) -> Result<DecoderConfig> {
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty file is a valid "all defaults" config.
    if config_content.trim().is_empty() {
        return Ok(DecoderConfig::default());
    }

    match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}
