use decoder::load_config::load_config;
use decoder_core::config::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use decoder_core::report::DispatchMode;
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn clear_env() {
    env::remove_var("AI_MODEL");
    env::remove_var("MAX_TOKENS");
}

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

#[test]
#[serial]
fn no_config_file_gives_defaults() {
    clear_env();
    let config = load_config(None).expect("Defaults should load");

    assert_eq!(config.output_dir, PathBuf::from("archive"));
    assert_eq!(config.generation.model, DEFAULT_MODEL);
    assert_eq!(config.generation.max_tokens, DEFAULT_MAX_TOKENS);
    assert_eq!(config.report.sections.len(), 7);
    assert_eq!(config.report.dispatch, DispatchMode::Concurrent);
    assert_eq!(config.limiter.tokens_per_window, 80_000);
    assert!(config.filter.exclude_dirs.contains("node_modules"));
}

#[test]
#[serial]
fn yaml_overrides_only_what_it_names() {
    clear_env();
    let file = config_file(
        r#"
output_dir: ./tmp/reports
generation:
  model: claude-test
limiter:
  tokens_per_window: 1000
  window_secs: 10
report:
  dispatch: sequential
  sections:
    - title: Overview
      instruction: describe the project.
    - title: Details
      instruction: go deeper.
filter:
  include_extensions: [".rs"]
"#,
    );

    let config = load_config(Some(file.path())).expect("Config should load");

    assert_eq!(config.output_dir, PathBuf::from("./tmp/reports"));
    assert_eq!(config.generation.model, "claude-test");
    assert_eq!(config.generation.max_tokens, DEFAULT_MAX_TOKENS);
    assert_eq!(config.limiter.tokens_per_window, 1000);
    assert_eq!(config.limiter.window_secs, 10);
    assert_eq!(config.limiter.throttle_backoff_secs, 60);
    assert_eq!(config.report.dispatch, DispatchMode::Sequential);
    let titles: Vec<_> = config.report.sections.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, ["Overview", "Details"]);
    assert_eq!(config.filter.include_extensions.len(), 1);
    // Untouched lists keep their defaults.
    assert!(config.filter.exclude_files.contains("package-lock.json"));
}

#[test]
#[serial]
fn empty_file_means_defaults() {
    clear_env();
    let file = config_file("\n");
    let config = load_config(Some(file.path())).expect("Empty config should load");
    assert_eq!(config.generation.model, DEFAULT_MODEL);
}

#[test]
#[serial]
fn env_wins_over_file() {
    let file = config_file("generation:\n  model: from-file\n  max_tokens: 100\n");
    env::set_var("AI_MODEL", "from-env");
    env::set_var("MAX_TOKENS", "2048");

    let config = load_config(Some(file.path())).expect("Config should load");
    clear_env();

    assert_eq!(config.generation.model, "from-env");
    assert_eq!(config.generation.max_tokens, 2048);
}

#[test]
#[serial]
fn bad_max_tokens_is_rejected() {
    clear_env();
    env::set_var("MAX_TOKENS", "lots");
    let result = load_config(None);
    clear_env();

    let err = result.expect_err("MAX_TOKENS must be numeric");
    assert!(err.to_string().contains("MAX_TOKENS must be a valid integer"));
}

#[test]
#[serial]
fn invalid_yaml_is_rejected() {
    clear_env();
    let file = config_file("report: [unclosed\n");
    let err = load_config(Some(file.path())).expect_err("Invalid YAML must fail");
    assert!(err.to_string().contains("Failed to parse config YAML"));
}

#[test]
#[serial]
fn missing_file_is_rejected() {
    clear_env();
    let err = load_config(Some(std::path::Path::new("/nonexistent/decoder.yaml")))
        .expect_err("Missing file must fail");
    assert!(err.to_string().contains("Failed to read config file"));
}
