///
/// This module implements the CLI interface for decoder: command parsing, the
/// confirmation prompt, and the glue that runs aggregation and report
/// generation in order.
///
/// All core business logic (filtering, aggregation, rate limiting, section
/// scheduling) lives in the [`decoder-core`] crate.
///
/// ## Commands
/// - `analyze <DIR>`: aggregate, preview the tree, confirm, persist the corpus,
///   generate the report, print and persist it.
/// - `tree <DIR>`: aggregate and print the tree listing only. No API key needed.
///
/// For programmatic/integration use: call [`run`] with a constructed [`Cli`],
/// or the smaller steps [`collect_corpus`] and [`generate_report`].
///
/// [`decoder-core`]: ../../decoder_core/
use crate::archive::{self, Archive};
use crate::client::AnthropicClient;
use crate::load_config::load_config;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use decoder_core::aggregate::{Aggregation, CorpusAggregator};
use decoder_core::config::DecoderConfig;
use decoder_core::contract::{FixedBackoff, Generator};
use decoder_core::filter::{IgnoreList, PathFilter};
use decoder_core::generate::SectionGenerator;
use decoder_core::limiter::TokenBudgetLimiter;
use decoder_core::report::{DispatchMode, Report, ReportScheduler};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// CLI for decoder: turn a source tree into a detailed project report.
#[derive(Parser)]
#[clap(
    name = "decoder",
    version,
    about = "Aggregate a project's source files and generate a detailed multi-section description with an LLM"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a project directory and write a detailed report
    Analyze {
        /// Project directory to analyze
        directory: PathBuf,
        /// Path to an optional YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
        /// Skip the confirmation prompt after the file listing
        #[clap(long, short = 'y')]
        yes: bool,
        /// Generate sections one at a time instead of concurrently
        #[clap(long)]
        sequential: bool,
        /// Directory for the corpus and report files (overrides config)
        #[clap(long)]
        output_dir: Option<PathBuf>,
    },
    /// Print the files that would be sent for analysis
    Tree {
        /// Project directory to list
        directory: PathBuf,
        /// Path to an optional YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Tree { directory, config } => {
            let config = load_config(config.as_deref())?;
            let aggregation = collect_corpus(&directory, &config).await?;
            print!("{}", aggregation.tree);
            println!("{} files would be analyzed.", aggregation.files);
            Ok(())
        }
        Commands::Analyze {
            directory,
            config,
            yes,
            sequential,
            output_dir,
        } => {
            let mut config = load_config(config.as_deref())?;
            if sequential {
                config.report.dispatch = DispatchMode::Sequential;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            // Fail before the expensive walk if we could never call the API.
            let client = AnthropicClient::new_from_env()?;

            println!("Analyzing project structure...");
            let aggregation = collect_corpus(&directory, &config).await?;
            println!("Files to be analyzed:");
            print!("{}", aggregation.tree);

            if !yes {
                let stdin = io::stdin();
                let proceed = confirm(&mut stdin.lock(), &mut io::stdout())
                    .context("Failed to read confirmation")?;
                if !proceed {
                    tracing::info!(command = "analyze", "Aborted by user before generation");
                    println!("Aborted.");
                    return Ok(());
                }
            }

            let archive = Archive::ensure(&config.output_dir)?;
            let folder = archive::folder_name(&directory);
            let stamp = archive::timestamp(chrono::Utc::now());
            let corpus_path = archive.write_corpus(&folder, &stamp, &aggregation.corpus)?;
            println!("Project content saved to {}", corpus_path.display());

            println!("Generating detailed project description...");
            let report = match generate_report(client, &config, &aggregation.corpus).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(command = "analyze", error = %e, "Report generation failed");
                    return Err(e);
                }
            };
            let rendered = report.render();

            println!("Detailed Project Description:");
            println!("{rendered}");
            let report_path = archive.write_report(&folder, &stamp, &rendered)?;
            println!("Detailed description saved to {}", report_path.display());
            tracing::info!(command = "analyze", sections = report.sections.len(), "Analysis complete");
            Ok(())
        }
    }
}

/// Loads the tree's ignore file and aggregates it on a blocking thread.
pub async fn collect_corpus(directory: &Path, config: &DecoderConfig) -> Result<Aggregation> {
    let mut filter_config = config.filter.clone();
    filter_config.ignore = IgnoreList::load(directory)
        .with_context(|| format!("Failed to read ignore file in {}", directory.display()))?;

    let root = directory.to_path_buf();
    let aggregation = tokio::task::spawn_blocking(move || {
        CorpusAggregator::new(PathFilter::new(filter_config)).aggregate(&root)
    })
    .await
    .context("Aggregation task panicked")?
    .with_context(|| format!("Failed to aggregate {}", directory.display()))?;

    Ok(aggregation)
}

/// Builds a limiter, section generator and scheduler from `config` and runs
/// every section against `client`.
pub async fn generate_report<G: Generator>(
    client: G,
    config: &DecoderConfig,
    corpus: &str,
) -> Result<Report> {
    let limiter = Arc::new(TokenBudgetLimiter::from_config(&config.limiter));
    let generator = SectionGenerator::new(
        client,
        limiter,
        Box::new(FixedBackoff(config.limiter.throttle_backoff())),
        config.generation.sampling(),
    )
    .with_system_role(config.generation.system_role.clone());

    let scheduler = ReportScheduler::new(
        config.report.sections.clone(),
        generator,
        config.report.dispatch,
    );
    let report = scheduler.run(corpus).await?;
    Ok(report)
}

/// Asks whether to continue; only `y`/`yes` (any case) proceeds.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<bool> {
    write!(output, "Proceed with report generation? [y/N] ")?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
