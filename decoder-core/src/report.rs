//! Multi-section report scheduling and assembly.
//!
//! This module drives a [`SectionGenerator`] for every configured [`Section`]
//! and reassembles the results into one [`Report`].
//!
//! # Ordering
//! The section list is the report schema: its order is the order of the
//! final report, no matter in which order sections were dispatched, retried
//! or completed. Section-level progress lines follow the same order.
//!
//! # Dispatch
//! - [`DispatchMode::Concurrent`]: every section is in flight at once on the
//!   current task; the shared limiter paces the actual API traffic.
//!   Completions are collected as they arrive, keyed by section index, and
//!   assembled afterwards by walking the section list.
//! - [`DispatchMode::Sequential`]: one section at a time, in list order.
//!
//! # Error Handling
//! All-or-nothing: the first non-recoverable section failure fails the run
//! and drops every other in-flight or completed section.

use std::collections::BTreeMap;
use std::fmt;

use futures::stream::{FuturesUnordered, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::contract::{GenerationError, Generator};
use crate::generate::{Section, SectionGenerator, SectionResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    #[default]
    Concurrent,
    Sequential,
}

/// The finished report, one result per section in section-list order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub sections: Vec<SectionResult>,
}

impl Report {
    /// `<title>\n\n<text>\n\n` per section.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            write!(f, "{}\n\n{}\n\n", section.title, section.text)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("no report sections configured")]
    NoSections,
    #[error("section '{title}' failed: {source}")]
    Section {
        title: String,
        #[source]
        source: GenerationError,
    },
}

pub struct ReportScheduler<G> {
    sections: Vec<Section>,
    generator: SectionGenerator<G>,
    mode: DispatchMode,
}

impl<G: Generator> ReportScheduler<G> {
    pub fn new(sections: Vec<Section>, generator: SectionGenerator<G>, mode: DispatchMode) -> Self {
        Self {
            sections,
            generator,
            mode,
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Generates every section and assembles them in list order.
    ///
    /// An empty section list is rejected with [`ReportError::NoSections`]
    /// rather than producing an empty report.
    pub async fn run(&self, corpus: &str) -> Result<Report, ReportError> {
        if self.sections.is_empty() {
            error!("Report requested without any sections");
            return Err(ReportError::NoSections);
        }
        info!(
            sections = self.sections.len(),
            mode = ?self.mode,
            corpus_bytes = corpus.len(),
            "Starting report generation"
        );

        let results = match self.mode {
            DispatchMode::Concurrent => self.run_concurrent(corpus).await?,
            DispatchMode::Sequential => self.run_sequential(corpus).await?,
        };

        info!(sections = results.len(), "Report assembled");
        Ok(Report { sections: results })
    }

    async fn run_sequential(&self, corpus: &str) -> Result<Vec<SectionResult>, ReportError> {
        let mut results = Vec::with_capacity(self.sections.len());
        for section in &self.sections {
            info!(section = %section.title, "Generating section: {}", section.title);
            let result = self
                .generator
                .generate(section, corpus)
                .await
                .map_err(|source| section_failed(section, source))?;
            info!(section = %section.title, "Section complete");
            results.push(result);
        }
        Ok(results)
    }

    async fn run_concurrent(&self, corpus: &str) -> Result<Vec<SectionResult>, ReportError> {
        let in_flight: FuturesUnordered<_> = self
            .sections
            .iter()
            .enumerate()
            .map(|(index, section)| {
                info!(section = %section.title, "Generating section: {}", section.title);
                async move {
                    self.generator
                        .generate(section, corpus)
                        .await
                        .map(|result| (index, result))
                        .map_err(|source| section_failed(section, source))
                }
            })
            .collect();

        let completed: BTreeMap<usize, SectionResult> = in_flight
            .inspect_ok(|(index, result)| {
                debug!(index, section = %result.title, "Section settled");
            })
            .try_collect()
            .await?;

        // Keys are section indices: iterating them walks the configured
        // order, never the completion order.
        let results = completed
            .into_values()
            .inspect(|result| info!(section = %result.title, "Section complete"))
            .collect();
        Ok(results)
    }
}

fn section_failed(section: &Section, source: GenerationError) -> ReportError {
    error!(section = %section.title, error = %source, "Section failed, aborting report");
    ReportError::Section {
        title: section.title.clone(),
        source,
    }
}

/// The default report schema.
pub fn default_sections() -> Vec<Section> {
    vec![
        Section::new(
            "1. Overall Purpose and Functionality",
            "Provide a detailed explanation of what the application does, its main features, and its inputs and outputs. Discuss the problem it solves and its target users.",
        ),
        Section::new(
            "2. Application Architecture",
            "Describe in detail the application's architecture, including languages used, databases, APIs, and other components. Explain how these components interact and any notable design patterns or architectural decisions.",
        ),
        Section::new(
            "3. Folder and File Structure",
            "Create a comprehensive folder and file structure tree. For each file, provide a detailed description of its purpose and contents, including any key classes, functions, or data structures it contains.",
        ),
        Section::new(
            "4. Detailed File Analysis",
            "For each file in the project, provide an in-depth analysis including:\n\
             - The file's overall purpose and how it fits into the larger application\n\
             - A detailed description of each function, class, and significant code block\n\
             - Explanations of algorithms, data structures, and design patterns used\n\
             - Any notable optimizations or performance considerations",
        ),
        Section::new(
            "5. Function and Object Deep Dive",
            "For each function and object in every file, provide an extensive breakdown including:\n\
             - Name and signature\n\
             - Detailed description of inputs, outputs, and side effects\n\
             - Comprehensive explanation of the function/object's purpose and how it contributes to the overall application\n\
             - Step-by-step explanation of how the function/object works\n\
             - Any edge cases, error handling, or special considerations\n\
             - Potential optimizations or alternative implementations",
        ),
        Section::new(
            "6. Usage Instructions",
            "Provide detailed instructions on how to set up, configure, and use the application. Include any necessary environment setup, dependencies, build processes, and runtime instructions.",
        ),
        Section::new(
            "7. Weaknesses, Risks, and Improvements",
            "Conduct a thorough analysis of potential weaknesses, security risks, and areas for improvement in the application. Suggest specific enhancements, optimizations, or architectural changes that could benefit the project.",
        ),
    ]
}
