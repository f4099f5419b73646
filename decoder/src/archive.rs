//! Output persistence: the raw corpus and the final report, side by side in
//! one output directory with timestamped names.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;

pub struct Archive {
    dir: PathBuf,
}

impl Archive {
    /// Creates the output directory if it does not exist yet.
    pub fn ensure(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_corpus(&self, folder: &str, stamp: &str, corpus: &str) -> Result<PathBuf> {
        self.write(format!("content-{folder}-{stamp}.txt"), corpus)
    }

    pub fn write_report(&self, folder: &str, stamp: &str, report: &str) -> Result<PathBuf> {
        self.write(format!("{folder}-detailed-description-{stamp}.md"), report)
    }

    fn write(&self, file_name: String, content: &str) -> Result<PathBuf> {
        let path = self.dir.join(file_name);
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), bytes = content.len(), "Wrote output file");
        Ok(path)
    }
}

/// Base name of the analysed directory, resolved so that `.` gives a real name.
pub fn folder_name(root: &Path) -> String {
    root.canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::file_name)
        .or_else(|| root.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string())
}

/// ISO-8601 UTC with `:` and `.` replaced, safe for file names.
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}
