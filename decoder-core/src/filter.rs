//! Inclusion/exclusion rules for the corpus walk.
//!
//! [`PathFilter`] is a pure predicate: no I/O, no errors. The only filesystem
//! access in this module is [`IgnoreList::load`], which reads the optional
//! `.gitignore` of the analysed tree and compiles it into one [`GlobSet`].

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const DEFAULT_INCLUDED_EXTENSIONS: &[&str] = &[
    ".js", ".ts", ".jsx", ".tsx", ".vue", ".py", ".rb", ".php", ".go", ".java", ".cs", ".cpp",
    ".h", ".json", ".yaml", ".yml", ".toml", ".ini", ".env", ".md", ".txt", ".csv",
];
const DEFAULT_EXCLUDED_FILES: &[&str] = &[".gitignore", "package-lock.json", "yarn.lock", ".DS_Store"];
const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "dist",
    "build",
    "target",
    "out",
    "bin",
    "Pods",
    "Images",
];

/// Whether a path names a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Static inclusion/exclusion configuration. Exclusion always wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Extensions including the leading dot, matched case-sensitively.
    pub include_extensions: BTreeSet<String>,
    /// Exact base names that are never included.
    pub exclude_files: BTreeSet<String>,
    /// Directory names pruned wherever they appear in a path.
    pub exclude_dirs: BTreeSet<String>,
    /// Patterns loaded from the tree's ignore file; never read from YAML.
    #[serde(skip)]
    pub ignore: IgnoreList,
}

impl Default for FilterConfig {
    fn default() -> Self {
        fn set(items: &[&str]) -> BTreeSet<String> {
            items.iter().map(|s| s.to_string()).collect()
        }
        Self {
            include_extensions: set(DEFAULT_INCLUDED_EXTENSIONS),
            exclude_files: set(DEFAULT_EXCLUDED_FILES),
            exclude_dirs: set(DEFAULT_EXCLUDED_DIRS),
            ignore: IgnoreList::default(),
        }
    }
}

/// Decides whether a path is traversed (directories) or included (files).
#[derive(Debug, Clone)]
pub struct PathFilter {
    config: FilterConfig,
}

impl PathFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Precedence: excluded directory segment, excluded file name, ignore
    /// pattern, then directories pass and files must carry an included
    /// extension.
    pub fn should_include(&self, path: &Path, kind: EntryKind) -> bool {
        if segments(path).any(|seg| self.config.exclude_dirs.contains(seg)) {
            return false;
        }

        let base_name = path.file_name().and_then(|n| n.to_str());

        if kind == EntryKind::File {
            if let Some(name) = base_name {
                if self.config.exclude_files.contains(name) {
                    return false;
                }
            }
        }

        if self.config.ignore.is_ignored(path, kind) {
            debug!(path = %path.display(), "Ignored: {}", path.display());
            return false;
        }

        match kind {
            EntryKind::Directory => true,
            EntryKind::File => path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| self.config.include_extensions.contains(&format!(".{ext}")))
                .unwrap_or(false),
        }
    }
}

/// Named path components only; `.`, `..` and roots are not segments.
fn segments(path: &Path) -> impl Iterator<Item = &str> {
    path.components().filter_map(|c| match c {
        Component::Normal(s) => s.to_str(),
        _ => None,
    })
}

/// Patterns from an ignore file, with `.gitignore` semantics.
///
/// - Blank lines and `#` comments are dropped; `\#` and `\!` escape the marker.
/// - `!pattern` re-includes what an earlier pattern excluded.
/// - A trailing `/` restricts the pattern to directories.
/// - A pattern containing `/` (other than trailing) is anchored at the root;
///   any other pattern matches at every depth.
///
/// The last matching pattern decides. An ignored directory hides everything
/// below it, and a negation cannot re-include a file inside it.
#[derive(Debug, Clone)]
pub struct IgnoreList {
    globs: GlobSet,
    rules: Vec<IgnoreRule>,
}

#[derive(Debug, Clone, Copy)]
struct IgnoreRule {
    negated: bool,
    dir_only: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum IgnoreError {
    #[error("failed to read ignore file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid ignore pattern on line {line}: {source}")]
    Pattern {
        line: usize,
        #[source]
        source: globset::Error,
    },
    #[error("failed to compile ignore patterns: {0}")]
    Compile(#[source] globset::Error),
}

impl Default for IgnoreList {
    fn default() -> Self {
        Self {
            globs: GlobSet::empty(),
            rules: Vec::new(),
        }
    }
}

impl IgnoreList {
    pub fn parse(content: &str) -> Result<Self, IgnoreError> {
        let mut builder = GlobSetBuilder::new();
        let mut rules = Vec::new();

        for (index, raw) in content.lines().enumerate() {
            let mut pattern = raw.trim_end();
            if pattern.is_empty() || pattern.starts_with('#') {
                continue;
            }
            let negated = match pattern.strip_prefix('!') {
                Some(rest) => {
                    pattern = rest;
                    true
                }
                None => false,
            };
            if let Some(rest) = pattern.strip_prefix('\\') {
                if rest.starts_with('#') || rest.starts_with('!') {
                    pattern = rest;
                }
            }
            let dir_only = match pattern.strip_suffix('/') {
                Some(rest) => {
                    pattern = rest;
                    true
                }
                None => false,
            };
            let anchored = pattern.contains('/');
            let pattern = pattern.trim_start_matches('/');
            if pattern.is_empty() {
                continue;
            }

            let glob_text = if anchored {
                pattern.to_string()
            } else {
                format!("**/{pattern}")
            };
            let glob = GlobBuilder::new(&glob_text)
                .literal_separator(true)
                .build()
                .map_err(|source| IgnoreError::Pattern {
                    line: index + 1,
                    source,
                })?;
            builder.add(glob);
            rules.push(IgnoreRule { negated, dir_only });
        }

        let globs = builder.build().map_err(IgnoreError::Compile)?;
        Ok(Self { globs, rules })
    }

    /// Reads `<root>/.gitignore`. A missing file yields an empty list.
    pub fn load(root: &Path) -> Result<Self, IgnoreError> {
        let path = root.join(".gitignore");
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let list = Self::parse(&content)?;
                info!(path = %path.display(), patterns = list.len(), "Loaded ignore file");
                Ok(list)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No .gitignore file found. Proceeding without ignored files.");
                Ok(Self::default())
            }
            Err(source) => Err(IgnoreError::Read { path, source }),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// `path` is relative to the root the ignore file was loaded from.
    pub fn is_ignored(&self, path: &Path, kind: EntryKind) -> bool {
        if self.rules.is_empty() {
            return false;
        }
        let segs: Vec<&str> = segments(path).collect();
        let mut prefix = String::new();
        for (i, seg) in segs.iter().enumerate() {
            if i > 0 {
                prefix.push('/');
            }
            prefix.push_str(seg);
            let is_dir = i + 1 < segs.len() || kind == EntryKind::Directory;
            if self.decide(&prefix, is_dir) {
                return true;
            }
        }
        false
    }

    fn decide(&self, rel: &str, is_dir: bool) -> bool {
        self.globs
            .matches(rel)
            .into_iter()
            .filter(|&index| is_dir || !self.rules[index].dir_only)
            .max()
            .is_some_and(|index| !self.rules[index].negated)
    }
}
