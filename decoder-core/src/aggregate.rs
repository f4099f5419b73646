//! Recursive corpus aggregation.
//!
//! Walks a root directory depth-first, consulting [`PathFilter`] for every
//! entry, and builds two parallel texts in one pass:
//! - the **corpus**: `File: <path>` header plus a `Content:` block per file;
//! - the **tree**: the header lines only, for a cheap preview.
//!
//! Entries of a directory are visited in file-name order, so aggregating an
//! unchanged tree twice yields byte-identical output. Exclusion is decided
//! before anything is read: an excluded entry never fails the walk. Symbolic
//! links are followed, except back into a directory already on the current
//! branch. Any read failure on an included entry aborts the whole aggregation.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::filter::{EntryKind, PathFilter};

/// Output of a completed walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub corpus: String,
    pub tree: String,
    /// Number of files included in the corpus.
    pub files: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("failed to list directory {path}: {source}")]
    ListDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to inspect {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("file {path} is not valid UTF-8 text")]
    NotText { path: PathBuf },
}

pub struct CorpusAggregator {
    filter: PathFilter,
}

impl CorpusAggregator {
    pub fn new(filter: PathFilter) -> Self {
        Self { filter }
    }

    /// Aggregate every included file under `root`.
    ///
    /// Header paths are `root` joined with the entry's relative path; the
    /// filter only ever sees the path relative to `root`.
    pub fn aggregate(&self, root: &Path) -> Result<Aggregation, AggregateError> {
        info!(root = %root.display(), "Aggregating project files");
        let mut out = Aggregation {
            corpus: String::new(),
            tree: String::new(),
            files: 0,
        };

        let walk = fs::canonicalize(root)
            .map_err(|source| AggregateError::ListDir {
                path: root.to_path_buf(),
                source,
            })
            .and_then(|canonical| {
                let mut ancestors = vec![canonical];
                self.visit_dir(root, Path::new(""), &mut ancestors, &mut out)
            });
        if let Err(e) = walk {
            error!(error = %e, root = %root.display(), "Aggregation failed");
            return Err(e);
        }

        info!(
            files = out.files,
            corpus_bytes = out.corpus.len(),
            "Completed aggregation"
        );
        Ok(out)
    }

    /// `ancestors` holds the canonical path of every directory on the current
    /// branch, `dir` itself last.
    fn visit_dir(
        &self,
        dir: &Path,
        rel_dir: &Path,
        ancestors: &mut Vec<PathBuf>,
        out: &mut Aggregation,
    ) -> Result<(), AggregateError> {
        let list_err = |source| AggregateError::ListDir {
            path: dir.to_path_buf(),
            source,
        };
        let mut entries = fs::read_dir(dir)
            .map_err(list_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(list_err)?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let rel_path = rel_dir.join(entry.file_name());
            let metadata_err = |source| AggregateError::Metadata {
                path: path.clone(),
                source,
            };

            let file_type = entry.file_type().map_err(metadata_err)?;
            let is_link = file_type.is_symlink();
            let kind = if is_link {
                match fs::metadata(&path) {
                    Ok(target) => entry_kind(&target.file_type()),
                    // Unresolvable link: only its name can be judged.
                    Err(_) if !self.filter.should_include(&rel_path, EntryKind::File) => {
                        debug!(path = %path.display(), "Skipping excluded unresolvable link");
                        continue;
                    }
                    Err(source) => return Err(metadata_err(source)),
                }
            } else {
                entry_kind(&file_type)
            };
            let Some(kind) = kind else {
                debug!(path = %path.display(), "Skipping special file");
                continue;
            };

            if !self.filter.should_include(&rel_path, kind) {
                debug!(path = %path.display(), ?kind, "Skipping excluded entry");
                continue;
            }

            match kind {
                EntryKind::Directory => {
                    let canonical = if is_link {
                        fs::canonicalize(&path).map_err(metadata_err)?
                    } else {
                        match ancestors.last() {
                            Some(parent) => parent.join(entry.file_name()),
                            None => fs::canonicalize(&path).map_err(metadata_err)?,
                        }
                    };
                    if ancestors.contains(&canonical) {
                        debug!(path = %path.display(), "Skipping link back to an enclosing directory");
                        continue;
                    }
                    ancestors.push(canonical);
                    let visited = self.visit_dir(&path, &rel_path, ancestors, out);
                    ancestors.pop();
                    visited?;
                }
                EntryKind::File => {
                    let bytes = fs::read(&path).map_err(|source| AggregateError::ReadFile {
                        path: path.clone(),
                        source,
                    })?;
                    let content = String::from_utf8(bytes)
                        .map_err(|_| AggregateError::NotText { path: path.clone() })?;

                    let header = format!("File: {}\n", path.display());
                    out.tree.push_str(&header);
                    out.corpus.push_str(&header);
                    out.corpus.push_str("Content:\n");
                    out.corpus.push_str(&content);
                    out.corpus.push_str("\n\n");
                    out.files += 1;
                    debug!(path = %path.display(), size = content.len(), "Added file to corpus");
                }
            }
        }
        Ok(())
    }
}

fn entry_kind(file_type: &fs::FileType) -> Option<EntryKind> {
    if file_type.is_dir() {
        Some(EntryKind::Directory)
    } else if file_type.is_file() {
        Some(EntryKind::File)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterConfig;
    use std::fs::{create_dir_all, write};
    use tempfile::tempdir;

    fn aggregator() -> CorpusAggregator {
        CorpusAggregator::new(PathFilter::new(FilterConfig::default()))
    }

    #[test]
    fn header_precedes_content_and_tree_has_headers_only() {
        let tmp = tempdir().unwrap();
        write(tmp.path().join("main.ts"), "console.log(1);").unwrap();

        let out = aggregator().aggregate(tmp.path()).unwrap();
        let header = format!("File: {}\n", tmp.path().join("main.ts").display());

        assert_eq!(out.corpus, format!("{header}Content:\nconsole.log(1);\n\n"));
        assert_eq!(out.tree, header);
        assert_eq!(out.files, 1);
    }

    #[test]
    fn subdirectory_is_fully_recursed_before_next_sibling() {
        let tmp = tempdir().unwrap();
        create_dir_all(tmp.path().join("b/inner")).unwrap();
        write(tmp.path().join("a.md"), "a").unwrap();
        write(tmp.path().join("b/inner/deep.md"), "deep").unwrap();
        write(tmp.path().join("b/z.md"), "bz").unwrap();
        write(tmp.path().join("c.md"), "c").unwrap();

        let out = aggregator().aggregate(tmp.path()).unwrap();
        let order: Vec<String> = out
            .tree
            .lines()
            .map(|l| {
                Path::new(l.trim_start_matches("File: "))
                    .strip_prefix(tmp.path())
                    .unwrap()
                    .display()
                    .to_string()
            })
            .collect();

        let expected: Vec<String> = ["a.md", "b/inner/deep.md", "b/z.md", "c.md"]
            .iter()
            .map(|p| PathBuf::from(p).display().to_string())
            .collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn root_inside_an_excluded_name_is_still_walked() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("build");
        create_dir_all(&root).unwrap();
        write(root.join("index.js"), "x").unwrap();

        let out = aggregator().aggregate(&root).unwrap();
        assert_eq!(out.files, 1);
    }

    #[test]
    fn non_utf8_file_fails_the_whole_aggregation() {
        let tmp = tempdir().unwrap();
        write(tmp.path().join("ok.txt"), "fine").unwrap();
        write(tmp.path().join("blob.txt"), [0xff, 0xfe, 0x00, 0x9f]).unwrap();

        let err = aggregator().aggregate(tmp.path()).unwrap_err();
        assert!(matches!(err, AggregateError::NotText { ref path } if path.ends_with("blob.txt")));
    }

    #[test]
    fn missing_root_is_fatal() {
        let tmp = tempdir().unwrap();
        let err = aggregator()
            .aggregate(&tmp.path().join("does-not-exist"))
            .unwrap_err();
        assert!(matches!(err, AggregateError::ListDir { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_with_included_name_is_surfaced() {
        let tmp = tempdir().unwrap();
        std::os::unix::fs::symlink(tmp.path().join("gone.ts"), tmp.path().join("link.ts")).unwrap();

        let err = aggregator().aggregate(tmp.path()).unwrap_err();
        assert!(matches!(err, AggregateError::Metadata { ref path, .. } if path.ends_with("link.ts")));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_with_excluded_name_is_skipped() {
        let tmp = tempdir().unwrap();
        write(tmp.path().join("a.ts"), "a").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("gone"), tmp.path().join("stale.log")).unwrap();
        create_dir_all(tmp.path().join("dist")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("gone.ts"), tmp.path().join("dist/x.ts")).unwrap();

        let out = aggregator().aggregate(tmp.path()).unwrap();
        assert_eq!(out.files, 1);
        assert_eq!(out.tree, format!("File: {}\n", tmp.path().join("a.ts").display()));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_outside_the_branch_is_walked() {
        let tmp = tempdir().unwrap();
        let shared = tmp.path().join("shared");
        create_dir_all(&shared).unwrap();
        write(shared.join("util.ts"), "u").unwrap();
        let root = tmp.path().join("project");
        create_dir_all(&root).unwrap();
        std::os::unix::fs::symlink(&shared, root.join("lib")).unwrap();

        let out = aggregator().aggregate(&root).unwrap();
        assert_eq!(out.files, 1);
        assert!(out.tree.contains(&root.join("lib/util.ts").display().to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn directory_symlink_cycle_is_not_walked() {
        let tmp = tempdir().unwrap();
        create_dir_all(tmp.path().join("src")).unwrap();
        write(tmp.path().join("src/app.ts"), "app").unwrap();
        std::os::unix::fs::symlink("..", tmp.path().join("src/up")).unwrap();

        let out = aggregator().aggregate(tmp.path()).unwrap();
        assert_eq!(out.files, 1);
        assert!(!out.tree.contains("src/up"));
    }

    #[cfg(unix)]
    #[test]
    fn excluded_unreadable_file_does_not_fail_the_walk() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempdir().unwrap();
        write(tmp.path().join("main.py"), "print(1)").unwrap();
        let locked = tmp.path().join("server.log");
        write(&locked, "secret").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        let out = aggregator().aggregate(tmp.path()).unwrap();
        assert_eq!(out.files, 1);
        assert!(!out.corpus.contains("secret"));
    }

    #[cfg(unix)]
    #[test]
    fn excluded_unreadable_directory_is_never_listed() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempdir().unwrap();
        write(tmp.path().join("main.py"), "print(1)").unwrap();
        let locked = tmp.path().join("node_modules");
        create_dir_all(locked.join("pkg")).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        let result = aggregator().aggregate(tmp.path());
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(result.unwrap().files, 1);
    }
}
