//! Repository walking shared by workspace discovery and task file discovery.
//!
//! Both walkers must agree on what is visible in a repository, so the prune
//! rules live here and nowhere else:
//!
//! 1. `.git` is pruned without descending.
//! 2. Paths matched by the root `.gitignore` are pruned (directories are
//!    tested both as a path and as `path/`).
//! 3. Paths matching no include pattern are skipped; directories are still
//!    descended because a deeper path may match.
//! 4. Included paths matching an exclude pattern are pruned.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use walkdir::WalkDir;

/// Version-control metadata directory name.
pub const VCS_DIR: &str = ".git";

/// Version-control ignore file name, read from the repository root only.
pub const IGNORE_FILE: &str = ".gitignore";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A compiled list of glob patterns matched against repo-relative,
/// slash-separated paths. `**` spans directories, `*` does not, and a
/// trailing `/**` also matches the directory it hangs off.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Compiles the given patterns, skipping blank ones.
    pub fn new<I, S>(patterns: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if pattern.is_empty() {
                continue;
            }
            compiled.push(compile(pattern, pattern)?);
            if let Some(dir) = pattern.strip_suffix("/**").filter(|dir| !dir.is_empty()) {
                compiled.push(compile(dir, pattern)?);
            }
        }
        Ok(Self { patterns: compiled })
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = if path.is_empty() { "." } else { path };
        self.patterns
            .iter()
            .any(|p| p.matches_with(path, MATCH_OPTIONS))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn compile(glob: &str, pattern: &str) -> crate::Result<Pattern> {
    Pattern::new(glob).map_err(|e| crate::Error::InvalidPattern {
        pattern: pattern.to_owned(),
        source: e,
    })
}

/// Which entries a walk yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFilter {
    Directories,
    Files,
}

/// A path yielded by [`RepoWalker::walk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Slash-separated path relative to the repository root (`.` for the root)
    pub rel_path: String,
    pub abs_path: PathBuf,
}

enum Visit {
    Prune,
    Skip,
    Match,
}

/// Walks a repository honoring `.git`, `.gitignore`, include and exclude rules.
#[derive(Debug)]
pub struct RepoWalker {
    root: PathBuf,
    gitignore: Gitignore,
}

impl RepoWalker {
    /// Opens `root`, compiling its `.gitignore` when one exists.
    pub fn open(root: &Path) -> crate::Result<Self> {
        let root = clean(root);
        let ignore_path = root.join(IGNORE_FILE);

        let gitignore = if ignore_path.is_file() {
            let mut builder = GitignoreBuilder::new(&root);
            if let Some(err) = builder.add(&ignore_path) {
                return Err(crate::Error::Gitignore {
                    path: ignore_path,
                    source: err,
                });
            }
            builder.build().map_err(|e| crate::Error::Gitignore {
                path: ignore_path.clone(),
                source: e,
            })?
        } else {
            Gitignore::empty()
        };

        Ok(Self { root, gitignore })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the root `.gitignore` excludes `rel_path`.
    pub fn is_ignored(&self, rel_path: &str, is_dir: bool) -> bool {
        if rel_path == "." || rel_path.is_empty() {
            return false;
        }
        self.gitignore.matched(rel_path, is_dir).is_ignore()
    }

    /// Walks the tree and returns the visible entries matching `include` and
    /// not `exclude`, sorted by relative path. Symbolic links are not followed.
    pub fn walk(
        &self,
        include: &PatternSet,
        exclude: &PatternSet,
        filter: EntryFilter,
    ) -> crate::Result<Vec<WalkEntry>> {
        let mut found = BTreeMap::new();
        let mut entries = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = entries.next() {
            let entry = entry.map_err(|e| crate::Error::Walk {
                root: self.root.clone(),
                source: e,
            })?;
            let is_dir = entry.file_type().is_dir();
            let rel_path = relative_slash_path(&self.root, entry.path());

            match self.visit(&rel_path, is_dir, include, exclude) {
                Visit::Prune => {
                    if is_dir {
                        tracing::trace!(path = %rel_path, "pruned");
                        entries.skip_current_dir();
                    }
                    continue;
                }
                Visit::Skip => continue,
                Visit::Match => {}
            }

            let wanted = match filter {
                EntryFilter::Directories => is_dir,
                EntryFilter::Files => !is_dir,
            };
            if wanted {
                found.insert(rel_path.clone(), entry.into_path());
            }
        }

        Ok(found
            .into_iter()
            .map(|(rel_path, abs_path)| WalkEntry { rel_path, abs_path })
            .collect())
    }

    fn visit(&self, rel_path: &str, is_dir: bool, include: &PatternSet, exclude: &PatternSet) -> Visit {
        if rel_path == VCS_DIR || rel_path.starts_with(".git/") {
            return Visit::Prune;
        }
        if self.is_ignored(rel_path, is_dir) {
            return Visit::Prune;
        }
        if !include.matches(rel_path) {
            return Visit::Skip;
        }
        if exclude.matches(rel_path) {
            return Visit::Prune;
        }
        Visit::Match
    }
}

/// Normalizes a user-written pattern: trims whitespace and a leading `./`,
/// and converts separators to `/`.
pub fn normalize_pattern(pattern: &str) -> String {
    let trimmed = pattern.trim();
    let trimmed = match trimmed.strip_prefix("./") {
        Some(rest) => rest.trim(),
        None => trimmed,
    };
    trimmed.replace('\\', "/")
}

fn relative_slash_path(root: &Path, path: &Path) -> String {
    // arch-lint: allow(no-silent-result-drop) reason="walk entries always live under the root; anything else is kept as given"
    let rel = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        ".".to_owned()
    } else {
        parts.join("/")
    }
}

fn clean(path: &Path) -> PathBuf {
    path.components().collect()
}
