//! pnpm workspace discovery and dependency closure.
//!
//! Packages are found by walking the repository (see [`crate::walk`]) and
//! keeping every included directory that holds a `package.json`. The result
//! is always sorted by path so downstream plans are reproducible.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::walk::{EntryFilter, PatternSet, RepoWalker, normalize_pattern};

/// Workspace manifest file at the repository root.
pub const WORKSPACE_MANIFEST: &str = "pnpm-workspace.yaml";

/// Per-package manifest file.
pub const PACKAGE_MANIFEST: &str = "package.json";

/// The subset of `package.json` the pipeline needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,
}

/// A workspace package. Identity is `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// Slash-separated directory relative to the repository root
    pub path: String,
    pub manifest: PackageManifest,
    /// `package.json` path relative to the repository root
    pub manifest_path: String,
}

impl Package {
    /// Builds a package whose manifest lives at `<path>/package.json`.
    pub fn new(path: impl Into<String>, manifest: PackageManifest) -> Self {
        let path = path.into();
        let manifest_path = join_rel(&path, PACKAGE_MANIFEST);
        Self {
            path,
            manifest,
            manifest_path,
        }
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    /// Repo-relative path of `rel` inside this package.
    pub fn join(&self, rel: &str) -> String {
        join_rel(&self.path, rel)
    }

    /// Declared dependency names across the requested kinds.
    pub fn dependency_names(&self, kinds: &[DependencyKind]) -> HashSet<&str> {
        let mut names = HashSet::new();
        for kind in kinds {
            let map = match kind {
                DependencyKind::Dependencies => &self.manifest.dependencies,
                DependencyKind::DevDependencies => &self.manifest.dev_dependencies,
                DependencyKind::PeerDependencies => &self.manifest.peer_dependencies,
            };
            names.extend(map.keys().map(String::as_str));
        }
        names
    }
}

/// Dependency edge kinds followed by [`PnpmWorkspace::package_dependencies`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    Dependencies,
    DevDependencies,
    PeerDependencies,
}

impl DependencyKind {
    pub const ALL: [DependencyKind; 3] = [
        DependencyKind::Dependencies,
        DependencyKind::DevDependencies,
        DependencyKind::PeerDependencies,
    ];
}

#[derive(Debug, Deserialize)]
struct WorkspaceManifest {
    #[serde(default)]
    packages: Vec<String>,
}

/// A pnpm monorepo rooted at `repo_root`.
#[derive(Debug, Clone)]
pub struct PnpmWorkspace {
    repo_root: PathBuf,
}

impl PnpmWorkspace {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Discovers every workspace package, sorted by path.
    ///
    /// # Errors
    ///
    /// - [`Error::WorkspaceManifestMissing`](crate::Error::WorkspaceManifestMissing) /
    ///   [`Error::EmptyWorkspace`](crate::Error::EmptyWorkspace) for an unusable manifest
    /// - [`Error::PackageManifestParse`](crate::Error::PackageManifestParse) for a malformed `package.json`
    /// - walk and I/O failures as operational errors
    pub fn workspace_packages(&self) -> crate::Result<Vec<Package>> {
        let patterns = self.manifest_patterns()?;
        let (include, exclude) = split_patterns(&patterns);
        tracing::debug!(?include, ?exclude, "workspace patterns");

        let include = PatternSet::new(&include)?;
        let exclude = PatternSet::new(&exclude)?;
        let walker = RepoWalker::open(&self.repo_root)?;

        let mut packages = Vec::new();
        for dir in walker.walk(&include, &exclude, EntryFilter::Directories)? {
            let manifest_path = dir.abs_path.join(PACKAGE_MANIFEST);
            if !manifest_path.is_file() {
                continue;
            }
            let manifest = read_package_manifest(&manifest_path)?;
            tracing::trace!(path = %dir.rel_path, name = %manifest.name, "workspace package");
            packages.push(Package::new(dir.rel_path, manifest));
        }

        packages.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::debug!(count = packages.len(), "workspace packages discovered");
        Ok(packages)
    }

    /// Transitive closure of `package` over `all` along the given edge kinds.
    ///
    /// Each workspace package is claimed at most once, so cycles terminate and
    /// every member of a cycle appears exactly once; `package` itself is part
    /// of the result only when some dependency path leads back to it.
    /// Names without a workspace package are external and contribute nothing.
    /// When two packages share a name, the first one by path wins.
    pub fn package_dependencies(
        &self,
        package: &Package,
        all: &[Package],
        kinds: &[DependencyKind],
    ) -> Vec<Package> {
        dependency_closure(package, all, kinds)
    }

    fn manifest_patterns(&self) -> crate::Result<Vec<String>> {
        let path = self.repo_root.join(WORKSPACE_MANIFEST);
        tracing::debug!(path = %path.display(), "loading workspace manifest");

        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                crate::Error::WorkspaceManifestMissing { path: path.clone() }
            } else {
                crate::Error::WorkspaceManifestRead {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;

        // An empty document deserializes as unit, not as a struct.
        let manifest: Option<WorkspaceManifest> =
            serde_yaml::from_str(&content).map_err(|e| crate::Error::WorkspaceManifestParse {
                path: path.clone(),
                source: e,
            })?;

        let packages = match manifest {
            Some(manifest) => manifest.packages,
            None => Vec::new(),
        };
        if packages.iter().all(|p| p.trim().is_empty()) {
            return Err(crate::Error::EmptyWorkspace { path });
        }
        Ok(packages)
    }
}

/// Splits workspace patterns into includes and `!`-prefixed excludes.
pub fn split_patterns(patterns: &[String]) -> (Vec<String>, Vec<String>) {
    let mut include = Vec::new();
    let mut exclude = Vec::new();

    for pattern in patterns {
        let trimmed = pattern.trim();
        let (negated, body) = match trimmed.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let body = normalize_pattern(body);
        if body.is_empty() {
            continue;
        }
        if negated {
            exclude.push(body);
        } else {
            include.push(body);
        }
    }

    (include, exclude)
}

/// Worklist closure over package indices; see [`PnpmWorkspace::package_dependencies`].
pub fn dependency_closure(root: &Package, all: &[Package], kinds: &[DependencyKind]) -> Vec<Package> {
    let mut claimed = vec![false; all.len()];
    let mut claimed_names: HashSet<&str> = HashSet::new();
    let mut closure: Vec<usize> = Vec::new();
    let mut queue: VecDeque<&Package> = VecDeque::from([root]);

    while let Some(current) = queue.pop_front() {
        let wanted = current.dependency_names(kinds);
        if wanted.is_empty() {
            continue;
        }
        for (idx, candidate) in all.iter().enumerate() {
            if claimed[idx] || !wanted.contains(candidate.name()) {
                continue;
            }
            if !claimed_names.insert(candidate.name()) {
                continue;
            }
            claimed[idx] = true;
            closure.push(idx);
            queue.push_back(candidate);
        }
    }

    let mut result: Vec<Package> = closure.into_iter().map(|i| all[i].clone()).collect();
    result.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(
        package = %root.name(),
        dependencies = ?result.iter().map(|p| p.path.as_str()).collect::<Vec<_>>(),
        "dependency closure"
    );
    result
}

fn read_package_manifest(path: &Path) -> crate::Result<PackageManifest> {
    let content = std::fs::read_to_string(path).map_err(|e| crate::Error::PackageManifestRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| crate::Error::PackageManifestParse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn join_rel(dir: &str, file: &str) -> String {
    if dir == "." || dir.is_empty() {
        file.to_owned()
    } else {
        format!("{dir}/{file}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(path: &str, name: &str, deps: &[&str]) -> Package {
        Package::new(
            path,
            PackageManifest {
                name: name.to_owned(),
                dependencies: deps
                    .iter()
                    .map(|d| ((*d).to_owned(), "workspace:*".to_owned()))
                    .collect(),
                ..Default::default()
            },
        )
    }

    fn paths(packages: &[Package]) -> Vec<&str> {
        packages.iter().map(|p| p.path.as_str()).collect()
    }

    #[test]
    fn join_handles_root_package() {
        assert_eq!(pkg(".", "root", &[]).join("node_modules"), "node_modules");
        assert_eq!(pkg("apps/api", "api", &[]).join("node_modules"), "apps/api/node_modules");
    }

    // ── split_patterns ──

    #[test]
    fn split_separates_negations() {
        let patterns = vec![
            "apps/*".to_owned(),
            " ./packages/** ".to_owned(),
            "!packages/**/fixtures/**".to_owned(),
            "! ./legacy".to_owned(),
            "   ".to_owned(),
            "!".to_owned(),
        ];
        let (include, exclude) = split_patterns(&patterns);
        assert_eq!(include, vec!["apps/*", "packages/**"]);
        assert_eq!(exclude, vec!["packages/**/fixtures/**", "legacy"]);
    }

    // ── dependency_closure ──

    #[test]
    fn closure_follows_transitive_edges() {
        let all = vec![
            pkg("apps/api", "api", &["lib-b"]),
            pkg("packages/lib-a", "lib-a", &[]),
            pkg("packages/lib-b", "lib-b", &["lib-a"]),
        ];
        let deps = dependency_closure(&all[0], &all, &[DependencyKind::Dependencies]);
        assert_eq!(paths(&deps), vec!["packages/lib-a", "packages/lib-b"]);
    }

    #[test]
    fn closure_includes_cycle_members_once() {
        let all = vec![
            pkg("a", "a", &["b"]),
            pkg("b", "b", &["c"]),
            pkg("c", "c", &["a"]),
        ];
        let deps = dependency_closure(&all[0], &all, &[DependencyKind::Dependencies]);
        assert_eq!(paths(&deps), vec!["a", "b", "c"]);
    }

    #[test]
    fn closure_ignores_external_dependencies() {
        let all = vec![pkg("a", "a", &["react", "b"]), pkg("b", "b", &["lodash"])];
        let deps = dependency_closure(&all[0], &all, &[DependencyKind::Dependencies]);
        assert_eq!(paths(&deps), vec!["b"]);
    }

    #[test]
    fn closure_respects_requested_kinds() {
        let mut app = pkg("app", "app", &[]);
        app.manifest
            .dev_dependencies
            .insert("tooling".to_owned(), "workspace:*".to_owned());
        app.manifest
            .peer_dependencies
            .insert("peer".to_owned(), "workspace:*".to_owned());
        let all = vec![app.clone(), pkg("peer", "peer", &[]), pkg("tooling", "tooling", &[])];

        let prod = dependency_closure(&app, &all, &[DependencyKind::Dependencies]);
        assert!(prod.is_empty());

        let dev = dependency_closure(
            &app,
            &all,
            &[DependencyKind::Dependencies, DependencyKind::DevDependencies],
        );
        assert_eq!(paths(&dev), vec!["tooling"]);

        let every = dependency_closure(&app, &all, &DependencyKind::ALL);
        assert_eq!(paths(&every), vec!["peer", "tooling"]);
    }

    #[test]
    fn closure_first_path_wins_on_name_collision() {
        let all = vec![
            pkg("app", "app", &["dup"]),
            pkg("x/dup", "dup", &[]),
            pkg("y/dup", "dup", &[]),
        ];
        let deps = dependency_closure(&all[0], &all, &[DependencyKind::Dependencies]);
        assert_eq!(paths(&deps), vec!["x/dup"]);
    }

    // ── Property-based tests ──

    mod proptests {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeSet;

        /// Strategy: adjacency lists for up to 8 packages, edges may form cycles
        /// and may point at names outside the workspace (index >= n).
        fn graph() -> impl Strategy<Value = Vec<Vec<usize>>> {
            (1usize..=8).prop_flat_map(|n| {
                proptest::collection::vec(proptest::collection::vec(0..n + 2, 0..4), n)
            })
        }

        fn build(graph: &[Vec<usize>]) -> Vec<Package> {
            graph
                .iter()
                .enumerate()
                .map(|(i, edges)| {
                    let deps: Vec<String> = edges.iter().map(|e| format!("pkg-{e}")).collect();
                    let deps: Vec<&str> = deps.iter().map(String::as_str).collect();
                    pkg(&format!("packages/p{i:02}"), &format!("pkg-{i}"), &deps)
                })
                .collect()
        }

        /// Plain recursive reachability, used as the reference answer.
        fn reachable(graph: &[Vec<usize>], from: usize) -> BTreeSet<usize> {
            fn visit(graph: &[Vec<usize>], node: usize, seen: &mut BTreeSet<usize>) {
                for &next in &graph[node] {
                    if next < graph.len() && seen.insert(next) {
                        visit(graph, next, seen);
                    }
                }
            }
            let mut seen = BTreeSet::new();
            visit(graph, from, &mut seen);
            seen
        }

        proptest! {
            #[test]
            fn closure_equals_reachable_set(g in graph(), root_seed in any::<usize>()) {
                let all = build(&g);
                let root = root_seed % all.len();
                let deps = dependency_closure(&all[root], &all, &[DependencyKind::Dependencies]);

                let expected: Vec<String> = reachable(&g, root)
                    .into_iter()
                    .map(|i| format!("packages/p{i:02}"))
                    .collect();
                let got: Vec<String> = deps.iter().map(|p| p.path.clone()).collect();
                prop_assert_eq!(got, expected);
            }

            #[test]
            fn closure_is_sorted_and_unique(g in graph(), root_seed in any::<usize>()) {
                let all = build(&g);
                let root = root_seed % all.len();
                let deps = dependency_closure(&all[root], &all, &[DependencyKind::Dependencies]);
                for pair in deps.windows(2) {
                    prop_assert!(pair[0].path < pair[1].path);
                }
            }

            #[test]
            fn closure_independent_of_input_order(g in graph(), root_seed in any::<usize>()) {
                let all = build(&g);
                let root = root_seed % all.len();
                let mut reversed = all.clone();
                reversed.reverse();
                let forward = dependency_closure(&all[root], &all, &[DependencyKind::Dependencies]);
                let backward = dependency_closure(&all[root], &reversed, &[DependencyKind::Dependencies]);
                prop_assert_eq!(forward, backward);
            }
        }
    }
}
