use std::path::{Path, PathBuf};
use std::process::Command;

/// Read-only view of the repository HEAD used by the `git.*` built-ins.
pub trait GitRepositoryInfo: Send + Sync {
    /// Short name of the checked-out branch. Fails when HEAD is detached.
    fn current_branch(&self) -> crate::Result<String>;

    /// Full hash of the HEAD commit.
    fn current_commit(&self) -> crate::Result<String>;

    /// First tag pointing at HEAD, if any.
    fn current_tag(&self) -> crate::Result<Option<String>>;
}

/// [`GitRepositoryInfo`] backed by the `git` executable.
///
/// Lookups block on the child process. Async callers run them on a task other
/// than the one watching for cancellation.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo: PathBuf,
}

impl GitCli {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    fn run(&self, args: &[&str]) -> crate::Result<std::process::Output> {
        let command = args.join(" ");
        tracing::trace!(repo = %self.repo.display(), %command, "running git");
        Command::new("git")
            .args(args)
            .current_dir(&self.repo)
            .output()
            .map_err(|e| crate::Error::GitSpawn { command, source: e })
    }

    fn stdout(&self, args: &[&str]) -> crate::Result<String> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(crate::Error::GitFailed {
                command: args.join(" "),
                stderr: stderr.trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }
}

impl GitRepositoryInfo for GitCli {
    fn current_branch(&self) -> crate::Result<String> {
        // `-q` makes a detached HEAD exit 1 with no output.
        let output = self.run(&["symbolic-ref", "--short", "-q", "HEAD"])?;
        if output.status.code() == Some(1) && output.stderr.is_empty() {
            return Err(crate::Error::DetachedHead);
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(crate::Error::GitFailed {
                command: "symbolic-ref --short -q HEAD".to_owned(),
                stderr: stderr.trim().to_owned(),
            });
        }
        let branch = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        if branch.is_empty() {
            return Err(crate::Error::DetachedHead);
        }
        Ok(branch)
    }

    fn current_commit(&self) -> crate::Result<String> {
        self.stdout(&["rev-parse", "HEAD"])
    }

    fn current_tag(&self) -> crate::Result<Option<String>> {
        let tags = self.stdout(&["tag", "--points-at", "HEAD"])?;
        Ok(tags
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_owned))
    }
}
