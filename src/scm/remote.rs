//! Remote repositories
//!
//! A remote is cloned once into a directory under a temporary root and then
//! mined through a regular [`GitRepository`].

use super::{BlamedLine, GitRepository, GitSettings, RepositoryFile, RepositoryInfo, Scm};
use crate::domain::{Branches, ChangeSet, Commit};
use crate::error::ScmError;
use git2::build::RepoBuilder;
use std::path::{Path, PathBuf};

/// A repository cloned from a URL
pub struct GitRemoteRepository {
    url: String,
    temp_path: PathBuf,
    inner: GitRepository,
}

impl GitRemoteRepository {
    /// Clone `url` below `root` (reusing an earlier clone) and open it
    pub fn clone_into<P: AsRef<Path>>(
        url: &str,
        root: P,
        bare: bool,
        settings: GitSettings,
    ) -> Result<Self, ScmError> {
        let temp_path = temp_dir_for(url, root.as_ref());

        if temp_path.exists() {
            tracing::info!("Reusing clone of {} at {}", url, temp_path.display());
        } else {
            tracing::info!("Cloning {} to {}", url, temp_path.display());
            RepoBuilder::new()
                .bare(bare)
                .clone(url, &temp_path)
                .map_err(|e| ScmError::CloneFailed {
                    url: url.to_string(),
                    reason: e.message().to_string(),
                })?;
        }

        let inner = GitRepository::open(&temp_path, settings)?;
        Ok(Self {
            url: url.to_string(),
            temp_path,
            inner,
        })
    }

    /// Clone a single project below the system temp directory
    pub fn single_project(url: &str, settings: GitSettings) -> Result<Self, ScmError> {
        Self::clone_into(url, crate::paths::PlatformPaths::clone_root(), false, settings)
    }

    /// Clone every URL; stops at the first failure
    pub fn all_projects_in(urls: &[String], settings: &GitSettings) -> Result<Vec<Self>, ScmError> {
        urls.iter()
            .map(|url| Self::single_project(url, settings.clone()))
            .collect()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Remove the cloned directory
    pub fn delete_temp_path(self) -> Result<(), ScmError> {
        let path = self.temp_path.clone();
        drop(self);
        if path.exists() {
            std::fs::remove_dir_all(&path)?;
        }
        Ok(())
    }
}

/// Clone target for `url`: the last path segment without `.git`
pub fn temp_dir_for(url: &str, root: &Path) -> PathBuf {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed
        .rsplit(['/', ':'])
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or("repository");
    let name = last.strip_suffix(".git").unwrap_or(last);
    root.join(name)
}

impl Scm for GitRemoteRepository {
    fn change_sets(&self) -> Result<Vec<ChangeSet>, ScmError> {
        self.inner.change_sets()
    }

    fn commit(&self, id: &str) -> Result<Commit, ScmError> {
        self.inner.commit(id)
    }

    fn head(&self) -> Result<ChangeSet, ScmError> {
        self.inner.head()
    }

    fn branches_containing(&self, id: &str) -> Result<Branches, ScmError> {
        self.inner.branches_containing(id)
    }

    fn files(&self) -> Result<Vec<RepositoryFile>, ScmError> {
        self.inner.files()
    }

    fn reset(&self) -> Result<(), ScmError> {
        self.inner.reset()
    }

    fn checkout(&self, id: &str) -> Result<(), ScmError> {
        self.inner.checkout(id)
    }

    fn blame(
        &self,
        file: &str,
        commit: &str,
        prior_commit: bool,
    ) -> Result<Vec<BlamedLine>, ScmError> {
        self.inner.blame(file, commit, prior_commit)
    }

    fn describe(&self) -> Result<RepositoryInfo, ScmError> {
        let mut info = self.inner.describe()?;
        if info.origin.is_empty() {
            info.origin = self.url.clone();
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::GitFixture;

    #[test]
    fn test_temp_dir_for_urls() {
        let root = Path::new("/tmp/clones");
        assert_eq!(
            temp_dir_for("https://github.com/rust-lang/git2-rs.git", root),
            root.join("git2-rs")
        );
        assert_eq!(
            temp_dir_for("git@github.com:owner/project", root),
            root.join("project")
        );
        assert_eq!(
            temp_dir_for("https://example.com/repo/", root),
            root.join("repo")
        );
    }

    #[test]
    fn test_clone_local_path() {
        let mut fx = GitFixture::new();
        fx.write("readme.md", "hello\n");
        let hash = fx.commit("initial");

        let root = tempfile::TempDir::new().unwrap();
        let url = fx.path().display().to_string();
        let remote = GitRemoteRepository::clone_into(&url, root.path(), false, GitSettings::default())
            .unwrap();

        assert!(remote.temp_path().starts_with(root.path()));
        assert_eq!(remote.head().unwrap().id, hash);
        let info = remote.describe().unwrap();
        assert_eq!(info.first_commit, hash);
        assert!(!info.origin.is_empty());

        let path = remote.temp_path().to_path_buf();
        remote.delete_temp_path().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_clone_failure() {
        let root = tempfile::TempDir::new().unwrap();
        let result = GitRemoteRepository::clone_into(
            "/no/such/upstream.git",
            root.path(),
            false,
            GitSettings::default(),
        );
        assert!(matches!(result, Err(ScmError::CloneFailed { .. })));
    }
}
