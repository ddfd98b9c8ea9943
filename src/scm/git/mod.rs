//! Local git repositories backed by libgit2

use super::{BlamedLine, HandlePool, RepositoryFile, RepositoryInfo, Scm};
use crate::domain::{
    Branches, ChangeSet, Commit, DIFF_TOO_BIG, Developer, Modification, ModificationType,
};
use crate::error::ScmError;
use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use git2::build::CheckoutBuilder;
use git2::{
    BlameOptions, BranchType, Delta, DiffFindOptions, DiffOptions, ErrorCode, Oid, Repository,
    ResetType, Sort,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use walkdir::WalkDir;

/// Default ceiling on changed files per commit
pub const DEFAULT_MAX_FILES: usize = 5000;

/// Default ceiling on the length of one file's diff text
pub const DEFAULT_MAX_DIFF_SIZE: usize = 100_000;

/// Temporary branch used to hold checkouts
const CHECKOUT_BRANCH: &str = "mm";

/// Knobs for the git backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSettings {
    /// Commits touching more files fail with `CommitTooLarge`
    pub max_files: usize,
    /// Longer diffs are replaced by the size sentinel
    pub max_diff_size: usize,
    /// Lines of context in diffs; libgit2's default when unset
    pub diff_context: Option<u32>,
    /// Skip branch containment lookups
    pub omit_branches: bool,
    /// Only walk HEAD's first-parent chain
    pub first_parent_only: bool,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_diff_size: DEFAULT_MAX_DIFF_SIZE,
            diff_context: None,
            omit_branches: false,
            first_parent_only: false,
        }
    }
}

/// A local git repository
pub struct GitRepository {
    path: PathBuf,
    settings: GitSettings,
    main_branch: Option<String>,
    handles: HandlePool<Repository, ScmError>,
    /// Serializes working tree mutation
    worktree_lock: Mutex<()>,
}

impl GitRepository {
    /// Open the repository at `path`
    pub fn open<P: AsRef<Path>>(path: P, settings: GitSettings) -> Result<Self, ScmError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScmError::RepoNotFound(path.display().to_string()));
        }

        let path = path.canonicalize()?;
        // Fail now rather than on the first worker
        let repo = open_repository(&path)?;
        let main_branch = discover_main_branch(&repo);

        tracing::info!("Opened git repository at: {}", path.display());

        let opener_path = path.clone();
        Ok(Self {
            path,
            settings,
            main_branch,
            handles: HandlePool::new(move || open_repository(&opener_path)),
            worktree_lock: Mutex::new(()),
        })
    }

    /// Open every repository directly below `dir`
    pub fn all_projects_in<P: AsRef<Path>>(
        dir: P,
        settings: &GitSettings,
    ) -> Result<Vec<Self>, ScmError> {
        let mut dirs: Vec<PathBuf> = std::fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();

        dirs.iter()
            .map(|path| Self::open(path, settings.clone()))
            .collect()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &GitSettings {
        &self.settings
    }

    /// Branch checked out when the repository was opened
    pub fn main_branch(&self) -> Option<&str> {
        self.main_branch.as_deref()
    }

    fn with_repo<R>(
        &self,
        f: impl FnOnce(&mut Repository) -> Result<R, ScmError>,
    ) -> Result<R, ScmError> {
        self.handles.with(f)
    }

    fn walk(&self, repo: &Repository) -> Result<Vec<ChangeSet>, ScmError> {
        let mut revwalk = repo.revwalk()?;
        if self.settings.first_parent_only {
            revwalk.set_sorting(Sort::TOPOLOGICAL)?;
            revwalk.simplify_first_parent()?;
            revwalk.push_head()?;
        } else {
            revwalk.set_sorting(Sort::TIME)?;
            revwalk.push_glob("*")?;
            // Also covers a detached HEAD
            revwalk.push_head()?;
        }

        let mut change_sets = Vec::new();
        for oid in revwalk {
            let commit = repo.find_commit(oid?)?;
            let author = commit.author();
            change_sets.push(ChangeSet::new(
                commit.id().to_string(),
                to_datetime(&author.when()),
            ));
        }
        Ok(change_sets)
    }

    fn branches_of(&self, repo: &Repository, oid: Oid) -> Result<BTreeSet<String>, ScmError> {
        let mut names = BTreeSet::new();
        for branch in repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            let Some(tip) = branch.get().target() else {
                continue;
            };
            if tip == oid || repo.graph_descendant_of(tip, oid)? {
                if let Some(name) = branch.name()? {
                    let short = name.rsplit('/').next().unwrap_or(name);
                    names.insert(short.to_string());
                }
            }
        }
        Ok(names)
    }

    fn materialize(&self, repo: &Repository, id: &str) -> Result<Commit, ScmError> {
        let commit = repo
            .revparse_single(id)
            .and_then(|object| object.peel_to_commit())
            .map_err(|e| match e.code() {
                ErrorCode::NotFound | ErrorCode::Ambiguous | ErrorCode::InvalidSpec => {
                    ScmError::CommitNotFound(id.to_string())
                }
                _ => ScmError::Git(e),
            })?;

        let hash = commit.id().to_string();
        let author_sig = commit.author();
        let committer_sig = commit.committer();

        let (branches, in_main_branch) = if self.settings.omit_branches {
            (Branches::Omitted, true)
        } else {
            let names = self.branches_of(repo, commit.id())?;
            let in_main = self.main_branch().is_some_and(|main| names.contains(main));
            (Branches::Known(names), in_main)
        };

        let tree = commit.tree()?;
        let parent_tree = if commit.parent_count() > 0 {
            Some(commit.parent(0)?.tree()?)
        } else {
            None
        };

        let mut diff_opts = DiffOptions::new();
        if let Some(context) = self.settings.diff_context {
            diff_opts.context_lines(context);
        }
        let mut diff =
            repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut diff_opts))?;
        let mut find_opts = DiffFindOptions::new();
        find_opts.renames(true);
        diff.find_similar(Some(&mut find_opts))?;

        let files = diff.deltas().len();
        if files > self.settings.max_files {
            tracing::warn!("commit {} has more files than the limit", id);
            return Err(ScmError::CommitTooLarge {
                id: id.to_string(),
                files,
                max: self.settings.max_files,
            });
        }

        let mut modifications = Vec::with_capacity(files);
        for (idx, delta) in diff.deltas().enumerate() {
            let kind = modification_type(delta.status());
            let old_path = match kind {
                ModificationType::Add => None,
                _ => path_string(delta.old_file().path()),
            };
            let new_path = match kind {
                ModificationType::Delete => None,
                _ => path_string(delta.new_file().path()),
            };

            let (mut diff_text, source_code) = if kind == ModificationType::Delete {
                (String::new(), String::new())
            } else {
                let text = git2::Patch::from_diff(&diff, idx)?
                    .map(|mut patch| patch.to_buf())
                    .transpose()?
                    .map(|buf| String::from_utf8_lossy(&buf).into_owned())
                    .unwrap_or_default();
                let source = repo
                    .find_blob(delta.new_file().id())
                    .map(|blob| String::from_utf8_lossy(blob.content()).into_owned())
                    .unwrap_or_default();
                (text, source)
            };

            if diff_text.len() > self.settings.max_diff_size {
                tracing::warn!(
                    "diff for {} in {} too big",
                    new_path.as_deref().unwrap_or("?"),
                    hash
                );
                diff_text = DIFF_TOO_BIG.to_string();
            }

            modifications.push(Modification::new(
                old_path,
                new_path,
                kind,
                diff_text,
                source_code,
            ));
        }

        Ok(Commit {
            author: developer(&author_sig),
            committer: developer(&committer_sig),
            author_date: to_datetime(&author_sig.when()),
            committer_date: to_datetime(&committer_sig.when()),
            msg: commit.message().unwrap_or("").trim().to_string(),
            parents: commit.parent_ids().map(|p| p.to_string()).collect(),
            branches,
            in_main_branch,
            modifications,
            hash,
        })
    }

    fn main_branch_or_err(&self) -> Result<&str, ScmError> {
        self.main_branch()
            .ok_or_else(|| ScmError::Git(git2::Error::from_str("repository has no main branch")))
    }

    fn switch_to_main(&self, repo: &Repository) -> Result<(), ScmError> {
        let main = self.main_branch_or_err()?;
        let tip = repo
            .find_branch(main, BranchType::Local)?
            .get()
            .peel_to_commit()?;
        switch_branch(repo, main, &tip)
    }

    fn delete_checkout_branch(&self, repo: &Repository) -> Result<(), ScmError> {
        match repo.find_branch(CHECKOUT_BRANCH, BranchType::Local) {
            Ok(mut branch) => Ok(branch.delete()?),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Scm for GitRepository {
    fn change_sets(&self) -> Result<Vec<ChangeSet>, ScmError> {
        self.with_repo(|repo| self.walk(repo))
    }

    fn commit(&self, id: &str) -> Result<Commit, ScmError> {
        self.with_repo(|repo| self.materialize(repo, id))
    }

    fn head(&self) -> Result<ChangeSet, ScmError> {
        self.with_repo(|repo| {
            let commit = repo.head()?.peel_to_commit()?;
            Ok(ChangeSet::new(
                commit.id().to_string(),
                to_datetime(&commit.author().when()),
            ))
        })
    }

    fn branches_containing(&self, id: &str) -> Result<Branches, ScmError> {
        if self.settings.omit_branches {
            return Ok(Branches::Omitted);
        }
        self.with_repo(|repo| {
            let oid = repo
                .revparse_single(id)
                .map_err(|_| ScmError::CommitNotFound(id.to_string()))?
                .id();
            Ok(Branches::Known(self.branches_of(repo, oid)?))
        })
    }

    fn files(&self) -> Result<Vec<RepositoryFile>, ScmError> {
        let files = WalkDir::new(&self.path)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != ".git")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| RepositoryFile::new(entry.into_path()))
            .collect();
        Ok(files)
    }

    fn reset(&self) -> Result<(), ScmError> {
        let _guard = self
            .worktree_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.with_repo(|repo| {
            self.switch_to_main(repo)?;
            self.delete_checkout_branch(repo)
        })
    }

    fn checkout(&self, id: &str) -> Result<(), ScmError> {
        let _guard = self
            .worktree_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.with_repo(|repo| {
            let head = repo.head()?.peel(git2::ObjectType::Commit)?;
            repo.reset(&head, ResetType::Hard, None)?;
            self.switch_to_main(repo)?;
            self.delete_checkout_branch(repo)?;

            let target = repo
                .revparse_single(id)
                .and_then(|object| object.peel_to_commit())
                .map_err(|_| ScmError::CommitNotFound(id.to_string()))?;
            repo.branch(CHECKOUT_BRANCH, &target, true)?;
            switch_branch(repo, CHECKOUT_BRANCH, &target)
        })
    }

    fn blame(
        &self,
        file: &str,
        commit: &str,
        prior_commit: bool,
    ) -> Result<Vec<BlamedLine>, ScmError> {
        let blame_err = |reason: String| ScmError::BlameFailed {
            file: file.to_string(),
            commit: commit.to_string(),
            reason,
        };

        self.with_repo(|repo| {
            let mut target = repo
                .revparse_single(commit)
                .and_then(|object| object.peel_to_commit())
                .map_err(|_| ScmError::CommitNotFound(commit.to_string()))?;
            if prior_commit {
                target = target
                    .parent(0)
                    .map_err(|_| blame_err("commit has no parent".to_string()))?;
            }

            let blob = target
                .tree()?
                .get_path(Path::new(file))
                .and_then(|entry| entry.to_object(repo))
                .and_then(|object| object.peel_to_blob())
                .map_err(|e| blame_err(e.message().to_string()))?;
            let content = String::from_utf8_lossy(blob.content()).into_owned();

            let mut opts = BlameOptions::new();
            opts.newest_commit(target.id());
            let blame = repo
                .blame_file(Path::new(file), Some(&mut opts))
                .map_err(|e| blame_err(e.message().to_string()))?;

            let mut lines = Vec::new();
            for (idx, line) in content.lines().enumerate() {
                let hunk = blame
                    .get_line(idx + 1)
                    .ok_or_else(|| blame_err(format!("no blame for line {}", idx + 1)))?;
                let commit_id = hunk.final_commit_id();
                let author = hunk.final_signature().name().unwrap_or("").to_string();
                let committer = repo
                    .find_commit(commit_id)
                    .map(|c| c.committer().name().unwrap_or("").to_string())
                    .unwrap_or_default();
                lines.push(BlamedLine {
                    line_number: idx,
                    line: line.to_string(),
                    author,
                    committer,
                    commit: commit_id.to_string(),
                });
            }
            Ok(lines)
        })
    }

    fn describe(&self) -> Result<RepositoryInfo, ScmError> {
        self.with_repo(|repo| {
            let head = repo.head()?.peel_to_commit()?.id();

            let mut revwalk = repo.revwalk()?;
            revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
            revwalk.push(head)?;
            let first = revwalk.next().transpose()?.unwrap_or(head);

            let origin = repo
                .config()
                .and_then(|config| config.get_string("remote.origin.url"))
                .unwrap_or_default();

            Ok(RepositoryInfo {
                origin,
                path: self.path.display().to_string(),
                head_commit: head.to_string(),
                first_commit: first.to_string(),
            })
        })
    }
}

fn open_repository(path: &Path) -> Result<Repository, ScmError> {
    Repository::open(path).map_err(|e| ScmError::OpenFailed {
        path: path.display().to_string(),
        reason: e.message().to_string(),
    })
}

/// Check out `tip` while HEAD still names the old branch, then move HEAD
fn switch_branch(repo: &Repository, branch: &str, tip: &git2::Commit<'_>) -> Result<(), ScmError> {
    repo.checkout_tree(tip.as_object(), Some(CheckoutBuilder::new().force()))?;
    repo.set_head(&format!("refs/heads/{}", branch))?;
    Ok(())
}

fn discover_main_branch(repo: &Repository) -> Option<String> {
    repo.head().ok()?.shorthand().map(|s| s.to_string())
}

fn developer(sig: &git2::Signature<'_>) -> Developer {
    Developer::new(sig.name().unwrap_or(""), sig.email().unwrap_or(""))
}

fn path_string(path: Option<&Path>) -> Option<String> {
    path.map(|p| p.to_string_lossy().into_owned())
}

fn modification_type(status: Delta) -> ModificationType {
    match status {
        Delta::Added | Delta::Untracked => ModificationType::Add,
        Delta::Deleted => ModificationType::Delete,
        Delta::Renamed => ModificationType::Rename,
        Delta::Copied => ModificationType::Copy,
        _ => ModificationType::Modify,
    }
}

/// Convert a libgit2 time into a timestamp carrying the recorded offset
pub(crate) fn to_datetime(time: &git2::Time) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60).unwrap_or_else(|| Utc.fix());
    offset
        .timestamp_opt(time.seconds(), 0)
        .single()
        .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH.with_timezone(&offset))
}
