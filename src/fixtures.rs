//! Test fixtures shared by unit tests: in-memory backend, recording visitor,
//! and a small builder for real git repositories on disk.

use crate::domain::{Branches, ChangeSet, Commit, Developer, Modification, ModificationType};
use crate::error::{ResourceExhausted, ScmError};
use crate::persistence::{PersistenceMechanism, Value};
use crate::scm::{BlamedLine, RepositoryFile, RepositoryInfo, Scm, ScmRepository};
use crate::visitor::CommitVisitor;
use chrono::{DateTime, FixedOffset, TimeZone};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub fn date(year: i32, month: u32, day: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(year, month, day, 12, 0, 0)
        .unwrap()
}

pub fn change_set(id: &str, year: i32, month: u32, day: u32) -> ChangeSet {
    ChangeSet::new(id, date(year, month, day))
}

pub fn commit(hash: &str, parents: &[&str]) -> Commit {
    let when = date(2015, 1, 1);
    Commit {
        hash: hash.to_string(),
        author: Developer::new("Mau", "mau@mau.com"),
        committer: Developer::new("Mau", "mau@mau.com"),
        author_date: when,
        committer_date: when,
        msg: "x".to_string(),
        parents: parents.iter().map(|p| p.to_string()).collect(),
        branches: Branches::Known(["master".to_string()].into()),
        in_main_branch: true,
        modifications: Vec::new(),
    }
}

/// A unified diff with the given number of added and removed lines
pub fn diff_with(added: usize, removed: usize) -> String {
    let mut diff = String::from("--- a/file\n+++ b/file\n@@ -1 +1 @@\n");
    for i in 0..removed {
        diff.push_str(&format!("-old line {}\n", i));
    }
    for i in 0..added {
        diff.push_str(&format!("+new line {}\n", i));
    }
    diff
}

pub fn modification(path: &str, kind: ModificationType, diff: &str) -> Modification {
    Modification::new(
        Some(path.to_string()),
        Some(path.to_string()),
        kind,
        diff,
        "",
    )
}

/// How [`MemoryScm`] answers `commit(id)`
#[derive(Clone)]
pub enum Materialize {
    Ok(Commit),
    TooLarge,
    Fails,
    Exhausted,
    Panics,
}

/// In-memory backend with scripted materialization outcomes
pub struct MemoryScm {
    pub change_sets: Vec<ChangeSet>,
    pub head: Option<ChangeSet>,
    pub commits: HashMap<String, Materialize>,
    pub materialized: AtomicUsize,
}

impl MemoryScm {
    pub fn new(change_sets: Vec<ChangeSet>) -> Self {
        let commits = change_sets
            .iter()
            .map(|cs| (cs.id.clone(), Materialize::Ok(commit(&cs.id, &["parent"]))))
            .collect();
        Self {
            head: change_sets.first().cloned(),
            change_sets,
            commits,
            materialized: AtomicUsize::new(0),
        }
    }

    /// Change sets with ids `1..=n`, newest first like git delivers them
    pub fn numbered(n: u32) -> Self {
        let change_sets = (1..=n)
            .rev()
            .map(|i| change_set(&i.to_string(), 2015, 1, i.min(28)))
            .collect();
        Self::new(change_sets)
    }

    pub fn with(mut self, id: &str, outcome: Materialize) -> Self {
        self.commits.insert(id.to_string(), outcome);
        self
    }
}

impl Scm for MemoryScm {
    fn change_sets(&self) -> Result<Vec<ChangeSet>, ScmError> {
        Ok(self.change_sets.clone())
    }

    fn commit(&self, id: &str) -> Result<Commit, ScmError> {
        self.materialized.fetch_add(1, Ordering::SeqCst);
        match self.commits.get(id) {
            Some(Materialize::Ok(c)) => Ok(c.clone()),
            Some(Materialize::TooLarge) => Err(ScmError::CommitTooLarge {
                id: id.to_string(),
                files: 10,
                max: 5,
            }),
            Some(Materialize::Fails) => Err(ScmError::Io(std::io::Error::other("disk hiccup"))),
            Some(Materialize::Exhausted) => {
                Err(ResourceExhausted(format!("materializing {}", id)).into())
            }
            Some(Materialize::Panics) => panic!("backend blew up on {}", id),
            None => Err(ScmError::CommitNotFound(id.to_string())),
        }
    }

    fn head(&self) -> Result<ChangeSet, ScmError> {
        self.head
            .clone()
            .ok_or_else(|| ScmError::CommitNotFound("HEAD".to_string()))
    }

    fn branches_containing(&self, _id: &str) -> Result<Branches, ScmError> {
        Ok(Branches::Omitted)
    }

    fn files(&self) -> Result<Vec<RepositoryFile>, ScmError> {
        Ok(Vec::new())
    }

    fn reset(&self) -> Result<(), ScmError> {
        Ok(())
    }

    fn checkout(&self, _id: &str) -> Result<(), ScmError> {
        Ok(())
    }

    fn blame(
        &self,
        _file: &str,
        _commit: &str,
        _prior_commit: bool,
    ) -> Result<Vec<BlamedLine>, ScmError> {
        Ok(Vec::new())
    }

    fn describe(&self) -> Result<RepositoryInfo, ScmError> {
        Ok(RepositoryInfo {
            origin: "memory://fixture".to_string(),
            path: "/tmp/fixture".to_string(),
            head_commit: self.head.as_ref().map(|h| h.id.clone()).unwrap_or_default(),
            first_commit: self
                .change_sets
                .last()
                .map(|cs| cs.id.clone())
                .unwrap_or_default(),
        })
    }
}

pub fn memory_repo(scm: MemoryScm) -> ScmRepository {
    ScmRepository::open(Arc::new(scm)).unwrap()
}

/// Records every lifecycle call; optionally fails on chosen hashes
#[derive(Default)]
pub struct RecordingVisitor {
    pub events: Mutex<Vec<String>>,
    pub processed: Mutex<Vec<String>>,
    pub fail_on: Vec<String>,
    pub exhaust_on: Vec<String>,
    pub write_rows: bool,
}

impl RecordingVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processed(&self) -> Vec<String> {
        self.processed.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl CommitVisitor for RecordingVisitor {
    fn initialize(&self, repo: &ScmRepository) -> anyhow::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("initialize {}", repo.head_commit()));
        Ok(())
    }

    fn process(
        &self,
        _repo: &ScmRepository,
        commit: &Commit,
        writer: &dyn PersistenceMechanism,
    ) -> anyhow::Result<()> {
        if self.exhaust_on.contains(&commit.hash) {
            return Err(ResourceExhausted(format!("visiting {}", commit.hash)).into());
        }
        if self.fail_on.contains(&commit.hash) {
            anyhow::bail!("visitor failed on {}", commit.hash);
        }
        self.processed.lock().unwrap().push(commit.hash.clone());
        if self.write_rows {
            writer.write(&[Value::from(commit.hash.as_str())])?;
        }
        Ok(())
    }

    fn finalize(&self, repo: &ScmRepository) -> anyhow::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("finalize {}", repo.head_commit()));
        Ok(())
    }

    fn name(&self) -> String {
        "RecordingVisitor".to_string()
    }
}

/// Sink that keeps rows in memory and counts close calls
#[derive(Default)]
pub struct MemorySink {
    pub rows: Mutex<Vec<Vec<String>>>,
    pub closes: AtomicUsize,
}

impl MemorySink {
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows.lock().unwrap().clone()
    }
}

impl PersistenceMechanism for MemorySink {
    fn write(&self, row: &[Value]) -> Result<(), crate::error::PersistenceError> {
        self.rows
            .lock()
            .unwrap()
            .push(row.iter().map(|v| v.to_string()).collect());
        Ok(())
    }

    fn close(&self) -> Result<(), crate::error::PersistenceError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Builds throwaway git repositories for backend tests
pub struct GitFixture {
    pub dir: TempDir,
    pub repo: git2::Repository,
    day: i64,
}

impl GitFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        Self { dir, repo, day: 0 }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, file: &str, content: &str) {
        let path = self.dir.path().join(file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn remove(&self, file: &str) {
        std::fs::remove_file(self.dir.path().join(file)).unwrap();
    }

    /// Stage everything and commit on HEAD; commits are one day apart
    pub fn commit(&mut self, message: &str) -> String {
        self.day += 1;
        let time = git2::Time::new(1_420_070_400 + self.day * 86_400, 60);
        let sig = git2::Signature::new("Mau", "mau@mau.com", &time).unwrap();

        let mut index = self.repo.index().unwrap();
        index
            .add_all(["*"], git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.update_all(["*"], None).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();

        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap();
        oid.to_string()
    }
}
