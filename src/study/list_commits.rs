use super::Study;
use crate::domain::Commit;
use crate::filter::{CommitFilter, CommitRange, Commits, OnlyNoMerge};
use crate::mining::{MiningReport, RepositoryMining};
use crate::persistence::{CsvFile, PersistenceMechanism, Value};
use crate::scm::{GitRepository, GitSettings, ScmRepository};
use crate::visitor::CommitVisitor;
use anyhow::Context;
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Columns written by [`ListCommitsVisitor`]
pub const CSV_HEADER: [&str; 8] = [
    "Hash",
    "FilesModified",
    "LinesAdded",
    "LinesRemoved",
    "LinesDelta",
    "Message",
    "Filenames",
    "Branches",
];

const PROGRESS_EVERY: usize = 1000;

/// Line and file totals of one commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitStats {
    pub lines_added: usize,
    pub lines_removed: usize,
    /// Distinct touched files in modification order
    pub files_modified: Vec<String>,
}

impl CommitStats {
    pub fn from_commit(commit: &Commit) -> Self {
        let mut stats = Self::default();
        for m in &commit.modifications {
            stats.lines_added += m.added();
            stats.lines_removed += m.removed();
            if let Some(name) = m.file_name()
                && !stats.files_modified.iter().any(|f| f == name)
            {
                stats.files_modified.push(name.to_string());
            }
        }
        stats
    }

    pub fn lines_delta(&self) -> i64 {
        self.lines_added as i64 - self.lines_removed as i64
    }
}

/// Writes one row per commit with a non-empty message
pub struct ListCommitsVisitor {
    hg_import: Regex,
    csv_problem_chars: Regex,
    whitespace: Regex,
    commit_count: AtomicUsize,
}

impl ListCommitsVisitor {
    pub fn new() -> Self {
        Self {
            hg_import: Regex::new(r"(?m)^--HG--.*$|^branch :.*$|^extra :.*$")
                .expect("valid regex"),
            csv_problem_chars: Regex::new(r#"["'\n\r,]"#).expect("valid regex"),
            whitespace: Regex::new(r"\s+").expect("valid regex"),
            commit_count: AtomicUsize::new(0),
        }
    }

    /// Commits seen so far, including skipped ones
    pub fn commit_count(&self) -> usize {
        self.commit_count.load(Ordering::Relaxed)
    }

    /// Replace characters that upset naive CSV readers with spaces
    pub fn remove_special_csv_chars(&self, text: &str) -> String {
        self.csv_problem_chars.replace_all(text, " ").into_owned()
    }

    /// Drop Mercurial import lines, CSV-problem characters and extra whitespace
    pub fn clean_message(&self, msg: &str) -> String {
        let without_hg = self.hg_import.replace_all(msg, "");
        let plain = self.remove_special_csv_chars(&without_hg);
        self.whitespace.replace_all(&plain, " ").trim().to_string()
    }

    fn join_cleaned<'a>(&self, items: impl Iterator<Item = &'a str>) -> String {
        items
            .map(|item| self.remove_special_csv_chars(item))
            .collect::<Vec<_>>()
            .join(":")
    }

    /// The CSV row for `commit` given its cleaned message
    pub fn row(&self, commit: &Commit, clean_msg: &str) -> Vec<Value> {
        let stats = CommitStats::from_commit(commit);
        vec![
            Value::from(commit.hash.as_str()),
            Value::from(commit.modifications.len()),
            Value::from(stats.lines_added),
            Value::from(stats.lines_removed),
            Value::from(stats.lines_delta()),
            Value::from(clean_msg),
            Value::from(self.join_cleaned(stats.files_modified.iter().map(String::as_str))),
            Value::from(self.join_cleaned(commit.branches.names().into_iter())),
        ]
    }
}

impl Default for ListCommitsVisitor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitVisitor for ListCommitsVisitor {
    fn process(
        &self,
        _repo: &ScmRepository,
        commit: &Commit,
        writer: &dyn PersistenceMechanism,
    ) -> anyhow::Result<()> {
        let count = self.commit_count.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!("Commit {}", count);

        let clean_msg = self.clean_message(&commit.msg);
        let result = if clean_msg.is_empty() {
            tracing::warn!("Empty commit message, discarding commit {}", commit.hash);
            Ok(())
        } else {
            writer
                .write(&self.row(commit, &clean_msg))
                .with_context(|| format!("Failed to write row for {}", commit.hash))
        };

        if count % PROGRESS_EVERY == 0 {
            tracing::info!("Processed {} commits.", count);
        }
        result
    }

    fn name(&self) -> String {
        "ListCommitsVisitor".to_string()
    }
}

/// Lists every commit of one local repository into a CSV file
pub struct ListCommits {
    pub repo_dir: PathBuf,
    pub output: PathBuf,
    pub settings: GitSettings,
    pub range: Arc<dyn CommitRange>,
    pub threads: usize,
    pub no_merges: bool,
    pub reverse_order: bool,
}

impl ListCommits {
    pub fn new(repo_dir: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            output: output.into(),
            settings: GitSettings::default(),
            range: Commits::all(),
            threads: 1,
            no_merges: false,
            reverse_order: false,
        }
    }

    /// Run the study and return the mining report
    pub fn run(&self) -> anyhow::Result<MiningReport> {
        let repo = GitRepository::open(&self.repo_dir, self.settings.clone())
            .with_context(|| format!("Failed to open {}", self.repo_dir.display()))?;
        let writer = Arc::new(
            CsvFile::with_header(&self.output, &CSV_HEADER)
                .with_context(|| format!("Failed to create {}", self.output.display()))?,
        );

        let mut filters: Vec<Arc<dyn CommitFilter>> = Vec::new();
        if self.no_merges {
            filters.push(Arc::new(OnlyNoMerge));
        }

        let mut mining = RepositoryMining::new()
            .in_repo(repo)
            .through(Arc::clone(&self.range))
            .filters(filters)
            .with_threads(self.threads)
            .process(Arc::new(ListCommitsVisitor::new()), writer);
        if self.reverse_order {
            mining = mining.reverse_order();
        }

        Ok(mining.mine()?)
    }
}

impl Study for ListCommits {
    fn execute(&self) -> anyhow::Result<()> {
        let report = self.run()?;
        tracing::info!(
            "Listed {} of {} selected commits into {}",
            report.processed(),
            report.selected(),
            self.output.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Branches, Modification, ModificationType};
    use crate::fixtures::{
        GitFixture, MemoryScm, MemorySink, commit, diff_with, memory_repo, modification,
    };

    #[test]
    fn test_clean_message() {
        let visitor = ListCommitsVisitor::new();
        let msg = "Fix \"quoted\", it's done\n--HG--\nbranch : stable\nextra : rebase_source\n\n  trailing\r\n";
        assert_eq!(visitor.clean_message(msg), "Fix quoted it s done trailing");
        assert_eq!(visitor.clean_message("--HG--\nbranch : x"), "");
        assert_eq!(visitor.clean_message("   "), "");
    }

    #[test]
    fn test_commit_stats() {
        let mut c = commit("abc", &["p"]);
        c.modifications = vec![
            modification("src/A.java", ModificationType::Add, &diff_with(62, 0)),
            modification("src/B.java", ModificationType::Modify, &diff_with(1, 1)),
            Modification::new(
                Some("src/A.java".to_string()),
                Some("/dev/null".to_string()),
                ModificationType::Delete,
                "",
                "",
            ),
        ];

        let stats = CommitStats::from_commit(&c);
        assert_eq!(stats.lines_added, 63);
        assert_eq!(stats.lines_removed, 1);
        assert_eq!(stats.lines_delta(), 62);
        assert_eq!(stats.files_modified, vec!["src/A.java", "src/B.java"]);
    }

    #[test]
    fn test_row_layout() {
        let visitor = ListCommitsVisitor::new();
        let mut c = commit("abc", &["p"]);
        c.modifications = vec![
            modification("a,b.txt", ModificationType::Modify, &diff_with(2, 3)),
            modification("c.txt", ModificationType::Add, &diff_with(1, 0)),
        ];
        c.branches = Branches::Known(["dev".to_string(), "master".to_string()].into());

        let row: Vec<String> = visitor
            .row(&c, "clean msg")
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(row.len(), CSV_HEADER.len());
        assert_eq!(
            row,
            vec!["abc", "2", "3", "3", "0", "clean msg", "a b.txt:c.txt", "dev:master"]
        );
    }

    #[test]
    fn test_omitted_branches_column() {
        let visitor = ListCommitsVisitor::new();
        let mut c = commit("abc", &["p"]);
        c.branches = Branches::Omitted;
        let row = visitor.row(&c, "m");
        assert_eq!(row[7].to_string(), Branches::OMITTED_MARKER);
    }

    #[test]
    fn test_empty_message_is_skipped() {
        let repo = memory_repo(MemoryScm::numbered(1));
        let visitor = ListCommitsVisitor::new();
        let sink = MemorySink::default();

        let mut empty = commit("abc", &["p"]);
        empty.msg = "--HG--".to_string();
        visitor.process(&repo, &empty, &sink).unwrap();
        visitor.process(&repo, &commit("def", &["p"]), &sink).unwrap();

        assert_eq!(visitor.commit_count(), 2);
        let rows = sink.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], "def");
    }

    #[test]
    fn test_write_failure_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let csv = CsvFile::with_header(dir.path().join("out.csv"), &CSV_HEADER).unwrap();
        csv.close().unwrap();

        let repo = memory_repo(MemoryScm::numbered(1));
        let visitor = ListCommitsVisitor::new();
        let err = visitor.process(&repo, &commit("abc", &["p"]), &csv).unwrap_err();
        assert!(format!("{:#}", err).contains("abc"));
    }

    #[test]
    fn test_list_commits_study() {
        let mut fx = GitFixture::new();
        fx.write("a.txt", "one\n");
        let first = fx.commit("first, with comma");
        fx.write("a.txt", "one\ntwo\n");
        let second = fx.commit("second");

        let out_dir = tempfile::TempDir::new().unwrap();
        let output = out_dir.path().join("commits.csv");
        let study = ListCommits::new(fx.path(), &output);
        study.execute().unwrap();

        let content = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], CSV_HEADER.join(","));
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with(&format!("{},1,1,0,1,first with comma,a.txt,", first)));
        assert!(lines[2].starts_with(&format!("{},1,1,0,1,second,a.txt,", second)));
    }
}
