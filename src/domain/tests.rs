use super::*;
use crate::fixtures::{commit, diff_with, modification};

#[test]
fn test_is_merge_follows_parent_count() {
    assert!(!commit("root", &[]).is_merge());
    assert!(!commit("c1", &["root"]).is_merge());
    assert!(commit("m1", &["a", "b"]).is_merge());
    assert!(commit("m2", &["a", "b", "c"]).is_merge());
}

#[test]
fn test_parent_of_root_is_empty() {
    assert_eq!(commit("root", &[]).parent(), "");
    assert_eq!(commit("c1", &["p1", "p2"]).parent(), "p1");
}

#[test]
fn test_commit_equality_is_by_hash() {
    let a = commit("abc", &[]);
    let mut b = commit("abc", &["x"]);
    b.msg = "different".to_string();
    assert_eq!(a, b);
    assert_ne!(a, commit("def", &[]));
}

#[test]
fn test_added_and_removed_skip_headers() {
    let diff = "diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1,2 +1,2 @@\n-old\n+new\n+more\n context\n";
    let m = Modification::new(
        Some("f".to_string()),
        Some("f".to_string()),
        ModificationType::Modify,
        diff,
        "",
    );
    assert_eq!(m.added(), 2);
    assert_eq!(m.removed(), 1);
}

#[test]
fn test_truncated_diff_counts_nothing() {
    let m = Modification::new(
        Some("f".to_string()),
        Some("f".to_string()),
        ModificationType::Modify,
        DIFF_TOO_BIG,
        "",
    );
    assert!(m.is_diff_truncated());
    assert_eq!(m.added(), 0);
    assert_eq!(m.removed(), 0);
}

#[test]
fn test_commit_line_totals() {
    let mut c = commit("abc", &["p"]);
    c.modifications = vec![
        modification("a.c", ModificationType::Add, &diff_with(62, 0)),
        modification("b.c", ModificationType::Modify, &diff_with(1, 1)),
    ];
    assert_eq!(c.lines_added(), 63);
    assert_eq!(c.lines_removed(), 1);
}

#[test]
fn test_file_name_falls_back_to_old_path_for_dev_null() {
    let deleted = Modification::new(
        Some("gone.c".to_string()),
        Some(DEV_NULL.to_string()),
        ModificationType::Delete,
        "",
        "",
    );
    assert_eq!(deleted.file_name(), Some("gone.c"));

    let deleted_none = Modification::new(
        Some("gone.c".to_string()),
        None,
        ModificationType::Delete,
        "",
        "",
    );
    assert_eq!(deleted_none.file_name(), Some("gone.c"));

    let renamed = Modification::new(
        Some("old.c".to_string()),
        Some("new.c".to_string()),
        ModificationType::Rename,
        "",
        "",
    );
    assert_eq!(renamed.file_name(), Some("new.c"));
}

#[test]
fn test_file_name_none_when_both_sides_missing() {
    let m = Modification::new(
        Some(DEV_NULL.to_string()),
        None,
        ModificationType::Modify,
        "",
        "",
    );
    assert_eq!(m.file_name(), None);
}

#[test]
fn test_branches_names_and_contains() {
    let known = Branches::Known(["master".to_string(), "dev".to_string()].into());
    assert!(known.contains("master"));
    assert!(!known.contains("feature"));
    assert_eq!(known.names(), vec!["dev", "master"]);

    let omitted = Branches::Omitted;
    assert!(!omitted.contains("master"));
    assert_eq!(omitted.names(), vec![Branches::OMITTED_MARKER]);
}

#[test]
fn test_developer_equality_uses_both_fields() {
    let a = Developer::new("Mau", "mau@mau.com");
    assert_eq!(a, Developer::new("Mau", "mau@mau.com"));
    assert_ne!(a, Developer::new("Mau", "other@mau.com"));
    assert_eq!(a.to_string(), "Mau <mau@mau.com>");
}

#[test]
fn test_modification_type_display() {
    assert_eq!(ModificationType::Rename.to_string(), "RENAME");
    assert_eq!(ModificationType::Add.to_string(), "ADD");
}
