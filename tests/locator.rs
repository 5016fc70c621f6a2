//! File search integration tests

use jarvis_voice::Error;
use jarvis_voice::locator::FileLocator;

mod common;
use common::write_file;

#[test]
fn test_finds_single_match_across_tree() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "finance/budget_2024.csv", b"a,b");
    write_file(dir.path(), "finance/taxes.pdf", b"%PDF");
    write_file(dir.path(), "notes.txt", b"x");

    let locator = FileLocator::new(vec![dir.path().to_path_buf()], 5, None).unwrap();
    let results = locator.search("budget", 5);

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].file_name().unwrap(), "budget_2024.csv");
    assert!(results[0].is_absolute());
}

#[test]
fn test_match_is_case_insensitive_substring() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "Quarterly-REPORT.docx", b"x");

    let locator = FileLocator::new(vec![dir.path().to_path_buf()], 5, None).unwrap();
    assert_eq!(locator.search("report", 5).len(), 1);
    assert_eq!(locator.search("  QUARTERLY ", 5).len(), 1);
}

#[test]
fn test_directories_are_not_results() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("budget")).unwrap();

    let locator = FileLocator::new(vec![dir.path().to_path_buf()], 5, None).unwrap();
    assert!(locator.search("budget", 5).is_empty());
}

#[test]
fn test_results_capped_by_config_and_limit() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..10 {
        write_file(dir.path(), &format!("log_{i}.txt"), b"x");
    }

    let locator = FileLocator::new(vec![dir.path().to_path_buf()], 3, None).unwrap();
    assert_eq!(locator.search("log", 100).len(), 3);
    assert_eq!(locator.search("log", 1).len(), 1);
}

#[test]
fn test_roots_searched_in_order() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    write_file(first.path(), "plan_a.md", b"x");
    write_file(second.path(), "plan_b.md", b"x");

    let locator = FileLocator::new(
        vec![first.path().to_path_buf(), second.path().to_path_buf()],
        5,
        None,
    )
    .unwrap();

    let results = locator.search("plan", 1);
    assert_eq!(results.len(), 1);
    assert!(results[0].starts_with(first.path()));
    assert_eq!(locator.search("plan", 5).len(), 2);
}

#[test]
fn test_missing_root_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "resume.pdf", b"%PDF");

    let locator = FileLocator::new(
        vec![dir.path().join("does-not-exist"), dir.path().to_path_buf()],
        5,
        None,
    )
    .unwrap();
    assert_eq!(locator.search("resume", 5).len(), 1);
}

#[test]
fn test_zero_max_results_rejected() {
    let err = FileLocator::new(vec![".".into()], 0, None).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn test_search_async_matches_sync() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "budget_2024.csv", b"a,b");

    let locator = FileLocator::new(vec![dir.path().to_path_buf()], 5, None).unwrap();
    assert_eq!(locator.search_async("budget", 5).await, locator.search("budget", 5));
}
