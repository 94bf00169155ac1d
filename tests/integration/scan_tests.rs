use dupgroup::filters::resolve_all;
use dupgroup::grouping::{group_paths, Group, GroupingOptions};
use dupgroup::scanner::{default_conditions, RootSearch, WalkerConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn test_dir() -> TempDir {
    tempfile::Builder::new().prefix("scan").tempdir().unwrap()
}

fn write(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn scan(roots: &[PathBuf], config: &WalkerConfig, empty_file: bool) -> Vec<Group> {
    let search = RootSearch::new(roots, config).unwrap();
    group_paths(
        resolve_all(&["size", "md5"]).unwrap(),
        search.paths(),
        default_conditions(empty_file, false),
        GroupingOptions::default().with_min_group_size(2),
    )
    .unwrap()
    .0
}

fn names(group: &Group) -> Vec<String> {
    group
        .members
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_scan_finds_identical_files() {
    let dir = test_dir();
    write(dir.path(), "a.txt", b"identical");
    write(dir.path(), "b.txt", b"identical");
    write(dir.path(), "c.txt", b"different");
    write(dir.path(), "d.txt", b"Identical");

    let groups = scan(&[dir.path().to_path_buf()], &WalkerConfig::default(), false);

    assert_eq!(groups.len(), 1);
    assert_eq!(names(&groups[0]), vec!["a.txt", "b.txt"]);
    assert_eq!(groups[0].trail[0], "9");
    assert_eq!(groups[0].trail[1].len(), 32);
}

#[test]
fn test_scan_empty_directory() {
    let dir = test_dir();
    let groups = scan(&[dir.path().to_path_buf()], &WalkerConfig::default(), false);
    assert!(groups.is_empty());
}

#[test]
fn test_scan_is_shallow_unless_recursive() {
    let dir = test_dir();
    write(dir.path(), "top.txt", b"copy");
    write(dir.path(), "sub/nested.txt", b"copy");
    let roots = [dir.path().to_path_buf()];

    assert!(scan(&roots, &WalkerConfig::default(), false).is_empty());

    let config = WalkerConfig {
        recursive: true,
        ..WalkerConfig::default()
    };
    let groups = scan(&roots, &config, false);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
}

#[test]
fn test_scan_multiple_roots_in_order() {
    let first = test_dir();
    let second = test_dir();
    let b = write(second.path(), "b.txt", b"shared");
    let a = write(first.path(), "a.txt", b"shared");

    let groups = scan(
        &[first.path().to_path_buf(), second.path().to_path_buf()],
        &WalkerConfig::default(),
        false,
    );
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].members, vec![a, b]);
}

#[test]
fn test_scan_empty_files_need_opt_in() {
    let dir = test_dir();
    write(dir.path(), "e1", b"");
    write(dir.path(), "e2", b"");
    let roots = [dir.path().to_path_buf()];

    assert!(scan(&roots, &WalkerConfig::default(), false).is_empty());
    let groups = scan(&roots, &WalkerConfig::default(), true);
    assert_eq!(groups.len(), 1);
    assert_eq!(names(&groups[0]), vec!["e1", "e2"]);
}

#[test]
fn test_scan_include_exclude() {
    let dir = test_dir();
    write(dir.path(), "a.jpg", b"img");
    write(dir.path(), "b.jpg", b"img");
    write(dir.path(), "c.png", b"img");
    write(dir.path(), "skip.jpg", b"img");
    let config = WalkerConfig {
        include: vec!["*.jpg".into()],
        exclude: vec!["skip*".into()],
        ..WalkerConfig::default()
    };

    let groups = scan(&[dir.path().to_path_buf()], &config, false);
    assert_eq!(groups.len(), 1);
    assert_eq!(names(&groups[0]), vec!["a.jpg", "b.jpg"]);
}

#[test]
fn test_scan_hidden_files_are_opt_in() {
    let dir = test_dir();
    write(dir.path(), ".hidden", b"same");
    write(dir.path(), "shown", b"same");
    let roots = [dir.path().to_path_buf()];

    assert!(scan(&roots, &WalkerConfig::default(), false).is_empty());
    let config = WalkerConfig {
        follow_hidden: true,
        ..WalkerConfig::default()
    };
    assert_eq!(scan(&roots, &config, false).len(), 1);
}

#[test]
#[cfg(unix)]
fn test_scan_symlinks_excluded_by_default() {
    let dir = test_dir();
    let original = write(dir.path(), "original.txt", b"linked content");
    std::os::unix::fs::symlink(&original, dir.path().join("symlink.txt")).unwrap();

    let groups = scan(&[dir.path().to_path_buf()], &WalkerConfig::default(), false);
    assert!(groups.is_empty());
}
