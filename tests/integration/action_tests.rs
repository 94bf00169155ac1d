use dupgroup::actions::{
    ActionError, ExecAction, GroupAction, LinkAction, MergeAction, MergeSpec, RemoveAction,
};
use dupgroup::filters::resolve_all;
use dupgroup::grouping::{group_paths, Group, GroupingOptions};
use dupgroup::output::RunSummary;
use dupgroup::scanner::{default_conditions, RootSearch, WalkerConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn test_dir() -> TempDir {
    tempfile::Builder::new().prefix("act").tempdir().unwrap()
}

fn write(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn duplicate_groups(dir: &Path) -> Vec<Group> {
    let search = RootSearch::new(&[dir.to_path_buf()], &WalkerConfig::default()).unwrap();
    group_paths(
        resolve_all(&["size", "md5"]).unwrap(),
        search.paths(),
        default_conditions(false, false),
        GroupingOptions::default().with_min_group_size(2),
    )
    .unwrap()
    .0
}

fn run(action: &mut dyn GroupAction, groups: &[Group]) {
    let mut summary = RunSummary::default();
    for group in groups {
        summary.record_group(group);
        action.apply(group).unwrap();
    }
    action.finish(&summary).unwrap();
}

#[test]
#[cfg(unix)]
fn test_link_then_regroup_by_inode() {
    use std::os::unix::fs::MetadataExt;

    let dir = test_dir();
    let a = write(dir.path(), "a", b"payload");
    let b = write(dir.path(), "b", b"payload");
    let c = write(dir.path(), "c", b"payload");
    write(dir.path(), "d", b"unique!");

    let groups = duplicate_groups(dir.path());
    assert_eq!(groups.len(), 1);
    let mut action = LinkAction::new();
    run(&mut action, &groups);

    assert_eq!(action.linked(), 2);
    let inode = fs::metadata(&a).unwrap().ino();
    assert_eq!(fs::metadata(&b).unwrap().ino(), inode);
    assert_eq!(fs::metadata(&c).unwrap().ino(), inode);
    assert_eq!(fs::read(&c).unwrap(), b"payload");

    // a second pass finds nothing left to link
    let mut again = LinkAction::new();
    run(&mut again, &duplicate_groups(dir.path()));
    assert_eq!(again.linked(), 0);
}

#[test]
fn test_remove_keeps_one_copy_per_group() {
    let dir = test_dir();
    let a = write(dir.path(), "a", b"first");
    let b = write(dir.path(), "b", b"first");
    let c = write(dir.path(), "c", b"other content");
    let d = write(dir.path(), "d", b"other content");

    let mut action = RemoveAction::new().with_permanent(true);
    run(&mut action, &duplicate_groups(dir.path()));

    assert!(a.exists());
    assert!(!b.exists());
    assert!(c.exists());
    assert!(!d.exists());
    assert_eq!(action.removed(), 2);
    assert_eq!(action.bytes_freed(), 5 + 13);
    assert!(duplicate_groups(dir.path()).is_empty());
}

#[test]
fn test_merge_builds_signature_tree() {
    let src = test_dir();
    let out = test_dir();
    write(src.path(), "a.txt", b"12345");
    write(src.path(), "b.txt", b"12345");
    write(src.path(), "c.txt", b"abc");

    let groups = group_paths(
        resolve_all(&["size"]).unwrap(),
        vec![
            src.path().join("a.txt"),
            src.path().join("b.txt"),
            src.path().join("c.txt"),
        ],
        Vec::new(),
        GroupingOptions::default(),
    )
    .unwrap()
    .0;

    let target = out.path().join("merged");
    let mut action = MergeAction::new(MergeSpec::parse(&target.to_string_lossy()).unwrap()).unwrap();
    run(&mut action, &groups);

    assert_eq!(fs::read(target.join("5/a.txt")).unwrap(), b"12345");
    assert_eq!(fs::read(target.join("5/b.txt")).unwrap(), b"12345");
    assert_eq!(fs::read(target.join("3/c.txt")).unwrap(), b"abc");
    assert!(src.path().join("a.txt").exists());
    assert_eq!(action.copied(), 3);
}

#[test]
fn test_merge_count_policy_renames_clashes() {
    let src = test_dir();
    let out = test_dir();
    fs::create_dir(src.path().join("x")).unwrap();
    fs::create_dir(src.path().join("y")).unwrap();
    let first = write(&src.path().join("x"), "photo.jpg", b"same");
    let second = write(&src.path().join("y"), "photo.jpg", b"same");

    let group = Group::new(vec![first, second], vec!["4".into()]);
    let target = out.path().join("merged");
    let spec = MergeSpec::parse(&format!("{}:COUNT", target.display())).unwrap();
    let mut action = MergeAction::new(spec).unwrap();
    run(&mut action, &[group]);

    assert!(target.join("4/photo.jpg").exists());
    assert!(target.join("4/photo_0001.jpg").exists());
}

#[test]
fn test_merge_error_policy_stops() {
    let src = test_dir();
    let out = test_dir();
    fs::create_dir(src.path().join("x")).unwrap();
    fs::create_dir(src.path().join("y")).unwrap();
    let first = write(&src.path().join("x"), "same.txt", b"1");
    let second = write(&src.path().join("y"), "same.txt", b"1");

    let group = Group::new(vec![first, second], vec!["1".into()]);
    let target = out.path().join("merged");
    let spec = MergeSpec::parse(&format!("{}:ERROR", target.display())).unwrap();
    let mut action = MergeAction::new(spec).unwrap();

    assert!(matches!(
        action.apply(&group),
        Err(ActionError::MergeConflict(_))
    ));
}

#[test]
fn test_merge_refuses_existing_directory() {
    let out = test_dir();
    let spec = MergeSpec::parse(&out.path().to_string_lossy()).unwrap();
    assert!(matches!(
        MergeAction::new(spec),
        Err(ActionError::MergeTargetExists(_))
    ));
}

#[test]
#[cfg(unix)]
fn test_exec_sees_signatures() {
    let dir = test_dir();
    write(dir.path(), "a", b"xy");
    write(dir.path(), "b", b"xy");

    let groups = duplicate_groups(dir.path());
    let mut action = ExecAction::new("echo {f1} {/}", 2, Vec::new()).unwrap();
    run(&mut action, &groups);

    assert_eq!(action.runs(), 2);
    let output = String::from_utf8(action.into_inner()).unwrap();
    assert_eq!(output, "2 a\n2 b\n");
}
