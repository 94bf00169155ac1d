use dupgroup::filters::{resolve_all, FilterSpec, FilterSpecError};
use dupgroup::grouping::{group_paths, Group, GroupingOptions};
use chrono::{Local, TimeZone};
use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn group(specs: &[&str], paths: &[PathBuf]) -> Vec<Group> {
    group_paths(
        resolve_all(specs).unwrap(),
        paths.to_vec(),
        Vec::new(),
        GroupingOptions::default(),
    )
    .unwrap()
    .0
}

fn member_names(groups: &[Group]) -> Vec<Vec<String>> {
    groups
        .iter()
        .map(|g| {
            g.members
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect()
        })
        .collect()
}

#[test]
fn test_size_units_coarsen_groups() {
    let dir = TempDir::new().unwrap();
    let a = write(&dir, "a", &vec![b'a'; 1_000]);
    let b = write(&dir, "b", &vec![b'b'; 1_200]);
    let c = write(&dir, "c", &vec![b'c'; 5_000]);
    let paths = [a, b, c];

    assert_eq!(group(&["size"], &paths).len(), 3);
    let by_kb = group(&["size:kb"], &paths);
    assert_eq!(member_names(&by_kb), vec![vec!["a", "b"], vec!["c"]]);
    assert_eq!(by_kb[0].trail, vec!["1KB"]);
}

#[test]
fn test_modified_day_groups_same_day() {
    let dir = TempDir::new().unwrap();
    let morning = write(&dir, "morning", b"1");
    let evening = write(&dir, "evening", b"2");
    let next_day = write(&dir, "next_day", b"3");

    let local = |day, hour| {
        Local
            .with_ymd_and_hms(2021, 3, day, hour, 0, 0)
            .single()
            .unwrap()
            .timestamp()
    };
    set_file_mtime(&morning, FileTime::from_unix_time(local(17, 9), 0)).unwrap();
    set_file_mtime(&evening, FileTime::from_unix_time(local(17, 18), 0)).unwrap();
    set_file_mtime(&next_day, FileTime::from_unix_time(local(18, 9), 0)).unwrap();

    let groups = group(&["modified:day"], &[morning, evening, next_day]);
    assert_eq!(
        member_names(&groups),
        vec![vec!["morning", "evening"], vec!["next_day"]]
    );
    assert_eq!(groups[0].trail, vec!["2021-03-17_00:00:00"]);

    let by_second = group(&["modified"], &[dir.path().join("morning"), dir.path().join("evening")]);
    assert_eq!(by_second.len(), 2);
}

#[test]
fn test_filename_regex_groups_by_capture() {
    let dir = TempDir::new().unwrap();
    let paths = [
        write(&dir, "IMG_001-edit.jpg", b"x"),
        write(&dir, "IMG_002.jpg", b"y"),
        write(&dir, "IMG_001.jpg", b"z"),
    ];

    let groups = group(&[r"filename:IMG_(\d+)"], &paths);
    assert_eq!(
        member_names(&groups),
        vec![vec!["IMG_001-edit.jpg", "IMG_001.jpg"], vec!["IMG_002.jpg"]]
    );
    assert_eq!(groups[0].trail, vec!["001"]);
}

#[test]
fn test_regex_spec_on_full_path() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("2020")).unwrap();
    fs::create_dir(dir.path().join("2021")).unwrap();
    let a = dir.path().join("2020/a");
    let b = dir.path().join("2020/b");
    let c = dir.path().join("2021/c");
    for p in [&a, &b, &c] {
        fs::write(p, b"x").unwrap();
    }

    let filter = FilterSpec::Regex(r"/(20\d\d)/".into()).resolve().unwrap();
    let (groups, _) =
        group_paths(vec![filter], vec![a, b, c], Vec::new(), GroupingOptions::default()).unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].trail, vec!["2020"]);
    assert_eq!(groups[1].trail, vec!["2021"]);
}

#[test]
fn test_content_filters_agree() {
    let dir = TempDir::new().unwrap();
    let paths = [
        write(&dir, "a", b"same bytes"),
        write(&dir, "b", b"same bytes"),
        write(&dir, "c", b"other byte"),
    ];

    let expected = vec![vec!["a", "b"], vec!["c"]];
    for spec in ["md5", "partial_md5", "sha", "sha:512", "blake3", "file"] {
        let groups = group(&["size", spec], &paths);
        assert_eq!(member_names(&groups), expected, "filter {spec}");
    }
}

#[test]
#[cfg(unix)]
fn test_shell_filter_signature() {
    let dir = TempDir::new().unwrap();
    let paths = [
        write(&dir, "a", b"one\ntwo\n"),
        write(&dir, "b", b"1\n2\n"),
        write(&dir, "c", b"single\n"),
    ];

    let groups = group(&["wc -l < {}"], &paths);
    assert_eq!(member_names(&groups), vec![vec!["a", "b"], vec!["c"]]);
    assert_eq!(groups[0].trail, vec!["2"]);
}

#[test]
fn test_invalid_specs_are_rejected_up_front() {
    assert!(matches!(
        resolve_all(&["size:parsecs"]),
        Err(FilterSpecError::InvalidModifier { .. })
    ));
    assert!(matches!(
        resolve_all(&["md5:fast"]),
        Err(FilterSpecError::UnexpectedModifier("md5"))
    ));
    match resolve_all(&["blake"]) {
        Err(FilterSpecError::UnknownFilter { suggestion, .. }) => {
            assert_eq!(suggestion.as_deref(), Some("blake3"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_missing_file_fails_filter() {
    let filters = resolve_all(&["size"]).unwrap();
    assert!(filters[0].apply(Path::new("/definitely/not/here")).is_err());
}
