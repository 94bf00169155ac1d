use dupgroup::cli::Cli;
use dupgroup::error::ExitCode;
use dupgroup::run_app;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn test_dir() -> TempDir {
    tempfile::Builder::new().prefix("cli").tempdir().unwrap()
}

fn run(args: &[&str]) -> anyhow::Result<ExitCode> {
    let mut full = vec!["dupgroup", "-q"];
    full.extend_from_slice(args);
    run_app(Cli::try_parse_ordered_from(full).unwrap())
}

fn arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn test_remove_permanent_deletes_duplicates() {
    let dir = test_dir();
    fs::write(dir.path().join("a"), "twin").unwrap();
    fs::write(dir.path().join("b"), "twin").unwrap();
    fs::write(dir.path().join("c"), "single").unwrap();

    let root = arg(dir.path());
    let code = run(&["--remove", "--permanent", &root]).unwrap();

    assert_eq!(code, ExitCode::Success);
    let remaining = fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(remaining, 2);
    assert!(dir.path().join("c").exists());
}

#[test]
fn test_unique_files_report_no_groups() {
    let dir = test_dir();
    fs::write(dir.path().join("a"), "one").unwrap();
    fs::write(dir.path().join("b"), "three").unwrap();

    let code = run(&[&arg(dir.path())]).unwrap();
    assert_eq!(code, ExitCode::NoGroups);
}

#[test]
fn test_recursive_flag_reaches_subdirectories() {
    let dir = test_dir();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("a"), "twin").unwrap();
    fs::write(dir.path().join("sub/b"), "twin").unwrap();

    let root = arg(dir.path());
    assert_eq!(run(&[&root]).unwrap(), ExitCode::NoGroups);
    assert_eq!(run(&["-r", &root]).unwrap(), ExitCode::Success);
}

#[test]
fn test_explicit_chain_and_json_output() {
    let dir = test_dir();
    fs::write(dir.path().join("a.txt"), "same").unwrap();
    fs::write(dir.path().join("b.txt"), "diff").unwrap();

    let root = arg(dir.path());
    let code = run(&["-f", "size", "-o", "json", &root]).unwrap();
    assert_eq!(code, ExitCode::Success);

    let code = run(&["-f", "size", "-f", "blake3", "-o", "csv", &root]).unwrap();
    assert_eq!(code, ExitCode::NoGroups);
}

#[test]
fn test_bad_filter_is_an_error() {
    let dir = test_dir();
    let err = run(&["-f", "sizes", &arg(dir.path())]).unwrap_err();
    assert!(format!("{:#}", err).contains("size"));
}

#[test]
fn test_missing_directory_is_an_error() {
    let dir = test_dir();
    let missing = dir.path().join("absent");
    assert!(run(&[&arg(&missing)]).is_err());
}

#[test]
fn test_merge_into_existing_directory_is_an_error() {
    let dir = test_dir();
    let target = test_dir();
    fs::write(dir.path().join("a"), "x").unwrap();

    let merge = arg(target.path());
    assert!(run(&["--merge", &merge, &arg(dir.path())]).is_err());
}

#[test]
fn test_dry_run_link_leaves_files() {
    let dir = test_dir();
    fs::write(dir.path().join("a"), "twin").unwrap();
    fs::write(dir.path().join("b"), "twin").unwrap();

    let code = run(&["--link", "--dry-run", &arg(dir.path())]).unwrap();
    assert_eq!(code, ExitCode::Success);

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let a = fs::metadata(dir.path().join("a")).unwrap().ino();
        let b = fs::metadata(dir.path().join("b")).unwrap().ino();
        assert_ne!(a, b);
    }
}
