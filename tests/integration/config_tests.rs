use dupgroup::config::{Config, ConfigError, ENV_PREFIX};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_load_explicit_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dupgroup.toml");
    fs::write(
        &path,
        r#"
filters = ["size:kb", "blake3"]
threshold = 3
follow_hidden = true
blank_check_len = 4
"#,
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.filters, vec!["size:kb", "blake3"]);
    assert_eq!(config.threshold, 3);
    assert!(config.follow_hidden);
    assert_eq!(config.blank_check_len, 4);
    assert!(!config.strict);
}

#[test]
fn test_load_missing_file() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.toml");
    let err = Config::load(Some(&missing)).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(_)));
    assert!(err.to_string().contains("missing.toml"));
}

#[test]
fn test_load_rejects_wrong_type() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "recursive = \"sometimes\"\n").unwrap();
    assert!(matches!(
        Config::load(Some(&path)),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_environment_overrides_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dupgroup.toml");
    fs::write(&path, "io_threads = 2\n").unwrap();

    figment::Jail::expect_with(|jail| {
        jail.set_env(format!("{ENV_PREFIX}IO_THREADS"), "6");
        let config: Config = Config::figment(Some(&path)).extract()?;
        assert_eq!(config.io_threads, 6);
        assert_eq!(config.threshold, 1);
        Ok(())
    });
}
