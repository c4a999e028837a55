use std::fs;
use std::path::Path;

use bondlake::domain::source::SourceKind;
use bondlake::error::{ConfigError, Error};
use bondlake::infrastructure::config::settings::Config;
use bondlake::testkit::config;
use tempfile::TempDir;

#[test]
fn example_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.example.toml");
    let config = Config::load(&path).expect("example config loads");
    assert_eq!(config.sources.enabled(), SourceKind::ALL.to_vec());
    assert_eq!(
        config.pipeline.batch_policy(config.sources.get(SourceKind::Runs).unwrap().batch_size).batch_size,
        5000
    );
    assert!(config.analytics.pairwise.enabled);
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = TempDir::new().unwrap();
    match Config::load(dir.path().join("absent.toml")) {
        Err(Error::Config(ConfigError::ReadFile(_))) => {}
        other => panic!("expected read error, got {other:?}"),
    }
}

#[test]
fn generated_toml_matches_the_in_code_workspace() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, config::workspace_toml(dir.path())).unwrap();

    let loaded = Config::load(&path).unwrap();
    let built = config::workspace(dir.path());
    assert_eq!(loaded.database, built.database);
    assert_eq!(loaded.state_dir, built.state_dir);
    for kind in SourceKind::ALL {
        assert_eq!(
            loaded.sources.get(kind).unwrap().input_dir,
            built.sources.get(kind).unwrap().input_dir
        );
    }
}

#[test]
fn empty_source_directory_is_rejected() {
    let err = Config::parse_toml("[sources.runs]\ninput_dir = \"\"\n").unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::MissingField { field: "input_dir" })
    ));
}

#[test]
fn source_section_requires_an_input_dir() {
    assert!(matches!(
        Config::parse_toml("[sources.universe]\nenabled = true\n"),
        Err(Error::Config(ConfigError::Parse(_)))
    ));
}

#[test]
fn zero_batch_size_is_rejected() {
    let err = Config::parse_toml("[pipeline]\nbatch_size = 0\n").unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::InvalidValue { field: "batch_size", .. })
    ));
}

#[test]
fn unknown_log_format_is_rejected() {
    let err = Config::parse_toml("[logging]\nformat = \"xml\"\n").unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::InvalidValue { field: "logging.format", .. })
    ));
}
