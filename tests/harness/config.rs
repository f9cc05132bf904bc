//! Config files feeding a full run.

use crate::common::*;
use lmdb_stress::{run_harness, Error, CONFIG_FILE_NAME};

#[test]
fn run_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join(CONFIG_FILE_NAME);
    config_in(&dir, 2, 5).write_to_file(&file).unwrap();

    let config = HarnessConfig::from_file(&file).unwrap();
    assert_eq!(config.path, env_path(&dir));
    let report = run_harness(&config).unwrap();
    assert_eq!(report.written, 10);
    assert!(report.is_clean());
}

#[test]
fn default_file_is_written_once() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join(CONFIG_FILE_NAME);

    HarnessConfig::write_default_if_missing(&file).unwrap();
    assert_eq!(HarnessConfig::from_file(&file).unwrap(), HarnessConfig::default());

    std::fs::write(&file, "loop_count = 3\n").unwrap();
    HarnessConfig::write_default_if_missing(&file).unwrap();
    assert_eq!(HarnessConfig::from_file(&file).unwrap().loop_count, 3);
}

#[test]
fn unaligned_map_size_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(&dir, 1, 1);
    config.map_size = TEST_MAP_SIZE + 1;

    let err = run_harness(&config).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)), "unexpected error: {}", err);
}

#[test]
fn too_small_map_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(&dir, 50, 100);
    config.map_size = 256 * 1024;

    let err = run_harness(&config).unwrap_err();
    assert!(err.is_engine(), "unexpected error: {}", err);
}
