//! Rewind log: equivalence with plain runs and replay after a crash.

use crate::common::*;
use lmdb_stress::{run_with_keys, LogEntry, SequentialKeys, REWIND_DIR};

#[test]
fn rewind_on_and_off_verify_identically() {
    let plain_dir = tempfile::tempdir().unwrap();
    let rewind_dir = tempfile::tempdir().unwrap();
    let plain = config_in(&plain_dir, 3, 7);
    let rewind = lmdb_stress::HarnessConfig {
        enable_rewind: true,
        ..config_in(&rewind_dir, 3, 7)
    };

    let a = run_with_keys(&plain, SequentialKeys::new()).unwrap();
    let b = run_with_keys(&rewind, SequentialKeys::new()).unwrap();

    assert_eq!(a.verification, b.verification);
    assert_eq!(a.records_stored, b.records_stored);
    assert!(!a.rewind_enabled);
    assert!(b.rewind_enabled);
    assert!(env_path(&rewind_dir).join(REWIND_DIR).is_dir());
    assert!(!env_path(&plain_dir).join(REWIND_DIR).exists());
}

#[test]
fn durable_entries_leave_the_journal() {
    let t = TestEnv::with_rewind(true);
    for i in 0..4 {
        t.put(&encode_key(1, i), b"x");
    }
    let log = t.env.rewind_log().unwrap();
    assert!(log.is_empty().unwrap());
    assert_eq!(log.current_sequence(), 4);
    assert_eq!(log.last_durable_sequence().unwrap(), 4);
}

#[test]
fn repeated_runs_on_one_path_keep_the_journal_empty() {
    let dir = tempfile::tempdir().unwrap();
    let config = lmdb_stress::HarnessConfig {
        enable_rewind: true,
        ..config_in(&dir, 4, 10)
    };
    for _ in 0..3 {
        assert!(run_with_keys(&config, SequentialKeys::new()).unwrap().is_clean());
    }

    let env = options(&env_path(&dir)).enable_rewind(true).open().unwrap();
    let log = env.rewind_log().unwrap();
    assert!(log.is_empty().unwrap());
    assert_eq!(log.last_durable_sequence().unwrap(), 120);
}

#[test]
fn interrupted_commit_is_replayed_on_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = env_path(&dir);
    let lost = encode_key(9, 1);
    let lost_value = Origin::new(5, 5).expected_value();
    {
        let t_env = options(&path).enable_rewind(true).open().unwrap();
        let db = t_env.open_root_database().unwrap();
        assert_eq!(t_env.record_count(db).unwrap(), 0);
        // Journal committed but the main transaction never was.
        t_env
            .rewind_log()
            .unwrap()
            .append(&[LogEntry::new(&lost, lost_value.as_bytes())])
            .unwrap();
    }

    let env = options(&path).enable_rewind(true).open().unwrap();
    let db = env.open_root_database().unwrap();
    let stored = env
        .view(|txn| Ok(db.get(txn, &lost)?.map(|v| v.to_vec())))
        .unwrap();
    assert_eq!(stored, Some(lost_value.into_bytes()));
    assert!(env.rewind_log().unwrap().pending().unwrap().is_empty());
}

#[test]
fn session_without_rewind_recovers_journal_before_new_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = env_path(&dir);
    let key = encode_key(4, 4);
    let read = |env: &Environment, db: DatabaseHandle| {
        env.view(|txn| Ok(db.get(txn, &key)?.map(|v| v.to_vec())))
            .unwrap()
    };

    // Session 1: journaled, crashed before the main commit.
    {
        let env = options(&path).enable_rewind(true).open().unwrap();
        env.open_root_database().unwrap();
        env.rewind_log()
            .unwrap()
            .append(&[LogEntry::new(&key, b"old")])
            .unwrap();
    }

    // Session 2: journaling off, newer value committed.
    {
        let env = std::sync::Arc::new(options(&path).open().unwrap());
        let db = env.open_root_database().unwrap();
        assert_eq!(read(env.as_ref(), db), Some(b"old".to_vec()));
        let dispatcher = CommandDispatcher::start(std::sync::Arc::clone(&env)).unwrap();
        let k = key.clone();
        dispatcher.submit(move |txn| txn.put(db, &k, b"new")).unwrap();
        dispatcher.shutdown();
    }

    // Session 3: journaling back on.
    let env = options(&path).enable_rewind(true).open().unwrap();
    let db = env.open_root_database().unwrap();
    assert_eq!(read(&env, db), Some(b"new".to_vec()));
    assert!(env.rewind_log().unwrap().pending().unwrap().is_empty());
}
