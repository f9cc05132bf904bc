//! Read-back verification and environment housekeeping.

use crate::common::*;
use lmdb_stress::{verify, DriverOptions, LoopDriver, Mismatch, SequentialKeys};

#[test]
fn verification_twice_gives_identical_results() {
    let t = TestEnv::new();
    let index = LoopDriver::new(&t.dispatcher, t.db, SequentialKeys::new(), DriverOptions::new(3, 4))
        .run()
        .unwrap();
    // Damage one record so the mismatch set is non-empty.
    t.put(&encode_key(0, 5), b"tampered");

    let first = verify(&t.env, t.db, &index).unwrap();
    let second = verify(&t.env, t.db, &index).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.checked, 12);
    assert_eq!(first.mismatches.len(), 1);
}

#[test]
fn out_of_band_changes_are_reported_without_stopping() {
    let t = TestEnv::new();
    let index = LoopDriver::new(&t.dispatcher, t.db, SequentialKeys::new(), DriverOptions::new(2, 3))
        .run()
        .unwrap();

    let removed = encode_key(0, 0);
    let rewritten = encode_key(0, 4);
    let db = t.db;
    {
        let (removed, rewritten) = (removed.clone(), rewritten.clone());
        t.dispatcher
            .submit(move |txn| {
                // Overwrite with another record's value; drop the other by
                // replacing it with an empty value.
                txn.put(db, &rewritten, Origin::new(0, 0).expected_value().as_bytes())?;
                txn.put(db, &removed, b"")
            })
            .unwrap();
    }

    let report = verify(&t.env, t.db, &index).unwrap();
    assert_eq!(report.checked, 6);
    assert_eq!(report.mismatches.len(), 2);
    assert!(report.mismatches.iter().any(|m| matches!(
        m,
        Mismatch::ValueDiffers { key, actual_len: 0, actual: None, .. } if *key == removed
    )));
    assert!(report.mismatches.iter().any(|m| matches!(
        m,
        Mismatch::ValueDiffers { key, origin, actual: Some(actual), .. }
            if *key == rewritten && *origin == Origin::new(1, 1) && *actual == Origin::new(0, 0)
    )));
}

#[test]
fn keys_never_written_are_missing() {
    let t = TestEnv::new();
    let mut index = VerificationIndex::new();
    index.record(encode_key(8, 8), Origin::new(0, 0));

    let report = verify(&t.env, t.db, &index).unwrap();
    assert_eq!(
        report.mismatches,
        vec![Mismatch::Missing {
            key: encode_key(8, 8),
            origin: Origin::new(0, 0),
        }]
    );
}

#[test]
fn stale_reader_check_on_fresh_environment_is_zero() {
    let t = TestEnv::new();
    assert_eq!(t.env.reclaim_stale_readers().unwrap(), 0);
    // Live readers in this process are not stale.
    t.env
        .view(|_txn| {
            assert_eq!(t.env.reclaim_stale_readers()?, 0);
            Ok(())
        })
        .unwrap();
}
