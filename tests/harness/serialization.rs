//! Single-writer guarantees: ordering, mutual exclusion, thread affinity.

use crate::common::*;
use lmdb_stress::WRITER_THREAD_NAME;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn commits_follow_submission_order() {
    let t = TestEnv::new();
    let db = t.db;
    for i in 0..50u32 {
        t.dispatcher
            .submit(move |txn| txn.put(db, "last", &i.to_be_bytes()))
            .unwrap();
        assert_eq!(t.get("last"), Some(i.to_be_bytes().to_vec()));
    }
}

#[test]
fn commands_never_overlap() {
    let t = TestEnv::new();
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(4));

    thread::scope(|s| {
        for thread_id in 0..4u32 {
            let (in_flight, max_seen, barrier) =
                (Arc::clone(&in_flight), Arc::clone(&max_seen), Arc::clone(&barrier));
            let dispatcher = &t.dispatcher;
            let db = t.db;
            s.spawn(move || {
                barrier.wait();
                for i in 0..10u32 {
                    let (in_flight, max_seen) = (Arc::clone(&in_flight), Arc::clone(&max_seen));
                    dispatcher
                        .submit(move |txn| {
                            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(1));
                            txn.put(db, &encode_key(thread_id, i), b"v")?;
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    assert_eq!(t.env.record_count(t.db).unwrap(), 40);
}

#[test]
fn concurrent_read_modify_write_loses_no_updates() {
    let t = TestEnv::new();
    let db = t.db;
    let applied = Arc::new(Mutex::new(Vec::new()));

    thread::scope(|s| {
        for thread_id in 0..4u64 {
            let dispatcher = &t.dispatcher;
            let applied = Arc::clone(&applied);
            s.spawn(move || {
                for i in 0..25u64 {
                    let applied = Arc::clone(&applied);
                    dispatcher
                        .submit(move |txn| {
                            let current = match txn.get(db, "counter")? {
                                Some(bytes) => u64::from_be_bytes(bytes.try_into().unwrap()),
                                None => 0,
                            };
                            txn.put(db, "counter", &(current + 1).to_be_bytes())?;
                            applied.lock().push((thread_id, i));
                            Ok(())
                        })
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(t.get("counter"), Some(100u64.to_be_bytes().to_vec()));
    let applied = applied.lock();
    assert_eq!(applied.len(), 100);
    // Each submitter's commands ran in the order it issued them.
    for thread_id in 0..4u64 {
        let seq: Vec<u64> = applied
            .iter()
            .filter(|(t, _)| *t == thread_id)
            .map(|(_, i)| *i)
            .collect();
        assert_eq!(seq, (0..25).collect::<Vec<_>>());
    }
}

#[test]
fn operations_run_on_the_writer_thread_only() {
    let t = TestEnv::new();
    let names = Arc::new(Mutex::new(Vec::new()));

    thread::scope(|s| {
        for _ in 0..3 {
            let dispatcher = &t.dispatcher;
            let names = Arc::clone(&names);
            s.spawn(move || {
                for _ in 0..5 {
                    let names = Arc::clone(&names);
                    dispatcher
                        .submit(move |_txn| {
                            let current = thread::current();
                            names
                                .lock()
                                .push((current.id(), current.name().map(str::to_owned)));
                            Ok(())
                        })
                        .unwrap();
                }
            });
        }
    });

    let writer = t.dispatcher.writer_thread_id();
    let names = names.lock();
    assert_eq!(names.len(), 15);
    for (id, name) in names.iter() {
        assert_eq!(*id, writer);
        assert_eq!(name.as_deref(), Some(WRITER_THREAD_NAME));
    }
    assert_ne!(thread::current().id(), writer);
}

#[test]
fn reads_run_from_any_thread() {
    let t = TestEnv::new();
    t.put("shared", b"value");

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                assert_eq!(t.get("shared"), Some(b"value".to_vec()));
            });
        }
    });
}
