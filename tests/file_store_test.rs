use std::sync::Barrier;
use std::thread;

use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;
use workerbook::storage::crypto::CryptoEnvelope;
use workerbook::{
    DailyRollover, FileStore, FixedClock, KeyValueStore, RolloverError, RolloverOutcome,
    StoreError, WriteBatch,
};

const FAST_ITERATIONS: u32 = 1_000;

#[test]
fn encrypted_store_reopens_with_the_right_password() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("workerbook.enc");

    let store = FileStore::open_encrypted(path.as_path(), "correct horse", FAST_ITERATIONS);
    store
        .set("worker-list", json!([{"id": "W-1", "commission": 40}]))
        .unwrap();
    store.set("last-app-date", json!("2024-06-01")).unwrap();

    let envelope: CryptoEnvelope =
        serde_json::from_str(std::fs::read_to_string(path.as_path()).unwrap().as_str()).unwrap();
    assert_eq!(envelope.v, 1);

    let reopened = FileStore::open_encrypted(path.as_path(), "correct horse", FAST_ITERATIONS);
    assert_eq!(
        reopened.get("worker-list").unwrap(),
        Some(json!([{"id": "W-1", "commission": 40}]))
    );
    let mut keys = reopened.keys().unwrap();
    keys.sort();
    assert_eq!(keys, vec!["last-app-date", "worker-list"]);
}

#[test]
fn encrypted_store_keeps_its_salt_across_saves() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("workerbook.enc");
    let read_salt = || {
        let raw = std::fs::read_to_string(path.as_path()).unwrap();
        serde_json::from_str::<CryptoEnvelope>(raw.as_str()).unwrap().salt
    };

    let store = FileStore::open_encrypted(path.as_path(), "pw", FAST_ITERATIONS);
    store.set("a", json!(1)).unwrap();
    let first = read_salt();
    store.set("b", json!(2)).unwrap();
    assert_eq!(read_salt(), first);

    let other_handle = FileStore::open_encrypted(path.as_path(), "pw", FAST_ITERATIONS);
    other_handle.set("c", json!(3)).unwrap();
    assert_eq!(read_salt(), first);
}

#[test]
fn wrong_password_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("workerbook.enc");
    FileStore::open_encrypted(path.as_path(), "right", FAST_ITERATIONS)
        .set("admin", json!("North Console"))
        .unwrap();

    let wrong = FileStore::open_encrypted(path.as_path(), "wrong", FAST_ITERATIONS);
    assert!(matches!(wrong.get("admin"), Err(StoreError::Decrypt(_))));
    assert!(matches!(
        wrong.set("admin", json!("hijack")),
        Err(StoreError::Decrypt(_))
    ));

    let right = FileStore::open_encrypted(path.as_path(), "right", FAST_ITERATIONS);
    assert_eq!(right.get("admin").unwrap(), Some(json!("North Console")));
}

#[test]
fn second_handle_rollover_plan_conflicts_after_first_commit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("workerbook.json");
    let first = FileStore::open(path.as_path());
    let second = FileStore::open(path.as_path());
    first.set("last-app-date", json!("2024-06-01")).unwrap();
    first
        .set("route-assignments", json!({"route-1": ["W-1"]}))
        .unwrap();

    let today = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
    let rollover = DailyRollover::default();
    let plan_a = rollover.plan(&first, today).unwrap();
    let plan_b = rollover.plan(&second, today).unwrap();

    first.commit(plan_a.batch).unwrap();
    let after_first = std::fs::read_to_string(path.as_path()).unwrap();

    let err = second.commit(plan_b.batch).unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));
    assert_eq!(std::fs::read_to_string(path.as_path()).unwrap(), after_first);
    assert_eq!(
        second.get("route-assignments_2024-06-01").unwrap(),
        Some(json!({"route-1": ["W-1"]}))
    );
}

#[test]
fn unguarded_batch_applies_every_op() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path().join("workerbook.json"));
    store.set("stale", json!("x")).unwrap();

    let mut batch = WriteBatch::new();
    batch
        .set("admin", json!("North Console"))
        .set("console-profiles", json!([]))
        .remove("stale");
    store.commit(batch).unwrap();

    assert_eq!(store.get("admin").unwrap(), Some(json!("North Console")));
    assert_eq!(store.get("console-profiles").unwrap(), Some(json!([])));
    assert_eq!(store.get("stale").unwrap(), None);
}

#[test]
fn concurrent_rollovers_from_two_handles_apply_once() {
    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 6, 2, 16, 0, 0).unwrap());
    for _ in 0..25 {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workerbook.json");
        let seed = FileStore::open(path.as_path());
        seed.set("last-app-date", json!("2024-06-01")).unwrap();
        seed.set("route-assignments", json!({"route-1": ["W-1"]}))
            .unwrap();
        seed.set(
            "worker-list",
            json!([{"id": "W-1", "bookingStatus": "next_day"}]),
        )
        .unwrap();

        let barrier = Barrier::new(2);
        let run = || {
            let store = FileStore::open(path.as_path());
            barrier.wait();
            DailyRollover::default().run(&store, &clock)
        };
        let results: Vec<Result<RolloverOutcome, RolloverError>> = thread::scope(|scope| {
            let first = scope.spawn(&run);
            let second = scope.spawn(&run);
            vec![first.join().unwrap(), second.join().unwrap()]
        });

        let rolled = results
            .iter()
            .filter(|result| matches!(result, Ok(RolloverOutcome::RolledOver(_))))
            .count();
        assert_eq!(rolled, 1, "{results:?}");
        for result in &results {
            assert!(
                matches!(
                    result,
                    Ok(RolloverOutcome::RolledOver(_))
                        | Ok(RolloverOutcome::SameDay { .. })
                        | Err(RolloverError::Store(StoreError::Conflict { .. }))
                ),
                "{result:?}"
            );
        }
        assert_eq!(
            seed.get("worker-list").unwrap(),
            Some(json!([{"id": "W-1", "bookingStatus": "today", "bookedDate": "2024-06-02"}]))
        );
        assert_eq!(
            seed.get("route-assignments_2024-06-01").unwrap(),
            Some(json!({"route-1": ["W-1"]}))
        );
    }
}
