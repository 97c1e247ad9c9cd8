//! Runs against a live server only when `TALLY_REDIS_URL` is set.

use lazy_static::lazy_static;
use std::{env, sync::Arc, thread, time::SystemTime};
use tally::{Allocation, Allocator, CounterKey, CounterStore, Created, FieldOptions, Raised, StoreError, StoreErrorKind};
use tally_redis::{Config, RedisCounterStore};

lazy_static! {
    static ref STORE: Option<Arc<RedisCounterStore>> = {
        let _ = env_logger::builder().is_test(true).try_init();
        let url = env::var("TALLY_REDIS_URL").ok()?;
        let nanos = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap().as_nanos();
        let config = Config::new(format!("tally-test-{}", nanos));
        let store = RedisCounterStore::connect(&url, config).expect("could not connect to TALLY_REDIS_URL");
        Some(Arc::new(store))
    };
}

fn allocator() -> Option<Allocator<Arc<RedisCounterStore>>> {
    let store = Arc::clone(STORE.as_ref()?);
    Some(Allocator::initialized(store).unwrap())
}

#[test]
fn store_primitives_behave_atomically() {
    let allocator = match allocator() {
        Some(a) => a,
        None => return,
    };
    let store = allocator.store();
    let key = CounterKey::ungrouped("Primitive", "_id");

    assert_eq!(store.find(&key).unwrap(), None);
    assert_eq!(store.create_if_absent(&key, -1).unwrap(), Created::Inserted);
    assert_eq!(store.create_if_absent(&key, 40).unwrap(), Created::Conflict);
    assert_eq!(store.increment_and_get(&key, 1).unwrap(), 0);
    assert_eq!(store.compare_and_raise(&key, 10, 10).unwrap(), Raised::Updated);
    assert_eq!(store.compare_and_raise(&key, 5, 5).unwrap(), Raised::NotApplied);
    assert_eq!(store.set_count(&key, 3).unwrap(), 3);
    assert_eq!(store.find(&key).unwrap().unwrap().count, 3);

    let records = store.records().unwrap();
    assert!(records.iter().any(|r| r.key == key && r.count == 3));
}

#[test]
fn raises_compare_exactly_across_the_whole_range() {
    let allocator = match allocator() {
        Some(a) => a,
        None => return,
    };
    let store = allocator.store();
    let key = CounterKey::ungrouped("Wide", "_id");
    let max = i64::max_value();

    assert_eq!(store.create_if_absent(&key, max - 2).unwrap(), Created::Inserted);
    assert_eq!(store.compare_and_raise(&key, max - 1, max - 1).unwrap(), Raised::Updated);
    assert_eq!(store.compare_and_raise(&key, max - 2, max - 2).unwrap(), Raised::NotApplied);
    assert_eq!(store.find(&key).unwrap().unwrap().count, max - 1);

    store.set_count(&key, -10).unwrap();
    assert_eq!(store.compare_and_raise(&key, -11, -11).unwrap(), Raised::NotApplied);
    assert_eq!(store.compare_and_raise(&key, -9, -9).unwrap(), Raised::Updated);
    assert_eq!(store.compare_and_raise(&key, -9, -9).unwrap(), Raised::NotApplied);
    assert_eq!(store.compare_and_raise(&key, 3, 3).unwrap(), Raised::Updated);
    assert_eq!(store.compare_and_raise(&key, 12, 12).unwrap(), Raised::Updated);
    assert_eq!(store.find(&key).unwrap().unwrap().count, 12);
}

#[test]
fn updates_to_a_missing_counter_are_reported() {
    let allocator = match allocator() {
        Some(a) => a,
        None => return,
    };
    let key = CounterKey::ungrouped("Missing", "_id");

    let err = allocator.store().increment_and_get(&key, 1).unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::Missing);
    assert_eq!(allocator.store().find(&key).unwrap(), None);

    let err = allocator.store().compare_and_raise(&key, 4, 4).unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::Missing);
}

#[test]
fn grouped_sequences_allocate_independently() {
    let allocator = match allocator() {
        Some(a) => a,
        None => return,
    };
    let users = allocator
        .register(FieldOptions::new("User").with_field("userId").with_grouping_field("dept").with_start_at(1))
        .unwrap();

    assert_eq!(users.allocate(Some("Support"), None).unwrap(), Allocation::Assigned(1));
    assert_eq!(users.allocate(Some("Support"), None).unwrap(), Allocation::Assigned(2));
    assert_eq!(users.allocate(Some("Marketing"), None).unwrap(), Allocation::Assigned(1));
    assert_eq!(users.reset_count(Some("Support")).unwrap(), 1);
    assert_eq!(users.peek(Some("Support")).unwrap(), 1);
}

#[test]
fn concurrent_allocators_never_share_a_value() {
    let store = match STORE.as_ref() {
        Some(store) => Arc::clone(store),
        None => return,
    };

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let allocator = Allocator::initialized(store).unwrap();
                let invoices = allocator.register(FieldOptions::new("Invoice").with_field("number")).unwrap();
                (0..25)
                    .map(|_| invoices.allocate(None, None).unwrap().assigned().unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut values: Vec<i64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    values.sort();
    assert_eq!(values, (0..100).collect::<Vec<_>>());
}
