//! Cross-thread behaviour of keyed locks.

use keylock_cache::backend::LocalCacheBackend;
use keylock_cache::{CacheBackend, CacheService, Error, KeyedLockManager, LockKey, NamedCache};
use proptest::prelude::*;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_same_key_serializes_threads() {
    init_logging();
    let locks = KeyedLockManager::new();
    let inside = Arc::new(AtomicUsize::new(0));
    let violations = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..16)
        .map(|_| {
            let locks = locks.clone();
            let inside = Arc::clone(&inside);
            let violations = Arc::clone(&violations);
            let completed = Arc::clone(&completed);
            thread::spawn(move || {
                for _ in 0..500 {
                    let handle = locks.blocking_acquire("hot");
                    if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                        violations.fetch_add(1, Ordering::SeqCst);
                    }
                    completed.fetch_add(1, Ordering::Relaxed);
                    inside.fetch_sub(1, Ordering::SeqCst);
                    locks.release(handle).expect("Failed to release");
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("Worker panicked");
    }

    assert_eq!(violations.load(Ordering::SeqCst), 0);
    assert_eq!(completed.load(Ordering::Relaxed), 16 * 500);
    assert!(locks.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_key_serializes_tasks() {
    let locks = KeyedLockManager::new();
    let inside = Arc::new(AtomicUsize::new(0));
    let max_inside = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let locks = locks.clone();
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            tokio::spawn(async move {
                for _ in 0..100 {
                    let mut handle = locks.acquire(String::from("hot")).await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                    handle.unlock().expect("Failed to unlock");
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.expect("Task panicked");
    }

    assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    assert!(locks.is_empty());
}

#[test]
fn test_distinct_keys_do_not_block() {
    let locks = KeyedLockManager::new();
    let held: Vec<_> = (0..8_i64).map(|i| locks.blocking_acquire(i)).collect();
    assert_eq!(locks.len(), 8);

    let shared = locks.clone();
    let worker = thread::spawn(move || {
        let handle = shared.blocking_acquire(8_i64);
        shared.release(handle).expect("Failed to release");
    });
    worker.join().expect("Distinct key must not block");

    for handle in held {
        locks.release(handle).expect("Failed to release");
    }
    assert!(locks.is_empty());
}

#[test]
fn test_random_keys_balanced_use_leaves_registry_empty() {
    let locks = KeyedLockManager::new();

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let locks = locks.clone();
            thread::spawn(move || {
                let mut rng = rand::rng();
                for _ in 0..1_000 {
                    let key = format!("key-{}", rng.random_range(0..16));
                    let handle = locks.blocking_acquire(key);
                    locks.release(handle).expect("Failed to release");
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("Worker panicked");
    }
    assert!(locks.is_empty());
}

#[test]
fn test_end_to_end_key_a() {
    init_logging();
    let backend = LocalCacheBackend::new();
    let cache = backend.create_cache("entries").expect("Failed to create cache");
    let locks = backend.locks().clone();

    let mut first = backend.get_lock("A", &cache);
    first.blocking_lock();

    let acquired = Arc::new(AtomicBool::new(false));
    let second = {
        let backend = backend.clone();
        let acquired = Arc::clone(&acquired);
        thread::spawn(move || {
            let cache = backend.create_cache("entries").expect("Failed to create cache");
            let mut second = backend.get_lock(String::from("A"), &cache);
            second.blocking_lock();
            acquired.store(true, Ordering::SeqCst);
            second
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!acquired.load(Ordering::SeqCst));
    assert_eq!(locks.holders(&LockKey::from("A")), 2);

    first.unlock().expect("Failed to release first");
    let mut second = second.join().expect("Second thread panicked");
    assert!(acquired.load(Ordering::SeqCst));

    second.unlock().expect("Failed to release second");
    assert_eq!(locks.holders(&LockKey::from("A")), 0);
    assert!(locks.is_empty());

    // Fully released: any further release is illegal.
    assert!(matches!(second.unlock(), Err(Error::IllegalLockState(_))));
}

#[test]
fn test_service_shared_across_threads() {
    let service = CacheService::new(LocalCacheBackend::new());
    let counter_key = "counter";

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            thread::spawn(move || {
                let cache = service.cache("counters").expect("Failed to get cache");
                for _ in 0..200 {
                    let mut lock = service.lock(counter_key, &cache);
                    lock.blocking_lock();
                    let current = cache
                        .get(counter_key)
                        .expect("Failed to get")
                        .map(|bytes| u64::from_le_bytes(bytes.try_into().expect("8 bytes")))
                        .unwrap_or(0);
                    cache
                        .put(counter_key, (current + 1).to_le_bytes().to_vec())
                        .expect("Failed to put");
                    lock.unlock().expect("Failed to unlock");
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("Worker panicked");
    }

    let cache = service.cache("counters").expect("Failed to get cache");
    let total = cache
        .get(counter_key)
        .expect("Failed to get")
        .map(|bytes| u64::from_le_bytes(bytes.try_into().expect("8 bytes")));
    assert_eq!(total, Some(8 * 200));
    assert_eq!(cache.len(), 1);
    assert!(service.backend().locks().is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_equal_text_resolves_to_one_entry(text in "[a-z0-9]{1,12}", waiters in 1usize..6) {
        let locks = KeyedLockManager::new();
        let key = LockKey::from(text.as_str());

        let first = locks.blocking_acquire(text.clone());
        let workers: Vec<_> = (0..waiters)
            .map(|_| {
                let locks = locks.clone();
                let text = text.clone();
                thread::spawn(move || {
                    let handle = locks.blocking_acquire(text.as_str());
                    locks.release(handle).expect("Failed to release");
                })
            })
            .collect();

        // Every waiter is registered and contending before the holder lets go.
        while locks.holders(&key) < waiters + 1 {
            thread::yield_now();
        }
        prop_assert_eq!(locks.len(), 1);
        prop_assert_eq!(locks.holders(&key), waiters + 1);

        locks.release(first).expect("Failed to release");
        for worker in workers {
            worker.join().expect("Waiter panicked");
        }
        prop_assert!(locks.is_empty());
    }

    #[test]
    fn prop_balanced_use_leaves_registry_empty(keys in prop::collection::hash_set(0i64..64, 1..16)) {
        let locks = KeyedLockManager::new();

        let held: Vec<_> = keys.iter().map(|key| locks.blocking_acquire(*key)).collect();
        prop_assert_eq!(locks.len(), keys.len());
        for key in &keys {
            prop_assert_eq!(locks.holders(&LockKey::from(*key)), 1);
        }

        for handle in held {
            locks.release(handle).expect("Failed to release");
        }
        prop_assert!(locks.is_empty());
    }
}
