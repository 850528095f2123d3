// Prefetch integration tests - deduplication and admission order
// Author: kelexine (https://github.com/kelexine)

use futures::future::{self, Ready};
use parking_lot::Mutex;
use platecache::cache::{CacheKey, CacheOptions, TtlCache};
use platecache::prefetch::{AdmissionQueue, PrefetchManager, PrefetchOptions, PrefetchRequest};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

type Log = Arc<Mutex<Vec<&'static str>>>;

fn manager(max_concurrent: usize) -> (PrefetchManager<&'static str, String>, Arc<AdmissionQueue>) {
    let admission = AdmissionQueue::new(max_concurrent, 5);
    let cache = TtlCache::new("prefetch-test", CacheOptions::default());
    (PrefetchManager::new(cache, admission.clone(), 1), admission)
}

fn priority(p: i32) -> PrefetchOptions {
    PrefetchOptions::default().with_priority(p)
}

/// Fetcher that records when it is invoked and succeeds with its name.
fn recorder(log: &Log, name: &'static str) -> impl FnOnce() -> Ready<Result<&'static str, String>> + Send + 'static {
    let log = log.clone();
    move || {
        log.lock().push(name);
        future::ready(Ok(name))
    }
}

/// Let every runnable task make progress.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_prefetches_share_one_fetch() {
    let admission = AdmissionQueue::new(3, 5);
    let manager: PrefetchManager<u32, String> =
        PrefetchManager::new(TtlCache::new("dedup", CacheOptions::default()), admission, 1);
    let calls = Arc::new(AtomicUsize::new(0));
    let key = CacheKey::from(["meals", "week"]);

    let waiters: Vec<_> = (0..10)
        .map(|_| {
            let calls = calls.clone();
            manager.prefetch(
                key.clone(),
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(42)
                },
                PrefetchOptions::default(),
            )
        })
        .collect();

    assert_eq!(manager.pending_count(), 1);
    let results = future::join_all(waiters).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|r| *r == Ok(42)));
    assert!(!manager.is_pending(&key));
}

#[tokio::test(start_paused = true)]
async fn test_urgent_request_runs_before_queued_background_work() {
    let (manager, admission) = manager(1);
    let log: Log = Arc::default();
    let (release, gate) = oneshot::channel::<()>();

    let blocker = manager.prefetch(
        CacheKey::from(["blocker"]),
        move || async move {
            let _ = gate.await;
            Ok("blocker")
        },
        priority(1),
    );
    settle().await;
    assert_eq!(admission.running(), 1);

    let low = manager.prefetch(CacheKey::from(["low"]), recorder(&log, "low"), priority(1));
    let high = manager.prefetch(CacheKey::from(["high"]), recorder(&log, "high"), priority(5));
    settle().await;

    // the urgent request went past the limit, the background one still waits
    assert_eq!(*log.lock(), vec!["high"]);
    assert_eq!(admission.queued(), 1);

    release.send(()).unwrap();
    assert_eq!(blocker.await, Ok("blocker"));
    assert_eq!(low.await, Ok("low"));
    assert_eq!(high.await, Ok("high"));
    assert_eq!(*log.lock(), vec!["high", "low"]);
}

#[tokio::test(start_paused = true)]
async fn test_queue_orders_by_priority_then_arrival() {
    let (manager, _admission) = manager(1);
    let log: Log = Arc::default();
    let (release, gate) = oneshot::channel::<()>();

    let blocker = manager.prefetch(
        CacheKey::from(["blocker"]),
        move || async move {
            let _ = gate.await;
            Ok("blocker")
        },
        priority(1),
    );
    settle().await;

    let first = manager.prefetch(CacheKey::from(["first"]), recorder(&log, "first"), priority(1));
    let second = manager.prefetch(CacheKey::from(["second"]), recorder(&log, "second"), priority(1));
    let important = manager.prefetch(CacheKey::from(["important"]), recorder(&log, "important"), priority(3));

    release.send(()).unwrap();
    let _ = future::join4(blocker, first, second, important).await;

    assert_eq!(*log.lock(), vec!["important", "first", "second"]);
}

#[tokio::test(start_paused = true)]
async fn test_raising_ceiling_admits_waiting_requests() {
    let (manager, admission) = manager(1);
    let log: Log = Arc::default();
    let (release, gate) = oneshot::channel::<()>();

    let blocker = manager.prefetch(
        CacheKey::from(["blocker"]),
        move || async move {
            let _ = gate.await;
            Ok("blocker")
        },
        priority(1),
    );
    let a = manager.prefetch(CacheKey::from(["a"]), recorder(&log, "a"), priority(1));
    let b = manager.prefetch(CacheKey::from(["b"]), recorder(&log, "b"), priority(1));
    settle().await;
    assert!(log.lock().is_empty());

    admission.set_max_concurrent(3);
    settle().await;

    // both ran while the blocker still holds its slot
    assert_eq!(*log.lock(), vec!["a", "b"]);
    assert_eq!(admission.running(), 1);

    release.send(()).unwrap();
    let _ = future::join3(blocker, a, b).await;
    assert_eq!(admission.running(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_lowering_ceiling_keeps_running_fetches() {
    let (manager, admission) = manager(3);
    let mut releases = Vec::new();
    let mut running = Vec::new();

    for name in ["one", "two", "three"] {
        let (release, gate) = oneshot::channel::<()>();
        releases.push(release);
        running.push(manager.prefetch(
            CacheKey::from([name]),
            move || async move {
                let _ = gate.await;
                Ok(name)
            },
            priority(1),
        ));
    }
    settle().await;
    assert_eq!(admission.running(), 3);

    admission.set_max_concurrent(1);
    assert_eq!(admission.running(), 3);

    for release in releases {
        release.send(()).unwrap();
    }
    let results = future::join_all(running).await;
    assert_eq!(results, vec![Ok("one"), Ok("two"), Ok("three")]);
}

#[tokio::test(start_paused = true)]
async fn test_batch_settles_every_request_in_input_order() {
    let (manager, _admission) = manager(1);
    let log: Log = Arc::default();

    let failing_log = log.clone();
    let requests = vec![
        PrefetchRequest::new(CacheKey::from(["low"]), recorder(&log, "low")).with_priority(1),
        PrefetchRequest::new(CacheKey::from(["high"]), move || {
            failing_log.lock().push("high");
            future::ready(Err::<&'static str, _>(String::from("timeout")))
        })
        .with_priority(3),
        PrefetchRequest::new(CacheKey::from(["mid"]), recorder(&log, "mid")).with_priority(2),
    ];

    let results = manager.prefetch_batch(requests).await;

    assert_eq!(
        results,
        vec![Ok("low"), Err(String::from("timeout")), Ok("mid")]
    );
    assert_eq!(*log.lock(), vec!["high", "mid", "low"]);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_prefetch_still_fills_cache() {
    let (manager, _admission) = manager(2);
    let key = CacheKey::from(["summary"]);

    drop(manager.prefetch(
        key.clone(),
        || async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok("fresh")
        },
        PrefetchOptions::default(),
    ));
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(manager.cache().get(&key, Duration::from_secs(60)), Some("fresh"));
}

#[tokio::test(start_paused = true)]
async fn test_urgent_request_invoked_before_unstarted_background_request() {
    let (manager, admission) = manager(1);
    let log: Log = Arc::default();

    let starts = |name: &'static str| {
        let log = log.clone();
        move || async move {
            log.lock().push(name);
            Ok::<_, String>(name)
        }
    };

    // the background request holds the only slot but has not started yet
    let background = manager.prefetch(CacheKey::from(["background"]), starts("background"), priority(1));
    assert_eq!(admission.running(), 1);
    let urgent = manager.prefetch(CacheKey::from(["urgent"]), starts("urgent"), priority(5));

    let (background, urgent) = future::join(background, urgent).await;
    assert_eq!(background, Ok("background"));
    assert_eq!(urgent, Ok("urgent"));
    assert_eq!(*log.lock(), vec!["urgent", "background"]);
    assert_eq!(admission.running(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_prefetch_falls_back_to_expired_value() {
    let (manager, _admission) = manager(2);
    let key = CacheKey::from(["meals", "today"]);
    let ttl = Duration::from_secs(60);
    manager.cache().insert(key.clone(), "yesterday's list", 10);

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(manager.cache().get(&key, ttl), None);

    let result = manager
        .prefetch(
            key.clone(),
            || future::ready(Err::<&'static str, _>(String::from("offline"))),
            PrefetchOptions::default().with_ttl(ttl),
        )
        .await;

    assert_eq!(result, Ok("yesterday's list"));
    assert!(!manager.is_pending(&key));
}

#[tokio::test(start_paused = true)]
async fn test_batch_uses_each_request_stale_time() {
    let (manager, _admission) = manager(2);
    let log: Log = Arc::default();
    let patient = CacheKey::from(["patient"]);
    let strict = CacheKey::from(["strict"]);
    manager.cache().insert(patient.clone(), "cached", 10);
    manager.cache().insert(strict.clone(), "cached", 10);

    tokio::time::advance(Duration::from_secs(30)).await;

    let requests = vec![
        PrefetchRequest::new(patient, recorder(&log, "patient")).with_stale_time(Duration::from_secs(60)),
        PrefetchRequest::new(strict, recorder(&log, "strict")).with_stale_time(Duration::from_secs(10)),
    ];
    let results = manager.prefetch_batch(requests).await;

    // only the request whose window has passed refetches
    assert_eq!(results, vec![Ok("cached"), Ok("strict")]);
    assert_eq!(*log.lock(), vec!["strict"]);
}
