//! Integration tests for the lifecycle supervisor
//!
//! Concurrent close, waiter release and registration ordering.

use shadow_core::{closer_fn, Supervisor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn counting_closer(name: &str, counter: &Arc<AtomicUsize>) -> impl shadow_core::Closer + 'static {
    let counter = Arc::clone(counter);
    closer_fn(name.to_string(), move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

#[test]
fn test_concurrent_close_tears_down_once() {
    let supervisor = Supervisor::new();
    let counters: Vec<Arc<AtomicUsize>> = (0..5).map(|_| Arc::new(AtomicUsize::new(0))).collect();
    for (i, counter) in counters.iter().enumerate() {
        supervisor
            .register(counting_closer(&format!("resource-{i}"), counter))
            .unwrap();
    }

    // Waiters that start before shutdown
    let early_waiters: Vec<_> = (0..4)
        .map(|_| {
            let done = supervisor.done();
            thread::spawn(move || done.wait())
        })
        .collect();

    let callers = 16;
    let barrier = Arc::new(Barrier::new(callers));
    let closers: Vec<_> = (0..callers)
        .map(|_| {
            let supervisor = supervisor.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                supervisor.close().performed
            })
        })
        .collect();

    let performed = closers
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|performed| *performed)
        .count();
    assert_eq!(performed, 1);

    for waiter in early_waiters {
        waiter.join().unwrap();
    }

    // A waiter that starts after shutdown
    supervisor.done().wait();

    for counter in &counters {
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn test_teardown_follows_registration_order() {
    let supervisor = Supervisor::new();
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

    for name in ["capture", "transport", "resolver"] {
        let order = Arc::clone(&order);
        supervisor
            .register(closer_fn(name, move || {
                order.lock().push(name);
                Ok(())
            }))
            .unwrap();
    }

    supervisor.close();
    assert_eq!(*order.lock(), vec!["capture", "transport", "resolver"]);
}

#[test]
fn test_failing_closer_still_signals() {
    let supervisor = Supervisor::new();
    let counter = Arc::new(AtomicUsize::new(0));
    supervisor
        .register(closer_fn("broken", || Err(anyhow::anyhow!("device busy"))))
        .unwrap();
    supervisor.register(counting_closer("after", &counter)).unwrap();

    let report = supervisor.close();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.closed, 1);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(supervisor.done().wait_timeout(Duration::from_secs(1)));
}

#[test]
fn test_unbounded_wait_released_by_close() {
    let supervisor = Supervisor::new();
    let done = supervisor.done();
    let waiter = thread::spawn(move || done.wait_timeout(Duration::MAX));

    thread::sleep(Duration::from_millis(20));
    supervisor.close();
    assert!(waiter.join().unwrap());
}

#[test]
fn test_late_registration_is_closed_immediately() {
    let supervisor = Supervisor::new();
    supervisor.close();

    let counter = Arc::new(AtomicUsize::new(0));
    assert!(supervisor.register(counting_closer("late", &counter)).is_err());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_waiters_released() {
    let supervisor = Supervisor::new();

    let waiters: Vec<_> = (0..8)
        .map(|_| {
            let done = supervisor.done();
            tokio::spawn(async move { done.closed().await })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(10)).await;
    let closer = supervisor.clone();
    tokio::task::spawn_blocking(move || closer.close())
        .await
        .unwrap();

    for waiter in waiters {
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("waiter not released")
            .unwrap();
    }

    // Late async waiter resolves straight away
    tokio::time::timeout(Duration::from_secs(1), supervisor.done().closed())
        .await
        .expect("late waiter blocked");
}
