use {
    crate::{
        CancellationToken, Clock, LockRequest, MonitorMutableVault, MonitorVault, RwVault,
        SpinMutableVault, SpinVault, VaultError, VaultOptions,
    },
    std::{
        sync::{
            Arc, Barrier,
            atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering::Relaxed},
        },
        thread,
        time::{Duration, Instant},
    },
};

const LONG: Duration = Duration::from_secs(30);

fn run_in_thread<T: Send>(f: impl FnOnce() -> T + Send) -> T {
    thread::scope(|s| s.spawn(f).join().unwrap())
}

/// A clock that moves forward by a fixed step every time it is read.
#[derive(Debug)]
struct StepClock {
    base: Instant,
    step: Duration,
    reads: AtomicU32,
}

impl StepClock {
    fn new(step: Duration) -> Arc<Self> {
        Arc::new(Self {
            base: Instant::now(),
            step,
            reads: AtomicU32::new(0),
        })
    }
}

impl Clock for StepClock {
    fn now(&self) -> Instant {
        self.base + self.step * self.reads.fetch_add(1, Relaxed)
    }
}

/// Tracks how many threads are inside a critical section.
#[derive(Default)]
struct Occupancy {
    inside: AtomicUsize,
    max: AtomicUsize,
}

impl Occupancy {
    fn enter(&self) {
        let n = self.inside.fetch_add(1, Relaxed) + 1;
        self.max.fetch_max(n, Relaxed);
    }

    fn leave(&self) {
        self.inside.fetch_sub(1, Relaxed);
    }
}

#[test]
fn three_threads_increment() {
    const THREADS: usize = 3;
    const INCREMENTS: usize = 1000;
    for _ in 0..3 {
        let spin = SpinVault::new(0usize, LONG);
        let monitor = MonitorVault::new(0usize, LONG);
        let rw = RwVault::new(0usize, LONG);
        thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    for _ in 0..INCREMENTS {
                        *spin.lock().unwrap() += 1;
                        *monitor.lock().unwrap() += 1;
                        *rw.write().unwrap() += 1;
                    }
                });
            }
        });
        assert_eq!(spin.lock().unwrap().snapshot(), 3000);
        assert_eq!(monitor.lock().unwrap().snapshot(), 3000);
        assert_eq!(rw.read().unwrap().snapshot(), 3000);
    }
}

#[test]
fn mutual_exclusion() {
    let spin = (SpinVault::new(0, LONG), Occupancy::default());
    let monitor = (MonitorVault::new(0, LONG), Occupancy::default());
    let rw = (RwVault::new(0, LONG), Occupancy::default());
    let mutable = (SpinMutableVault::new(0, LONG), Occupancy::default());
    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..250 {
                    {
                        let mut guard = spin.0.lock().unwrap();
                        spin.1.enter();
                        *guard += 1;
                        spin.1.leave();
                    }
                    {
                        let mut guard = monitor.0.lock().unwrap();
                        monitor.1.enter();
                        *guard += 1;
                        monitor.1.leave();
                    }
                    {
                        let mut guard = rw.0.write().unwrap();
                        rw.1.enter();
                        *guard += 1;
                        rw.1.leave();
                    }
                    mutable
                        .0
                        .execute_action(|v| {
                            mutable.1.enter();
                            *v += 1;
                            mutable.1.leave();
                        })
                        .unwrap();
                }
            });
        }
    });
    for occupancy in [&spin.1, &monitor.1, &rw.1, &mutable.1] {
        assert_eq!(occupancy.max.load(Relaxed), 1);
    }
    assert_eq!(spin.0.into_inner(), 1000);
    assert_eq!(monitor.0.into_inner(), 1000);
    assert_eq!(rw.0.into_inner(), 1000);
    assert_eq!(mutable.0.into_inner(), 1000);
}

#[test]
fn writers_exclude_each_other_and_readers() {
    let writers = Occupancy::default();
    let readers_during_write = AtomicUsize::new(0);
    let writing = AtomicBool::new(false);
    let vault = RwVault::new(0u64, LONG);
    thread::scope(|s| {
        for t in 0..4 {
            let (writers, readers_during_write, writing, vault) =
                (&writers, &readers_during_write, &writing, &vault);
            s.spawn(move || {
                for _ in 0..300 {
                    if t % 2 == 0 {
                        let mut guard = vault.write().unwrap();
                        writers.enter();
                        writing.store(true, Relaxed);
                        *guard += 1;
                        writing.store(false, Relaxed);
                        writers.leave();
                    } else {
                        let _guard = vault.read().unwrap();
                        if writing.load(Relaxed) {
                            readers_during_write.fetch_add(1, Relaxed);
                        }
                    }
                }
            });
        }
    });
    assert_eq!(writers.max.load(Relaxed), 1);
    assert_eq!(readers_during_write.load(Relaxed), 0);
    assert_eq!(vault.into_inner(), 600);
}

#[test]
fn readers_proceed_together_and_block_writer() {
    const READERS: usize = 3;
    let vault = RwVault::new(0, LONG);
    let all_reading = Barrier::new(READERS + 1);
    let release = Barrier::new(READERS + 1);
    let released = AtomicUsize::new(0);
    thread::scope(|s| {
        for _ in 0..READERS {
            s.spawn(|| {
                let guard = vault.read().unwrap();
                all_reading.wait();
                release.wait();
                released.fetch_add(1, Relaxed);
                drop(guard);
            });
        }
        all_reading.wait();
        s.spawn(|| {
            let mut guard = vault.write().unwrap();
            assert_eq!(released.load(Relaxed), READERS);
            *guard += 1;
        });
        thread::sleep(Duration::from_millis(50));
        assert!(vault.try_read_for(Duration::from_millis(10)).is_err());
        release.wait();
    });
    assert_eq!(vault.copy_value().unwrap(), 1);
}

#[test]
fn upgrade_is_not_interleaved_with_writers() {
    let vault = RwVault::new(String::from("initial"), LONG);
    let upgradable_held = Barrier::new(2);
    let writer_waiting = AtomicBool::new(false);
    thread::scope(|s| {
        s.spawn(|| {
            let mut upgradable = vault.upgradable_read().unwrap();
            assert_eq!(*upgradable, "initial");
            upgradable_held.wait();
            while !writer_waiting.load(Relaxed) {
                thread::yield_now();
            }
            thread::sleep(Duration::from_millis(50));
            let mut write = upgradable.upgrade().unwrap();
            write.push_str(" upgraded");
        });
        s.spawn(|| {
            upgradable_held.wait();
            writer_waiting.store(true, Relaxed);
            let mut write = vault.try_write_for(LONG).unwrap();
            assert_eq!(*write, "initial upgraded");
            write.push_str(" written");
        });
    });
    assert_eq!(vault.into_inner(), "initial upgraded written");
}

fn holder_and_waiter<T>(
    hold: impl FnOnce() -> T + Send,
    wait: impl FnOnce() -> VaultError + Send,
) -> VaultError {
    let held = Barrier::new(2);
    thread::scope(|s| {
        s.spawn(|| {
            let guard = hold();
            held.wait();
            thread::sleep(Duration::from_millis(750));
            drop(guard);
        });
        held.wait();
        s.spawn(wait).join().unwrap()
    })
}

/// Runs `attempt` with `timeout` and a token that is cancelled after `delay`.
fn attempt_cancelled_after(
    delay: Duration,
    timeout: Duration,
    attempt: impl FnOnce(LockRequest<'_>) -> VaultError,
) -> VaultError {
    let token = CancellationToken::new();
    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(delay);
            token.cancel();
        });
        attempt(LockRequest::timeout(timeout).cancel_with(&token))
    })
}

#[test]
fn timeout_wins_over_late_cancellation() {
    let timeout = Duration::from_millis(10);
    for delay in [Duration::from_millis(5), Duration::from_millis(20)] {
        let expected = VaultError::TimedOut(timeout);

        let vault = SpinVault::new(0, LONG);
        let err = holder_and_waiter(
            || vault.lock().unwrap(),
            || attempt_cancelled_after(delay, timeout, |r| vault.lock_with(r).unwrap_err()),
        );
        assert_eq!(err, expected);

        let vault = MonitorVault::new(0, LONG);
        let err = holder_and_waiter(
            || vault.lock().unwrap(),
            || attempt_cancelled_after(delay, timeout, |r| vault.lock_with(r).unwrap_err()),
        );
        assert_eq!(err, expected);

        let vault = SpinMutableVault::new(0, LONG);
        let err = holder_and_waiter(
            || vault.lock().unwrap(),
            || attempt_cancelled_after(delay, timeout, |r| vault.lock_with(r).unwrap_err()),
        );
        assert_eq!(err, expected);

        let vault = MonitorMutableVault::new(0, LONG);
        let err = holder_and_waiter(
            || vault.lock().unwrap(),
            || attempt_cancelled_after(delay, timeout, |r| vault.lock_with(r).unwrap_err()),
        );
        assert_eq!(err, expected);

        let vault = RwVault::new(0, LONG);
        let err = holder_and_waiter(
            || vault.write().unwrap(),
            || attempt_cancelled_after(delay, timeout, |r| vault.read_with(r).unwrap_err()),
        );
        assert_eq!(err, expected);
    }
}

#[test]
fn early_cancellation_wins_for_every_strategy() {
    // The token is read when the wait starts, so an already cancelled token aborts
    // immediately no matter how long the timeout is.
    let token = CancellationToken::new();
    token.cancel();
    let request = LockRequest::timeout(LONG).cancel_with(&token);
    let spin = SpinVault::new(0, LONG);
    let monitor = MonitorVault::new(0, LONG);
    let mutable = SpinMutableVault::new(0, LONG);
    let err = holder_and_waiter(|| spin.lock().unwrap(), || spin.lock_with(request).unwrap_err());
    assert_eq!(err, VaultError::Cancelled);
    let err = holder_and_waiter(
        || monitor.lock().unwrap(),
        || monitor.lock_with(request).unwrap_err(),
    );
    assert_eq!(err, VaultError::Cancelled);
    let err = holder_and_waiter(
        || mutable.lock().unwrap(),
        || mutable.lock_with(request).unwrap_err(),
    );
    assert_eq!(err, VaultError::Cancelled);
}

#[test]
fn tie_break_is_repeatable() {
    // Every clock read moves 20ms forward, so the first check after the start is
    // already past a 10ms deadline.
    let expired = VaultOptions::default().with_clock(StepClock::new(Duration::from_millis(20)));
    let token = CancellationToken::new();
    token.cancel();
    let spin = SpinVault::with_options(0, expired.clone());
    let monitor = MonitorVault::with_options(0, expired.clone());
    let rw = RwVault::with_options(0, expired);
    let _spin = spin.lock().unwrap();
    let _monitor = monitor.lock().unwrap();
    let _rw = rw.write().unwrap();
    run_in_thread(|| {
        for _ in 0..100 {
            let request = LockRequest::timeout(Duration::from_millis(10)).cancel_with(&token);
            let expected = VaultError::TimedOut(Duration::from_millis(10));
            assert_eq!(spin.lock_with(request).unwrap_err(), expected);
            assert_eq!(monitor.lock_with(request).unwrap_err(), expected);
            assert_eq!(rw.read_with(request).unwrap_err(), expected);

            let request = LockRequest::timeout(Duration::from_millis(100)).cancel_with(&token);
            assert_eq!(spin.lock_with(request).unwrap_err(), VaultError::Cancelled);
            assert_eq!(monitor.lock_with(request).unwrap_err(), VaultError::Cancelled);
            assert_eq!(rw.read_with(request).unwrap_err(), VaultError::Cancelled);
        }
    });
}

#[test]
fn reentrancy_never_blocks() {
    let monitor = MonitorVault::new(0, LONG);
    let rw = RwVault::new(0, LONG);
    let start = Instant::now();
    let _monitor = monitor.lock().unwrap();
    let _rw = rw.write().unwrap();
    assert!(monitor.lock_block_forever().is_err());
    assert!(rw.write_block_forever().is_err());
    assert!(rw.upgradable_read_block_forever().is_err());
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn snapshots_are_independent() {
    let vault = SpinVault::new(vec![String::from("a")], LONG);
    let mut local = vault.copy_value().unwrap();
    local[0].push('!');
    local.push(String::from("b"));
    let mut from_guard = vault.lock().unwrap().snapshot();
    from_guard.clear();
    assert_eq!(*vault.lock().unwrap(), ["a"]);
}

#[test]
fn callback_appends_from_many_threads() {
    const THREADS: usize = 5;
    const ITEMS: usize = 200;
    let vault = MonitorMutableVault::new(Vec::new(), LONG);
    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for i in 0..ITEMS {
                    vault.execute_action(|v| v.push(i)).unwrap();
                }
            });
        }
    });
    assert_eq!(vault.execute_query(|v| v.len()).unwrap(), THREADS * ITEMS);
}

#[test]
fn guards_release_exactly_once() {
    let vault = MonitorVault::new(0, LONG);
    let guard = vault.lock().unwrap();
    guard.unlock();
    assert!(!vault.is_locked());
    let other = vault.lock().unwrap();
    // Nothing may release the new loan on behalf of the old guard.
    assert!(vault.is_locked());
    drop(other);

    let rw = RwVault::new(0, LONG);
    let mut upgradable = rw.upgradable_read().unwrap();
    upgradable.upgrade().unwrap().unlock();
    upgradable.upgrade().unwrap().unlock();
    assert!(rw.is_locked_by_current_thread());
    upgradable.unlock();
    assert!(!rw.is_locked());
}
