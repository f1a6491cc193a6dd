use {
    crate::Backoff,
    std::time::{Duration, Instant},
};

#[test]
fn spin_never_sleeps() {
    assert_eq!(Backoff::Spin.delay(0), None);
    assert_eq!(Backoff::Spin.delay(100), None);
    assert_eq!(Backoff::default(), Backoff::Spin);
}

#[test]
fn fixed() {
    let backoff = Backoff::Fixed(Duration::from_millis(3));
    assert_eq!(backoff.delay(0), Some(Duration::from_millis(3)));
    assert_eq!(backoff.delay(17), Some(Duration::from_millis(3)));
}

#[test]
fn exponential() {
    let backoff = Backoff::Exponential {
        initial: Duration::from_micros(10),
        max: Duration::from_micros(100),
    };
    assert_eq!(backoff.delay(0), Some(Duration::from_micros(10)));
    assert_eq!(backoff.delay(1), Some(Duration::from_micros(20)));
    assert_eq!(backoff.delay(3), Some(Duration::from_micros(80)));
    assert_eq!(backoff.delay(4), Some(Duration::from_micros(100)));
    assert_eq!(backoff.delay(u32::MAX), Some(Duration::from_micros(100)));
}

#[test]
fn pause_respects_bound() {
    let backoff = Backoff::Fixed(Duration::from_secs(10));
    let start = Instant::now();
    backoff.pause(0, Some(Duration::from_millis(1)));
    assert!(start.elapsed() < Duration::from_secs(5));
    backoff.pause(0, Some(Duration::ZERO));
    Backoff::Spin.pause(0, None);
    Backoff::Spin.pause(100, None);
}
