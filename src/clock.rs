use std::{fmt::Debug, time::Instant};

/// A source of monotonic timestamps.
///
/// Vaults read the clock to compute deadlines and to decide whether a deadline has
/// passed. Waiting itself always uses real time, so a custom clock mostly matters for
/// deterministic tests of the timeout logic.
pub trait Clock: Debug + Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Instant;
}

/// The default clock, backed by [`Instant::now`].
#[derive(Copy, Clone, Debug, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}
