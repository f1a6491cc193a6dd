use {
    crate::{CancellationToken, Clock, LockMode, VaultError},
    std::{
        cell::Cell,
        time::{Duration, Instant},
    },
};


/// The outcome of one iteration of an acquisition loop.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The claim succeeded.
    Acquired,
    /// The claim failed and the caller should wait before trying again.
    ///
    /// The hint is the longest the caller may wait. `None` means that neither a
    /// deadline nor a cancellation token applies and the caller may park until woken.
    Retry(Option<Duration>),
    /// The deadline has been reached.
    TimedOut,
    /// The cancellation token has fired.
    Cancelled,
}

/// Decides, after every claim attempt, whether an acquisition continues.
///
/// The checks run in a fixed order: claim success, then expiry, then cancellation.
///
/// - The attempt expires once `now >= deadline`. The deadline instant itself counts as
///   expired, even if the token is cancelled at that point.
/// - The token is read on the first failed attempt and after that at most once per
///   poll interval, whatever the strategy of the vault. A cancellation that happens
///   after the last read before the deadline is therefore reported as
///   [`TimedOut`](Resolution::TimedOut).
///
/// The resolver only reads the injected [`Clock`] and the token, which makes its
/// decisions reproducible.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use lock_vault::{MonotonicClock, Resolution, Resolver};
///
/// let resolver = Resolver::new(
///     &MonotonicClock,
///     Some(Duration::from_secs(60)),
///     None,
///     Duration::from_millis(10),
/// );
/// assert_eq!(resolver.resolve(true), Resolution::Acquired);
/// assert!(matches!(resolver.resolve(false), Resolution::Retry(Some(_))));
/// ```
#[derive(Debug)]
pub struct Resolver<'a> {
    clock: &'a dyn Clock,
    started: Instant,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    cancel: Option<&'a CancellationToken>,
    poll_interval: Duration,
    // The earliest time at which the token is read again.
    next_poll: Cell<Instant>,
}

impl<'a> Resolver<'a> {
    /// Starts an attempt at the clock's current time.
    ///
    /// A `timeout` of `None`, or one too large to be represented as a deadline, never
    /// expires.
    pub fn new(
        clock: &'a dyn Clock,
        timeout: Option<Duration>,
        cancel: Option<&'a CancellationToken>,
        poll_interval: Duration,
    ) -> Self {
        let started = clock.now();
        Self {
            clock,
            started,
            timeout,
            deadline: timeout.and_then(|timeout| started.checked_add(timeout)),
            cancel,
            poll_interval,
            next_poll: Cell::new(started),
        }
    }

    /// Resolves the result of the latest claim attempt.
    pub fn resolve(&self, claimed: bool) -> Resolution {
        if claimed {
            return Resolution::Acquired;
        }
        let now = self.clock.now();
        if let Some(deadline) = self.deadline {
            if now >= deadline {
                return Resolution::TimedOut;
            }
        }
        let until_poll = match self.cancel {
            Some(cancel) => {
                let mut next_poll = self.next_poll.get();
                if now >= next_poll {
                    if cancel.is_cancelled() {
                        return Resolution::Cancelled;
                    }
                    next_poll = now.checked_add(self.poll_interval).unwrap_or(now);
                    self.next_poll.set(next_poll);
                }
                Some(next_poll.saturating_duration_since(now))
            }
            None => None,
        };
        let remaining = self
            .deadline
            .map(|deadline| deadline.saturating_duration_since(now));
        let hint = match (remaining, until_poll) {
            (Some(remaining), Some(until_poll)) => Some(remaining.min(until_poll)),
            (remaining, until_poll) => remaining.or(until_poll),
        };
        Resolution::Retry(hint)
    }

    /// Returns the time since the attempt started.
    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.started)
    }

    /// Returns the timeout the attempt was started with, or `None` if it waits forever.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the instant at which the attempt expires.
    ///
    /// This is `None` if the attempt waits forever or if the deadline cannot be
    /// represented.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// A synchronization object that an acquisition loop can poll.
pub(crate) trait Claim {
    /// Attempts to take the loan without blocking.
    fn try_claim(&mut self) -> bool;

    /// Waits before the next attempt, for at most `hint` if it is `Some`.
    ///
    /// `step` counts the failed attempts so far. Implementations may return early.
    fn wait(&mut self, step: u32, hint: Option<Duration>);
}

/// Runs the acquisition loop until the claim succeeds or the resolver gives up.
pub(crate) fn acquire(
    claim: &mut impl Claim,
    resolver: &Resolver<'_>,
    mode: LockMode,
) -> Result<(), VaultError> {
    let mut step = 0u32;
    loop {
        match resolver.resolve(claim.try_claim()) {
            Resolution::Acquired => {
                tracing::trace!(%mode, waited = ?resolver.elapsed(), "lock acquired");
                return Ok(());
            }
            Resolution::Retry(hint) => {
                claim.wait(step, hint);
                step = step.saturating_add(1);
            }
            Resolution::TimedOut => {
                let timeout = resolver.timeout().unwrap_or_default();
                tracing::debug!(%mode, ?timeout, "lock acquisition timed out");
                return Err(VaultError::TimedOut(timeout));
            }
            Resolution::Cancelled => {
                tracing::debug!(%mode, waited = ?resolver.elapsed(), "lock acquisition cancelled");
                return Err(VaultError::Cancelled);
            }
        }
    }
}
