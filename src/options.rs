use {
    crate::{Backoff, Clock, MonotonicClock},
    std::{sync::Arc, time::Duration},
};

/// The timeout used by operations that do not take an explicit one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// How often a wait loop re-checks its cancellation token.
pub const DEFAULT_CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration shared by all vault types.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use lock_vault::{Backoff, SpinVault, VaultOptions};
///
/// let options = VaultOptions::default()
///     .with_default_timeout(Duration::from_millis(50))
///     .with_backoff(Backoff::Fixed(Duration::from_micros(100)));
/// let vault = SpinVault::with_options(String::new(), options);
/// assert_eq!(vault.default_timeout(), Duration::from_millis(50));
/// ```
#[derive(Clone, Debug)]
pub struct VaultOptions {
    pub(crate) default_timeout: Duration,
    pub(crate) cancel_poll_interval: Duration,
    pub(crate) backoff: Backoff,
    pub(crate) clock: Arc<dyn Clock>,
}

impl Default for VaultOptions {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            cancel_poll_interval: DEFAULT_CANCEL_POLL_INTERVAL,
            backoff: Backoff::default(),
            clock: Arc::new(MonotonicClock),
        }
    }
}

impl VaultOptions {
    /// Sets the timeout used when a caller does not supply one.
    ///
    /// A zero timeout is accepted here but makes every defaulted acquisition fail with
    /// [`VaultError::InvalidArgument`](crate::VaultError::InvalidArgument).
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Sets the longest a wait may park before re-checking its cancellation token.
    pub fn with_cancel_poll_interval(mut self, interval: Duration) -> Self {
        self.cancel_poll_interval = interval;
        self
    }

    /// Sets the backoff policy of [`Spin`](crate::Spin) vaults. Ignored by the other
    /// strategies.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replaces the clock used to compute and check deadlines.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the timeout used by calls that do not pass one.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Returns the longest time between two reads of a cancellation token.
    pub fn cancel_poll_interval(&self) -> Duration {
        self.cancel_poll_interval
    }

    /// Returns how spin vaults pause between attempts.
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }
}
