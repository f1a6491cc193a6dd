use std::{
    fmt::{Debug, Formatter},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};


/// A cooperative cancellation signal for lock waits.
///
/// Clones share the same signal. Once cancelled, a token stays cancelled.
///
/// Vaults check the token on every iteration of their wait loop. A cancelled token
/// aborts a wait that has not yet claimed its loan; it has no effect on guards that
/// already exist.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use lock_vault::{CancellationToken, LockRequest, MonitorVault, VaultError};
///
/// let vault = MonitorVault::new(0, Duration::from_secs(1));
/// let _guard = vault.lock().unwrap();
///
/// let token = CancellationToken::new();
/// token.cancel();
/// std::thread::scope(|s| {
///     s.spawn(|| {
///         let res = vault.lock_with(LockRequest::new().cancel_with(&token));
///         assert_eq!(res.unwrap_err(), VaultError::Cancelled);
///     });
/// });
/// ```
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancellation to every clone of this token.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns whether [`cancel`](Self::cancel) has been called on any clone.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Debug for CancellationToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
