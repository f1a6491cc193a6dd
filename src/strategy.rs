use {
    crate::{Backoff, VaultOptions},
    parking_lot::{Condvar, Mutex},
    std::{
        fmt::{Debug, Formatter},
        sync::atomic::{
            AtomicBool,
            Ordering::{Acquire, Relaxed, Release},
        },
        time::Duration,
    },
};


/// How an exclusive vault claims and waits for its loan.
///
/// Both implementations in this crate honor the same contract. They differ only in
/// what a waiting thread does: [`Spin`] keeps the thread busy, [`Monitor`] parks it.
///
/// # Safety
///
/// - If [`try_claim`](Self::try_claim) returns `true`, no other call returns `true`
///   until [`release`](Self::release) has been called.
/// - [`release`](Self::release) must synchronize with the next successful
///   [`try_claim`](Self::try_claim).
pub unsafe trait Strategy: Send + Sync {
    /// Creates an unclaimed instance.
    fn new(options: &VaultOptions) -> Self
    where
        Self: Sized;

    /// Attempts to claim the loan without blocking.
    fn try_claim(&self) -> bool;

    /// Waits for the loan to become available, for at most `hint` if it is `Some`.
    ///
    /// `step` is the number of failed claims of the current acquisition. Spurious
    /// returns are allowed.
    fn wait(&self, step: u32, hint: Option<Duration>);

    /// Releases the loan.
    ///
    /// # Safety
    ///
    /// - The loan must be claimed.
    unsafe fn release(&self);

    /// Returns whether the loan is currently claimed.
    fn is_claimed(&self) -> bool;
}

/// A strategy that waits by spinning.
///
/// Waiting threads stay runnable and follow the configured [`Backoff`]. This suits
/// vaults whose loans are held very briefly. With [`Backoff::Spin`] a waiting thread
/// burns CPU for as long as it waits.
pub struct Spin {
    claimed: AtomicBool,
    backoff: Backoff,
}

// SAFETY: - The loan is claimed by the compare-exchange from false to true, which only
//           one thread can win until the flag is stored as false again.
//         - The acquire/release pair on the flag orders the critical sections.
unsafe impl Strategy for Spin {
    fn new(options: &VaultOptions) -> Self {
        Self {
            claimed: AtomicBool::new(false),
            backoff: options.backoff(),
        }
    }

    #[inline]
    fn try_claim(&self) -> bool {
        !self.claimed.load(Relaxed)
            && self
                .claimed
                .compare_exchange(false, true, Acquire, Relaxed)
                .is_ok()
    }

    #[inline]
    fn wait(&self, step: u32, hint: Option<Duration>) {
        self.backoff.pause(step, hint);
    }

    #[inline]
    unsafe fn release(&self) {
        self.claimed.store(false, Release);
    }

    #[inline]
    fn is_claimed(&self) -> bool {
        self.claimed.load(Relaxed)
    }
}

impl Debug for Spin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spin")
            .field("claimed", &self.is_claimed())
            .field("backoff", &self.backoff)
            .finish()
    }
}

/// A strategy that parks waiting threads on a condition variable.
///
/// Releasing the loan wakes one waiter. This suits vaults whose loans are held for
/// long or unpredictable periods.
pub struct Monitor {
    claimed: Mutex<bool>,
    available: Condvar,
}

// SAFETY: - The claimed flag is only read and written under the mutex, which also
//           orders the critical sections.
unsafe impl Strategy for Monitor {
    fn new(_options: &VaultOptions) -> Self {
        Self {
            claimed: Mutex::new(false),
            available: Condvar::new(),
        }
    }

    fn try_claim(&self) -> bool {
        let mut claimed = self.claimed.lock();
        !std::mem::replace(&mut *claimed, true)
    }

    fn wait(&self, _step: u32, hint: Option<Duration>) {
        let mut claimed = self.claimed.lock();
        if !*claimed {
            return;
        }
        match hint {
            Some(hint) => {
                self.available.wait_for(&mut claimed, hint);
            }
            None => self.available.wait(&mut claimed),
        }
    }

    unsafe fn release(&self) {
        let mut claimed = self.claimed.lock();
        debug_assert!(*claimed);
        *claimed = false;
        drop(claimed);
        self.available.notify_one();
    }

    fn is_claimed(&self) -> bool {
        *self.claimed.lock()
    }
}

impl Debug for Monitor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("claimed", &self.is_claimed())
            .finish_non_exhaustive()
    }
}
