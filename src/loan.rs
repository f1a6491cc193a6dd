use std::{
    fmt::{Debug, Formatter},
    sync::atomic::{AtomicBool, Ordering},
};


/// A set-once flag.
#[derive(Default)]
pub(crate) struct DisposeFlag {
    set: AtomicBool,
}

impl DisposeFlag {
    /// Sets the flag. Returns `true` only for the call that changed it.
    #[inline]
    pub(crate) fn set(&self) -> bool {
        !self.set.swap(true, Ordering::AcqRel)
    }

    #[inline]
    pub(crate) fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }
}

/// The kind of loan a [`Loan`] returns when it is disposed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Loaned {
    Exclusive,
    Read,
    Write,
    UpgradableRead,
    /// The write loan of an upgraded upgradable read loan. Releasing it leaves the
    /// upgradable read loan in place.
    Upgraded,
}

/// Implemented by vaults to take back a loan.
pub(crate) trait Release {
    /// Returns a loan of the given kind held by the calling thread.
    fn release(&self, loaned: Loaned);
}

/// The release half of a guard.
///
/// Disposing a loan runs [`Release::release`] the first time and does nothing after
/// that. Dropping a loan disposes it.
pub(crate) struct Loan<'a> {
    vault: &'a dyn Release,
    loaned: Loaned,
    disposed: DisposeFlag,
}

impl<'a> Loan<'a> {
    /// Creates the loan for a claim that has just succeeded.
    pub(crate) fn new(vault: &'a dyn Release, loaned: Loaned) -> Self {
        Self {
            vault,
            loaned,
            disposed: DisposeFlag::default(),
        }
    }

    #[inline]
    pub(crate) fn dispose(&self) {
        if self.disposed.set() {
            self.vault.release(self.loaned);
        }
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.is_set()
    }
}

impl Drop for Loan<'_> {
    #[inline]
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Debug for Loan<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loan")
            .field("loaned", &self.loaned)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
