use {
    std::{
        fmt::{self, Display, Formatter},
        time::Duration,
    },
    thiserror::Error,
};

#[cfg(test)]
mod tests;

/// The kind of loan a guard holds or a caller asks for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// A loan on a [`Vault`](crate::Vault) or [`MutableVault`](crate::MutableVault).
    Exclusive,
    /// A shared read loan on an [`RwVault`](crate::RwVault).
    Read,
    /// A write loan on an [`RwVault`](crate::RwVault), including an upgraded one.
    Write,
    /// The upgradable read loan on an [`RwVault`](crate::RwVault).
    UpgradableRead,
}

impl Display for LockMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            LockMode::Exclusive => "exclusive",
            LockMode::Read => "read",
            LockMode::Write => "write",
            LockMode::UpgradableRead => "upgradable read",
        };
        f.write_str(s)
    }
}

/// Errors returned by vault operations.
///
/// [`TimedOut`](VaultError::TimedOut) and [`Cancelled`](VaultError::Cancelled) are
/// expected under contention. The other variants indicate a bug in the caller and
/// retrying will not help.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum VaultError {
    /// An argument was out of range, e.g. a zero timeout.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The loan did not become available before the timeout elapsed.
    #[error("timed out after {0:?} waiting for the lock")]
    TimedOut(Duration),

    /// The cancellation token fired before the loan could be claimed.
    #[error("lock acquisition was cancelled")]
    Cancelled,

    /// The calling thread already holds a loan on this vault.
    #[error("this thread already holds the vault in {held} mode and requested {requested} mode")]
    AlreadyHeldByThisThread {
        /// The loan the thread already holds.
        held: LockMode,
        /// The loan the thread asked for.
        requested: LockMode,
    },

    /// A guard was used in a state it can never legally be in.
    #[error("invalid guard state: {0}")]
    InvalidHandleState(&'static str),
}

impl VaultError {
    /// Returns whether this error is a [`TimedOut`](VaultError::TimedOut) error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, VaultError::TimedOut(_))
    }

    /// Returns whether this error is a [`Cancelled`](VaultError::Cancelled) error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, VaultError::Cancelled)
    }

    /// Returns whether the operation may succeed if it is retried later.
    pub fn is_recoverable(&self) -> bool {
        self.is_timeout() || self.is_cancelled()
    }
}
