use crate::{LockMode, VaultError, loan::Loaned};

/// A claim an acquisition loop tries to make on an [`RwState`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) enum Request {
    Read,
    Write,
    UpgradableRead,
    /// Turn the upgradable read loan of the calling thread into a write loan.
    Upgrade,
}

impl Request {
    pub(super) fn mode(self) -> LockMode {
        match self {
            Request::Read => LockMode::Read,
            Request::Write | Request::Upgrade => LockMode::Write,
            Request::UpgradableRead => LockMode::UpgradableRead,
        }
    }

    pub(super) fn loaned(self) -> Loaned {
        match self {
            Request::Read => Loaned::Read,
            Request::Write => Loaned::Write,
            Request::UpgradableRead => Loaned::UpgradableRead,
            Request::Upgrade => Loaned::Upgraded,
        }
    }

    /// Whether the request lends out the resource exclusively.
    pub(super) fn writes(self) -> bool {
        matches!(self, Request::Write | Request::Upgrade)
    }
}

/// What an [`RwVault`](crate::RwVault) is doing right now.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RwStatus {
    /// No loans are outstanding.
    Idle,
    /// The given number of read loans are outstanding.
    Read(usize),
    /// A write loan is outstanding.
    Write,
    /// The upgradable read loan is outstanding, next to the given number of read loans.
    UpgradableRead {
        /// The number of plain read loans.
        readers: usize,
    },
    /// The upgradable read loan has been upgraded to a write loan.
    Upgraded,
}

/// The bookkeeping of a reader-writer vault. Protected by the vault's mutex.
///
/// Threads are identified by [`current_thread_id`](crate::owner::current_thread_id).
#[derive(Debug, Default)]
pub(super) struct RwState {
    // Invariants:
    // 1. readers and writer are never both non-empty
    // 2. if writer is some and upgradable is some, they are the same thread
    // 3. no thread appears twice across readers and upgradable
    readers: Vec<usize>,
    upgradable: Option<usize>,
    writer: Option<usize>,
    // Threads currently waiting for Write or Upgrade. New readers queue behind them.
    pub(super) waiting_writers: usize,
}

impl RwState {
    /// Returns the loan `thread` holds, if any.
    pub(super) fn held_by(&self, thread: usize) -> Option<LockMode> {
        if self.writer == Some(thread) {
            Some(LockMode::Write)
        } else if self.upgradable == Some(thread) {
            Some(LockMode::UpgradableRead)
        } else if self.readers.contains(&thread) {
            Some(LockMode::Read)
        } else {
            None
        }
    }

    /// Rejects requests that can never succeed for `thread`.
    pub(super) fn check(&self, request: Request, thread: usize) -> Result<(), VaultError> {
        if request == Request::Upgrade {
            if self.upgradable != Some(thread) {
                return Err(VaultError::InvalidHandleState(
                    "upgrade requires the upgradable read lock",
                ));
            }
            if self.writer == Some(thread) {
                return Err(VaultError::InvalidHandleState(
                    "the upgradable read lock is already upgraded",
                ));
            }
            return Ok(());
        }
        match self.held_by(thread) {
            Some(held) => Err(VaultError::AlreadyHeldByThisThread {
                held,
                requested: request.mode(),
            }),
            None => Ok(()),
        }
    }

    /// Claims `request` for `thread` if the current state admits it.
    pub(super) fn try_claim(&mut self, request: Request, thread: usize) -> bool {
        let admitted = match request {
            Request::Read => self.writer.is_none() && self.waiting_writers == 0,
            Request::UpgradableRead => {
                self.writer.is_none() && self.upgradable.is_none() && self.waiting_writers == 0
            }
            Request::Write => {
                self.writer.is_none() && self.upgradable.is_none() && self.readers.is_empty()
            }
            Request::Upgrade => {
                debug_assert_eq!(self.upgradable, Some(thread));
                self.writer.is_none() && self.readers.is_empty()
            }
        };
        if admitted {
            match request {
                Request::Read => self.readers.push(thread),
                Request::UpgradableRead => self.upgradable = Some(thread),
                Request::Write | Request::Upgrade => self.writer = Some(thread),
            }
        }
        admitted
    }

    /// Returns a loan held by `thread`.
    ///
    /// Returns whether an exclusive claim on the resource ended.
    pub(super) fn release(&mut self, loaned: Loaned, thread: usize) -> bool {
        match loaned {
            Loaned::Read => {
                let pos = self.readers.iter().position(|&t| t == thread);
                debug_assert!(pos.is_some(), "released a read lock that is not held");
                if let Some(pos) = pos {
                    self.readers.swap_remove(pos);
                }
                false
            }
            Loaned::Write | Loaned::Upgraded => {
                debug_assert_eq!(self.writer, Some(thread));
                self.writer = None;
                true
            }
            Loaned::UpgradableRead => {
                debug_assert_eq!(self.upgradable, Some(thread));
                self.upgradable = None;
                // Only possible if the write guard of an upgrade was leaked.
                self.writer.take_if(|&mut writer| writer == thread).is_some()
            }
            Loaned::Exclusive => unreachable!("reader-writer vaults never lend exclusively"),
        }
    }

    pub(super) fn status(&self) -> RwStatus {
        match (self.writer, self.upgradable) {
            (Some(_), Some(_)) => RwStatus::Upgraded,
            (Some(_), None) => RwStatus::Write,
            (None, Some(_)) => RwStatus::UpgradableRead {
                readers: self.readers.len(),
            },
            (None, None) if self.readers.is_empty() => RwStatus::Idle,
            (None, None) => RwStatus::Read(self.readers.len()),
        }
    }
}
