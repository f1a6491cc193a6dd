//! This crate provides vaults: containers that guard a value behind a lock and only
//! hand it out through scoped guards.
//!
//! # Motivation
//!
//! A plain mutex makes it easy to lock, but it does not stop code from leaking a
//! reference out of the critical section, from blocking forever on a lock the thread
//! already holds, or from waiting without a bound. Vaults address all three:
//!
//! 1. The protected value is only reachable through a guard that borrows the vault.
//!    Guards cannot be cloned or sent to other threads, and they release their loan
//!    exactly once, when they are dropped or explicitly unlocked.
//! 2. Acquiring a vault the calling thread already holds fails immediately with
//!    [`VaultError::AlreadyHeldByThisThread`].
//! 3. Every acquisition has a deadline, either explicit or the vault's default
//!    timeout, and can be cancelled with a [`CancellationToken`]. Waiting forever must
//!    be asked for by name.
//!
//! # Vaults
//!
//! - [`Vault`] protects a value that can be accessed through a [`ValueGuard`]. Waiting
//!   threads either spin ([`SpinVault`]) or park ([`MonitorVault`]).
//! - [`MutableVault`] protects a resource whose references must never escape, such as
//!   a value with interior mutability. The [`ResourceGuard`] only runs callbacks.
//! - [`RwVault`] allows many readers or one writer, plus one upgradable reader that
//!   can turn into a writer without letting another writer in between.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use lock_vault::{CancellationToken, LockRequest, MonitorVault, VaultError};
//!
//! let vault = MonitorVault::new(vec![1, 2, 3], Duration::from_millis(250));
//!
//! let mut guard = vault.lock().unwrap();
//! guard.push(4);
//!
//! // The calling thread already holds the vault.
//! assert!(matches!(
//!     vault.lock(),
//!     Err(VaultError::AlreadyHeldByThisThread { .. }),
//! ));
//!
//! std::thread::scope(|s| {
//!     s.spawn(|| {
//!         let token = CancellationToken::new();
//!         token.cancel();
//!         let res = vault.lock_with(LockRequest::forever().cancel_with(&token));
//!         assert_eq!(res.unwrap_err(), VaultError::Cancelled);
//!     });
//! });
//!
//! drop(guard);
//! assert_eq!(vault.copy_value().unwrap(), [1, 2, 3, 4]);
//! ```
//!
//! # Logging
//!
//! The crate emits [`tracing`] events: `trace` for acquisitions and releases, `debug`
//! for timeouts, cancellations, and rejected reentrant requests.

pub use {
    backoff::Backoff,
    cancel::CancellationToken,
    clock::{Clock, MonotonicClock},
    error::{LockMode, VaultError},
    mutable::{MonitorMutableVault, MutableVault, ResourceGuard, SpinMutableVault},
    options::{DEFAULT_CANCEL_POLL_INTERVAL, DEFAULT_TIMEOUT, VaultOptions},
    request::{LockRequest, Wait},
    resolve::{Resolution, Resolver},
    rw::{ReadGuard, RwStatus, RwVault, UpgradableReadGuard, WriteGuard},
    strategy::{Monitor, Spin, Strategy},
    vault::{MonitorVault, SpinVault, ValueGuard, Vault},
};

mod backoff;
mod cancel;
mod clock;
mod error;
mod exclusive;
mod loan;
mod mutable;
mod options;
mod owner;
mod request;
mod resolve;
mod resource;
mod rw;
mod strategy;
#[cfg(test)]
mod tests;
mod vault;

/// Types that may be stored in a [`Vault`] or [`RwVault`], or passed into and out of
/// the callbacks of a [`ResourceGuard`].
///
/// Such values may cross threads, and they do not borrow anything, so they cannot
/// smuggle a reference to a protected resource out of its guard.
///
/// The trait is implemented for all eligible types.
pub trait VaultSafe: Send + 'static {}

impl<T: ?Sized + Send + 'static> VaultSafe for T {}
