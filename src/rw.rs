use {
    crate::{
        CancellationToken, LockRequest, VaultError, VaultOptions, VaultSafe,
        loan::{Loan, Loaned, Release},
        owner::current_thread_id,
        resolve::{self, Claim, Resolver},
        resource::ResourceBox,
    },
    debug_fn::debug_fn,
    opera::PhantomNotSend,
    parking_lot::{Condvar, Mutex, MutexGuard},
    run_on_drop::on_drop,
    state::{Request, RwState},
    static_assertions::{assert_impl_all, assert_not_impl_any},
    std::{
        fmt::{Debug, Formatter},
        ops::{Deref, DerefMut},
        time::Duration,
    },
};
pub use state::RwStatus;

mod state;

/// A reader-writer vault with an optional upgradable read loan.
///
/// Any number of threads can hold a [`ReadGuard`] at the same time. A [`WriteGuard`]
/// excludes all other loans. At most one thread can hold an [`UpgradableReadGuard`];
/// it coexists with plain readers and can be upgraded to a write loan without ever
/// releasing its read access.
///
/// Waiting writers, including upgrades, take precedence over new readers.
///
/// No thread can hold two loans of the same vault. Such requests fail with
/// [`VaultError::AlreadyHeldByThisThread`] instead of deadlocking.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use lock_vault::RwVault;
///
/// let vault = RwVault::new(vec![1, 2, 3], Duration::from_secs(1));
/// let mut upgradable = vault.upgradable_read().unwrap();
/// if upgradable.contains(&2) {
///     let mut write = upgradable.upgrade().unwrap();
///     write.retain(|&n| n != 2);
/// }
/// assert_eq!(*upgradable, [1, 3]);
/// ```
pub struct RwVault<T> {
    state: Mutex<RwState>,
    changed: Condvar,
    options: VaultOptions,
    resource: ResourceBox<T>,
}

// SAFETY: - Readers on several threads share &T, so T must be Sync.
//         - Writers on several threads get &mut T in turn, so T must be Send.
unsafe impl<T: Send + Sync> Sync for RwVault<T> {}

/// A scoped read loan on an [`RwVault`].
#[must_use = "the vault is unlocked as soon as the guard is dropped"]
pub struct ReadGuard<'a, T> {
    resource: &'a ResourceBox<T>,
    loan: Loan<'a>,
    _phantom_not_send: PhantomNotSend,
}

/// A scoped write loan on an [`RwVault`].
///
/// If the guard was obtained by upgrading an [`UpgradableReadGuard`], dropping it
/// leaves the upgradable read loan in place.
#[must_use = "the vault is unlocked as soon as the guard is dropped"]
pub struct WriteGuard<'a, T> {
    resource: &'a ResourceBox<T>,
    loan: Loan<'a>,
    _phantom_not_send: PhantomNotSend,
}

/// A scoped upgradable read loan on an [`RwVault`].
#[must_use = "the vault is unlocked as soon as the guard is dropped"]
pub struct UpgradableReadGuard<'a, T> {
    vault: &'a RwVault<T>,
    loan: Loan<'a>,
    _phantom_not_send: PhantomNotSend,
}

assert_impl_all!(RwVault<Vec<u8>>: Send, Sync);
assert_not_impl_any!(RwVault<std::cell::Cell<u8>>: Sync);
assert_not_impl_any!(ReadGuard<'static, u8>: Send, Sync, Clone);
assert_not_impl_any!(WriteGuard<'static, u8>: Send, Sync, Clone);
assert_not_impl_any!(UpgradableReadGuard<'static, u8>: Send, Sync, Clone);

struct StateClaim<'a> {
    state: MutexGuard<'a, RwState>,
    changed: &'a Condvar,
    request: Request,
    thread: usize,
}

impl Claim for StateClaim<'_> {
    fn try_claim(&mut self) -> bool {
        self.state.try_claim(self.request, self.thread)
    }

    fn wait(&mut self, _step: u32, hint: Option<Duration>) {
        match hint {
            Some(hint) => {
                self.changed.wait_for(&mut self.state, hint);
            }
            None => self.changed.wait(&mut self.state),
        }
    }
}

impl<T: VaultSafe> RwVault<T> {
    /// Creates a vault around `value`.
    ///
    /// Calls that do not pass a timeout wait for at most `default_timeout`.
    pub fn new(value: T, default_timeout: Duration) -> Self {
        Self::with_options(
            value,
            VaultOptions::default().with_default_timeout(default_timeout),
        )
    }

    /// Creates a vault around the value returned by `factory`.
    pub fn from_factory(factory: impl FnOnce() -> T, default_timeout: Duration) -> Self {
        Self::new(factory(), default_timeout)
    }

    /// Creates a vault with custom options.
    ///
    /// The backoff of the options is not used since waiting threads always park.
    pub fn with_options(value: T, options: VaultOptions) -> Self {
        Self {
            state: Default::default(),
            changed: Condvar::new(),
            options,
            resource: ResourceBox::new(value),
        }
    }

    /// Acquires a read loan, waiting for at most the default timeout.
    ///
    /// # Errors
    ///
    /// - [`VaultError::TimedOut`] if a writer held or awaited the vault for too long.
    /// - [`VaultError::AlreadyHeldByThisThread`] if the calling thread holds any loan.
    /// - [`VaultError::InvalidArgument`] if the default timeout is zero.
    pub fn read(&self) -> Result<ReadGuard<'_, T>, VaultError> {
        self.read_with(LockRequest::new())
    }

    /// Like [`read`](Self::read) but waits for at most `timeout`.
    pub fn try_read_for(&self, timeout: Duration) -> Result<ReadGuard<'_, T>, VaultError> {
        self.read_with(LockRequest::timeout(timeout))
    }

    /// Like [`read`](Self::read) but also gives up with [`VaultError::Cancelled`] once
    /// `token` is cancelled.
    pub fn read_cancellable(
        &self,
        token: &CancellationToken,
    ) -> Result<ReadGuard<'_, T>, VaultError> {
        self.read_with(LockRequest::new().cancel_with(token))
    }

    /// Acquires a read loan as described by `request`.
    pub fn read_with(&self, request: LockRequest<'_>) -> Result<ReadGuard<'_, T>, VaultError> {
        let loan = self.acquire(Request::Read, request)?;
        Ok(ReadGuard::new(&self.resource, loan))
    }

    /// Acquires a read loan without a deadline.
    ///
    /// Reentrant requests still fail immediately.
    pub fn read_block_forever(&self) -> Result<ReadGuard<'_, T>, VaultError> {
        self.read_with(LockRequest::forever())
    }

    /// Acquires a read loan if one is available right now.
    pub fn try_read(&self) -> Result<Option<ReadGuard<'_, T>>, VaultError> {
        let loan = self.try_acquire(Request::Read)?;
        Ok(loan.map(|loan| ReadGuard::new(&self.resource, loan)))
    }

    /// Acquires a write loan, waiting for at most the default timeout.
    ///
    /// # Errors
    ///
    /// Same as [`read`](Self::read).
    pub fn write(&self) -> Result<WriteGuard<'_, T>, VaultError> {
        self.write_with(LockRequest::new())
    }

    /// Like [`write`](Self::write) but waits for at most `timeout`.
    pub fn try_write_for(&self, timeout: Duration) -> Result<WriteGuard<'_, T>, VaultError> {
        self.write_with(LockRequest::timeout(timeout))
    }

    /// Like [`write`](Self::write) but also gives up with [`VaultError::Cancelled`] once
    /// `token` is cancelled.
    ///
    /// A writer that gives up stops holding back new readers.
    pub fn write_cancellable(
        &self,
        token: &CancellationToken,
    ) -> Result<WriteGuard<'_, T>, VaultError> {
        self.write_with(LockRequest::new().cancel_with(token))
    }

    /// Acquires a write loan as described by `request`.
    pub fn write_with(&self, request: LockRequest<'_>) -> Result<WriteGuard<'_, T>, VaultError> {
        let loan = self.acquire(Request::Write, request)?;
        Ok(WriteGuard::new(&self.resource, loan))
    }

    /// Acquires a write loan without a deadline.
    pub fn write_block_forever(&self) -> Result<WriteGuard<'_, T>, VaultError> {
        self.write_with(LockRequest::forever())
    }

    /// Acquires a write loan if one is available right now.
    pub fn try_write(&self) -> Result<Option<WriteGuard<'_, T>>, VaultError> {
        let loan = self.try_acquire(Request::Write)?;
        Ok(loan.map(|loan| WriteGuard::new(&self.resource, loan)))
    }

    /// Acquires the upgradable read loan, waiting for at most the default timeout.
    ///
    /// # Errors
    ///
    /// Same as [`read`](Self::read). The wait also covers another thread holding the
    /// upgradable read loan.
    pub fn upgradable_read(&self) -> Result<UpgradableReadGuard<'_, T>, VaultError> {
        self.upgradable_read_with(LockRequest::new())
    }

    /// Like [`upgradable_read`](Self::upgradable_read) but waits for at most `timeout`.
    pub fn try_upgradable_read_for(
        &self,
        timeout: Duration,
    ) -> Result<UpgradableReadGuard<'_, T>, VaultError> {
        self.upgradable_read_with(LockRequest::timeout(timeout))
    }

    /// Like [`upgradable_read`](Self::upgradable_read) but also gives up once `token`
    /// is cancelled.
    pub fn upgradable_read_cancellable(
        &self,
        token: &CancellationToken,
    ) -> Result<UpgradableReadGuard<'_, T>, VaultError> {
        self.upgradable_read_with(LockRequest::new().cancel_with(token))
    }

    /// Acquires the upgradable read loan as described by `request`.
    pub fn upgradable_read_with(
        &self,
        request: LockRequest<'_>,
    ) -> Result<UpgradableReadGuard<'_, T>, VaultError> {
        let loan = self.acquire(Request::UpgradableRead, request)?;
        Ok(UpgradableReadGuard::new(self, loan))
    }

    /// Acquires the upgradable read loan without a deadline.
    pub fn upgradable_read_block_forever(
        &self,
    ) -> Result<UpgradableReadGuard<'_, T>, VaultError> {
        self.upgradable_read_with(LockRequest::forever())
    }

    /// Returns a copy of the protected value under a read loan.
    pub fn copy_value(&self) -> Result<T, VaultError>
    where
        T: Clone,
    {
        Ok(self.read()?.snapshot())
    }

    /// Replaces the protected value under a write loan.
    ///
    /// The previous value is dropped after the vault has been released.
    pub fn set_value(&self, value: T) -> Result<(), VaultError> {
        let old = std::mem::replace(&mut *self.write()?, value);
        drop(old);
        Ok(())
    }
}

impl<T> RwVault<T> {
    /// Returns the timeout used by calls that do not pass one.
    pub fn default_timeout(&self) -> Duration {
        self.options.default_timeout()
    }

    /// Returns the options the vault was created with.
    pub fn options(&self) -> &VaultOptions {
        &self.options
    }

    /// Returns the loans currently outstanding.
    pub fn status(&self) -> RwStatus {
        self.state.lock().status()
    }

    /// Returns whether any loan is outstanding.
    pub fn is_locked(&self) -> bool {
        self.status() != RwStatus::Idle
    }

    /// Returns whether the calling thread holds a loan.
    pub fn is_locked_by_current_thread(&self) -> bool {
        self.state.lock().held_by(current_thread_id()).is_some()
    }

    /// Returns a mutable reference to the protected value.
    ///
    /// No locking is needed since the vault is borrowed mutably.
    pub fn get_mut(&mut self) -> &mut T {
        self.resource.get_mut()
    }

    /// Consumes the vault and returns the protected value.
    pub fn into_inner(self) -> T {
        self.resource.into_inner()
    }

    fn acquire(&self, request: Request, lock: LockRequest<'_>) -> Result<Loan<'_>, VaultError> {
        let timeout = lock.resolve_timeout(self.options.default_timeout)?;
        let thread = current_thread_id();
        let mut state = self.state.lock();
        if let Err(e) = state.check(request, thread) {
            tracing::debug!(error = %e, "rejected reader-writer lock request");
            return Err(e);
        }
        let resolver = Resolver::new(
            &*self.options.clock,
            timeout,
            lock.cancellation(),
            self.options.cancel_poll_interval,
        );
        let writes = request.writes();
        if writes {
            state.waiting_writers += 1;
        }
        // Declared before the claim so that it runs after the claim has unlocked the
        // state.
        let _stop_waiting = writes.then(|| {
            on_drop(|| {
                let mut state = self.state.lock();
                state.waiting_writers -= 1;
                if state.waiting_writers == 0 {
                    self.changed.notify_all();
                }
            })
        });
        let mut claim = StateClaim {
            state,
            changed: &self.changed,
            request,
            thread,
        };
        resolve::acquire(&mut claim, &resolver, request.mode())?;
        Ok(self.loan_after_claim(request))
    }

    fn try_acquire(&self, request: Request) -> Result<Option<Loan<'_>>, VaultError> {
        let thread = current_thread_id();
        let mut state = self.state.lock();
        state.check(request, thread)?;
        Ok(state
            .try_claim(request, thread)
            .then(|| self.loan_after_claim(request)))
    }

    /// Must only be called right after `request` has been claimed.
    fn loan_after_claim(&self, request: Request) -> Loan<'_> {
        if request.writes() {
            self.resource.lend();
        } else {
            debug_assert!(!self.resource.is_on_loan(), "read loan next to a write loan");
        }
        Loan::new(self, request.loaned())
    }
}

impl<T> Release for RwVault<T> {
    fn release(&self, loaned: Loaned) {
        let mut state = self.state.lock();
        if state.release(loaned, current_thread_id()) {
            self.resource.reclaim();
        }
        drop(state);
        self.changed.notify_all();
        tracing::trace!(?loaned, "reader-writer lock released");
    }
}

impl<T: VaultSafe + Default> Default for RwVault<T> {
    fn default() -> Self {
        Self::with_options(T::default(), VaultOptions::default())
    }
}

impl<T: VaultSafe + Debug> Debug for RwVault<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RwVault")
            .field(
                "value",
                &debug_fn(|fmt| match self.try_read() {
                    Ok(Some(guard)) => Debug::fmt(&*guard, fmt),
                    _ => fmt.write_str("<locked>"),
                }),
            )
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl<'a, T> ReadGuard<'a, T> {
    fn new(resource: &'a ResourceBox<T>, loan: Loan<'a>) -> Self {
        Self {
            resource,
            loan,
            _phantom_not_send: Default::default(),
        }
    }

    /// Returns an independent copy of the protected value.
    pub fn snapshot(&self) -> T
    where
        T: Clone,
    {
        T::clone(self)
    }

    /// Releases the loan before the end of the scope.
    pub fn unlock(self) {
        self.loan.dispose();
    }
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: - This guard holds a read loan, which excludes write loans.
        unsafe { self.resource.readonly_value_ref() }
    }
}

impl<T: Debug> Debug for ReadGuard<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadGuard")
            .field("value", &**self)
            .finish_non_exhaustive()
    }
}

impl<'a, T> WriteGuard<'a, T> {
    fn new(resource: &'a ResourceBox<T>, loan: Loan<'a>) -> Self {
        Self {
            resource,
            loan,
            _phantom_not_send: Default::default(),
        }
    }

    /// Returns an independent copy of the protected value.
    pub fn snapshot(&self) -> T
    where
        T: Clone,
    {
        T::clone(self)
    }

    /// Releases the loan before the end of the scope.
    pub fn unlock(self) {
        self.loan.dispose();
    }
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: - This guard holds the write loan, and the shared borrow of the guard
        //           excludes any reference handed out by deref_mut.
        unsafe { self.resource.readonly_value_ref() }
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: - This guard holds the write loan and is borrowed mutably.
        unsafe { self.resource.value_ref() }
    }
}

impl<T: Debug> Debug for WriteGuard<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteGuard")
            .field("value", &**self)
            .finish_non_exhaustive()
    }
}

impl<'a, T> UpgradableReadGuard<'a, T> {
    fn new(vault: &'a RwVault<T>, loan: Loan<'a>) -> Self {
        Self {
            vault,
            loan,
            _phantom_not_send: Default::default(),
        }
    }

    /// Upgrades to a write loan, waiting for at most the vault's default timeout for
    /// the plain readers to leave.
    ///
    /// The upgradable read loan is never released in the process, so no other writer
    /// can get in between. Dropping the returned guard downgrades back to the
    /// upgradable read loan.
    ///
    /// # Errors
    ///
    /// - [`VaultError::TimedOut`] if readers held the vault for too long.
    /// - [`VaultError::InvalidHandleState`] if a write guard returned by a previous
    ///   upgrade was leaked.
    /// - [`VaultError::InvalidArgument`] if the default timeout is zero.
    pub fn upgrade(&mut self) -> Result<WriteGuard<'_, T>, VaultError> {
        self.upgrade_with(LockRequest::new())
    }

    /// Like [`upgrade`](Self::upgrade) but waits for at most `timeout`.
    ///
    /// On failure the upgradable read loan is kept.
    pub fn try_upgrade_for(&mut self, timeout: Duration) -> Result<WriteGuard<'_, T>, VaultError> {
        self.upgrade_with(LockRequest::timeout(timeout))
    }

    /// Like [`upgrade`](Self::upgrade) but also gives up once `token` is cancelled.
    pub fn upgrade_cancellable(
        &mut self,
        token: &CancellationToken,
    ) -> Result<WriteGuard<'_, T>, VaultError> {
        self.upgrade_with(LockRequest::new().cancel_with(token))
    }

    /// Upgrades to a write loan as described by `request`.
    pub fn upgrade_with(
        &mut self,
        request: LockRequest<'_>,
    ) -> Result<WriteGuard<'_, T>, VaultError> {
        let loan = self.vault.acquire(Request::Upgrade, request)?;
        Ok(WriteGuard::new(&self.vault.resource, loan))
    }

    /// Upgrades to a write loan without a deadline.
    pub fn upgrade_block_forever(&mut self) -> Result<WriteGuard<'_, T>, VaultError> {
        self.upgrade_with(LockRequest::forever())
    }

    /// Returns an independent copy of the protected value.
    pub fn snapshot(&self) -> T
    where
        T: Clone,
    {
        T::clone(self)
    }

    /// Releases the loan before the end of the scope.
    pub fn unlock(self) {
        self.loan.dispose();
    }
}

impl<T> Deref for UpgradableReadGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: - This guard holds the upgradable read loan, which excludes write
        //           loans of other threads.
        //         - A write guard from an upgrade mutably borrows this guard, so it
        //           cannot be alive while this reference is.
        unsafe { self.vault.resource.readonly_value_ref() }
    }
}

impl<T: Debug> Debug for UpgradableReadGuard<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpgradableReadGuard")
            .field("value", &**self)
            .finish_non_exhaustive()
    }
}
