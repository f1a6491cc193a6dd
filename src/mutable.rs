use {
    crate::{
        CancellationToken, LockRequest, Monitor, Spin, Strategy, VaultError, VaultOptions,
        VaultSafe, exclusive::Exclusive, loan::Loan, resource::ResourceBox,
    },
    opera::PhantomNotSend,
    static_assertions::{assert_impl_all, assert_not_impl_any},
    std::{
        fmt::{Debug, Formatter},
        time::Duration,
    },
};


/// An exclusive vault around a resource that must never leave the lock.
///
/// Unlike [`Vault`](crate::Vault), the protected value does not need to be
/// [`VaultSafe`] and the guard never hands out a reference to it. Instead,
/// [`ResourceGuard`] runs callbacks that receive the reference as a parameter. Values
/// going into or coming out of a callback must be [`VaultSafe`], and the callback
/// signatures make it impossible to return a reference derived from the resource.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use lock_vault::MonitorMutableVault;
///
/// let vault = MonitorMutableVault::new(Vec::<String>::new(), Duration::from_secs(1));
/// {
///     let mut guard = vault.lock().unwrap();
///     guard.execute_action_with("hello", |v, s| v.push(s.to_owned()));
///     let len = guard.execute_query(|v| v.len());
///     assert_eq!(len, 1);
/// }
/// let first = vault.execute_query(|v| v[0].clone()).unwrap();
/// assert_eq!(first, "hello");
/// ```
pub struct MutableVault<T, S> {
    core: Exclusive<T, S>,
}

/// A [`MutableVault`] whose waiting threads spin.
pub type SpinMutableVault<T> = MutableVault<T, Spin>;

/// A [`MutableVault`] whose waiting threads park on a condition variable.
pub type MonitorMutableVault<T> = MutableVault<T, Monitor>;

/// A scoped exclusive loan on a [`MutableVault`].
///
/// The resource is only reachable through the `execute_*` callbacks. If a callback
/// panics, the loan is still released while the panic unwinds.
#[must_use = "the vault is unlocked as soon as the guard is dropped"]
pub struct ResourceGuard<'a, T> {
    resource: &'a ResourceBox<T>,
    loan: Loan<'a>,
    _phantom_not_send: PhantomNotSend,
}

assert_impl_all!(MutableVault<std::cell::RefCell<Vec<u8>>, Monitor>: Send, Sync);
assert_not_impl_any!(ResourceGuard<'static, u8>: Send, Sync, Clone);

impl<T, S: Strategy> MutableVault<T, S> {
    /// Creates a vault around `resource`.
    pub fn new(resource: T, default_timeout: Duration) -> Self {
        Self::with_options(
            resource,
            VaultOptions::default().with_default_timeout(default_timeout),
        )
    }

    /// Creates a vault around the resource returned by `factory`.
    pub fn from_factory(factory: impl FnOnce() -> T, default_timeout: Duration) -> Self {
        Self::new(factory(), default_timeout)
    }

    /// Creates a vault with custom options.
    pub fn with_options(resource: T, options: VaultOptions) -> Self {
        Self {
            core: Exclusive::new(resource, options),
        }
    }

    /// Acquires the vault, waiting for at most the default timeout.
    ///
    /// # Errors
    ///
    /// Same as [`Vault::lock`](crate::Vault::lock).
    pub fn lock(&self) -> Result<ResourceGuard<'_, T>, VaultError> {
        self.lock_with(LockRequest::new())
    }

    /// Like [`lock`](Self::lock) but waits for at most `timeout`.
    pub fn try_lock_for(&self, timeout: Duration) -> Result<ResourceGuard<'_, T>, VaultError> {
        self.lock_with(LockRequest::timeout(timeout))
    }

    /// Like [`lock`](Self::lock) but also gives up with [`VaultError::Cancelled`] once
    /// `token` is cancelled.
    pub fn lock_cancellable(
        &self,
        token: &CancellationToken,
    ) -> Result<ResourceGuard<'_, T>, VaultError> {
        self.lock_with(LockRequest::new().cancel_with(token))
    }

    /// Acquires the vault as described by `request`.
    pub fn lock_with(
        &self,
        request: LockRequest<'_>,
    ) -> Result<ResourceGuard<'_, T>, VaultError> {
        let loan = self.core.acquire(request)?;
        Ok(ResourceGuard::new(self.core.resource(), loan))
    }

    /// Acquires the vault without a deadline.
    ///
    /// Reentrant requests still fail immediately.
    pub fn lock_block_forever(&self) -> Result<ResourceGuard<'_, T>, VaultError> {
        self.lock_with(LockRequest::forever())
    }

    /// Acquires the vault if it is available right now.
    ///
    /// Returns `Ok(None)` if another thread holds it.
    ///
    /// # Errors
    ///
    /// [`VaultError::AlreadyHeldByThisThread`] if the calling thread holds the vault.
    pub fn try_lock(&self) -> Result<Option<ResourceGuard<'_, T>>, VaultError> {
        let loan = self.core.try_acquire()?;
        Ok(loan.map(|loan| ResourceGuard::new(self.core.resource(), loan)))
    }

    /// Acquires the vault with the default timeout, runs `query`, and releases the
    /// vault.
    pub fn execute_query<R>(&self, query: impl FnOnce(&T) -> R) -> Result<R, VaultError>
    where
        R: VaultSafe,
    {
        Ok(self.lock()?.execute_query(query))
    }

    /// Acquires the vault with the default timeout, runs `action`, and releases the
    /// vault.
    pub fn execute_action(&self, action: impl FnOnce(&mut T)) -> Result<(), VaultError> {
        self.lock()?.execute_action(action);
        Ok(())
    }

    /// Acquires the vault with the default timeout, runs `mixed`, and releases the
    /// vault.
    pub fn execute_mixed<R>(&self, mixed: impl FnOnce(&mut T) -> R) -> Result<R, VaultError>
    where
        R: VaultSafe,
    {
        Ok(self.lock()?.execute_mixed(mixed))
    }

    /// Returns the timeout used by calls that do not pass one.
    pub fn default_timeout(&self) -> Duration {
        self.core.options().default_timeout()
    }

    /// Returns whether any thread holds a guard.
    pub fn is_locked(&self) -> bool {
        self.core.is_locked()
    }

    /// Returns whether the calling thread holds the guard.
    pub fn is_locked_by_current_thread(&self) -> bool {
        self.core.is_locked_by_current_thread()
    }

    /// Returns a mutable reference to the resource.
    ///
    /// No locking is needed since the vault is borrowed mutably.
    pub fn get_mut(&mut self) -> &mut T {
        self.core.get_mut()
    }

    /// Consumes the vault and returns the resource.
    pub fn into_inner(self) -> T {
        self.core.into_inner()
    }
}

impl<T: Default, S: Strategy> Default for MutableVault<T, S> {
    fn default() -> Self {
        Self::with_options(T::default(), VaultOptions::default())
    }
}

impl<T, S: Strategy> Debug for MutableVault<T, S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutableVault")
            .field("locked", &self.is_locked())
            .field("default_timeout", &self.default_timeout())
            .finish_non_exhaustive()
    }
}

impl<'a, T> ResourceGuard<'a, T> {
    fn new(resource: &'a ResourceBox<T>, loan: Loan<'a>) -> Self {
        Self {
            resource,
            loan,
            _phantom_not_send: Default::default(),
        }
    }

    /// Runs `query` with a shared reference to the resource.
    #[inline]
    pub fn execute_query<R>(&self, query: impl FnOnce(&T) -> R) -> R
    where
        R: VaultSafe,
    {
        // SAFETY: - This guard holds the exclusive loan. The shared borrow of the guard
        //           excludes the mutable callbacks.
        query(unsafe { self.resource.readonly_value_ref() })
    }

    /// Runs `query` with a shared reference to the resource and to `ancillary`.
    #[inline]
    pub fn execute_query_with<A, R>(&self, ancillary: &A, query: impl FnOnce(&T, &A) -> R) -> R
    where
        A: ?Sized + VaultSafe + Sync,
        R: VaultSafe,
    {
        self.execute_query(|resource| query(resource, ancillary))
    }

    /// Runs `action` with a mutable reference to the resource.
    #[inline]
    pub fn execute_action(&mut self, action: impl FnOnce(&mut T)) {
        self.execute_mixed(action)
    }

    /// Runs `action` with a mutable reference to the resource and a shared reference to
    /// `ancillary`.
    #[inline]
    pub fn execute_action_with<A>(&mut self, ancillary: &A, action: impl FnOnce(&mut T, &A))
    where
        A: ?Sized + VaultSafe + Sync,
    {
        self.execute_mixed(|resource| action(resource, ancillary))
    }

    /// Runs `mixed` with a mutable reference to the resource and returns its result.
    #[inline]
    pub fn execute_mixed<R>(&mut self, mixed: impl FnOnce(&mut T) -> R) -> R
    where
        R: VaultSafe,
    {
        // SAFETY: - This guard holds the exclusive loan and is borrowed mutably.
        mixed(unsafe { self.resource.value_ref() })
    }

    /// Runs `mixed` with a mutable reference to the resource and a shared reference to
    /// `ancillary`, and returns its result.
    #[inline]
    pub fn execute_mixed_with<A, R>(
        &mut self,
        ancillary: &A,
        mixed: impl FnOnce(&mut T, &A) -> R,
    ) -> R
    where
        A: ?Sized + VaultSafe + Sync,
        R: VaultSafe,
    {
        self.execute_mixed(|resource| mixed(resource, ancillary))
    }

    /// Releases the loan before the end of the scope.
    pub fn unlock(self) {
        self.loan.dispose();
    }
}

impl<T> Debug for ResourceGuard<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("loan", &self.loan)
            .finish_non_exhaustive()
    }
}
