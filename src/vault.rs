use {
    crate::{
        CancellationToken, LockRequest, Monitor, Spin, Strategy, VaultError, VaultOptions,
        VaultSafe, exclusive::Exclusive, loan::Loan, resource::ResourceBox,
    },
    debug_fn::debug_fn,
    opera::PhantomNotSend,
    static_assertions::{assert_impl_all, assert_not_impl_any},
    std::{
        fmt::{Debug, Formatter},
        ops::{Deref, DerefMut},
        time::Duration,
    },
};


/// An exclusive vault around a plain value.
///
/// The value can only be reached through a [`ValueGuard`], and at most one guard exists
/// at a time. The strategy parameter selects how waiting threads behave; use the
/// [`SpinVault`] and [`MonitorVault`] aliases.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use lock_vault::MonitorVault;
///
/// let vault = MonitorVault::new(0u64, Duration::from_millis(500));
/// std::thread::scope(|s| {
///     for _ in 0..3 {
///         s.spawn(|| {
///             for _ in 0..100 {
///                 *vault.lock().unwrap() += 1;
///             }
///         });
///     }
/// });
/// assert_eq!(vault.copy_value().unwrap(), 300);
/// ```
pub struct Vault<T, S> {
    core: Exclusive<T, S>,
}

/// A [`Vault`] whose waiting threads spin.
pub type SpinVault<T> = Vault<T, Spin>;

/// A [`Vault`] whose waiting threads park on a condition variable.
pub type MonitorVault<T> = Vault<T, Monitor>;

/// A scoped exclusive loan on a [`Vault`].
///
/// The guard dereferences to the protected value. Values copied out of it are
/// independent snapshots; mutating them never affects the protected value.
///
/// Dropping the guard, or calling [`unlock`](Self::unlock), releases the loan.
#[must_use = "the vault is unlocked as soon as the guard is dropped"]
pub struct ValueGuard<'a, T> {
    resource: &'a ResourceBox<T>,
    loan: Loan<'a>,
    _phantom_not_send: PhantomNotSend,
}

assert_impl_all!(Vault<Vec<u8>, Spin>: Send, Sync);
assert_impl_all!(Vault<Vec<u8>, Monitor>: Send, Sync);
assert_not_impl_any!(Vault<std::rc::Rc<u8>, Monitor>: Send, Sync);
assert_not_impl_any!(ValueGuard<'static, u8>: Send, Sync, Clone);

impl<T, S> Vault<T, S>
where
    T: VaultSafe,
    S: Strategy,
{
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
    pub fn with_options(value: T, options: VaultOptions) -> Self {
        Self {
            core: Exclusive::new(value, options),
        }
    }

    /// Acquires the vault, waiting for at most the default timeout.
    ///
    /// # Errors
    ///
    /// - [`VaultError::TimedOut`] if the vault did not become available in time.
    /// - [`VaultError::AlreadyHeldByThisThread`] if the calling thread holds a guard.
    /// - [`VaultError::InvalidArgument`] if the default timeout is zero.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use lock_vault::SpinVault;
    ///
    /// let vault = SpinVault::new(String::from("a"), Duration::from_millis(100));
    /// let mut guard = vault.lock().unwrap();
    /// guard.push('b');
    /// assert!(vault.lock().is_err());
    /// drop(guard);
    /// assert_eq!(*vault.lock().unwrap(), "ab");
    /// ```
    pub fn lock(&self) -> Result<ValueGuard<'_, T>, VaultError> {
        self.lock_with(LockRequest::new())
    }

    /// Acquires the vault, waiting for at most `timeout`.
    pub fn try_lock_for(&self, timeout: Duration) -> Result<ValueGuard<'_, T>, VaultError> {
        self.lock_with(LockRequest::timeout(timeout))
    }

    /// Acquires the vault, waiting for at most the default timeout or until `token` is
    /// cancelled.
    pub fn lock_cancellable(
        &self,
        token: &CancellationToken,
    ) -> Result<ValueGuard<'_, T>, VaultError> {
        self.lock_with(LockRequest::new().cancel_with(token))
    }

    /// Acquires the vault as described by `request`.
    pub fn lock_with(&self, request: LockRequest<'_>) -> Result<ValueGuard<'_, T>, VaultError> {
        let loan = self.core.acquire(request)?;
        Ok(ValueGuard::new(self.core.resource(), loan))
    }

    /// Acquires the vault without a timeout.
    ///
    /// # Errors
    ///
    /// - [`VaultError::AlreadyHeldByThisThread`] if the calling thread holds a guard.
    pub fn lock_block_forever(&self) -> Result<ValueGuard<'_, T>, VaultError> {
        self.lock_with(LockRequest::forever())
    }

    /// Acquires the vault if it is available right now.
    ///
    /// Returns `Ok(None)` if another thread holds it.
    pub fn try_lock(&self) -> Result<Option<ValueGuard<'_, T>>, VaultError> {
        let loan = self.core.try_acquire()?;
        Ok(loan.map(|loan| ValueGuard::new(self.core.resource(), loan)))
    }

    /// Returns a copy of the protected value, waiting for at most the default timeout.
    pub fn copy_value(&self) -> Result<T, VaultError>
    where
        T: Clone,
    {
        self.copy_value_with(LockRequest::new())
    }

    /// Returns a copy of the protected value, waiting for at most `timeout`.
    pub fn copy_value_for(&self, timeout: Duration) -> Result<T, VaultError>
    where
        T: Clone,
    {
        self.copy_value_with(LockRequest::timeout(timeout))
    }

    fn copy_value_with(&self, request: LockRequest<'_>) -> Result<T, VaultError>
    where
        T: Clone,
    {
        Ok(self.lock_with(request)?.snapshot())
    }

    /// Replaces the protected value, waiting for at most the default timeout.
    ///
    /// The previous value is dropped after the vault has been released.
    pub fn set_value(&self, value: T) -> Result<(), VaultError> {
        self.set_value_with(LockRequest::new(), value)
    }

    /// Replaces the protected value, waiting for at most `timeout`.
    pub fn set_value_for(&self, timeout: Duration, value: T) -> Result<(), VaultError> {
        self.set_value_with(LockRequest::timeout(timeout), value)
    }

    fn set_value_with(&self, request: LockRequest<'_>, value: T) -> Result<(), VaultError> {
        let old = {
            let mut guard = self.lock_with(request)?;
            std::mem::replace(&mut *guard, value)
        };
        drop(old);
        Ok(())
    }
}

impl<T, S: Strategy> Vault<T, S> {
    /// Returns the timeout used by calls that do not pass one.
    pub fn default_timeout(&self) -> Duration {
        self.core.options().default_timeout()
    }

    /// Returns the options the vault was created with.
    pub fn options(&self) -> &VaultOptions {
        self.core.options()
    }

    /// Returns whether any thread holds a guard.
    pub fn is_locked(&self) -> bool {
        self.core.is_locked()
    }

    /// Returns whether the calling thread holds a guard.
    pub fn is_locked_by_current_thread(&self) -> bool {
        self.core.is_locked_by_current_thread()
    }

    /// Returns a mutable reference to the protected value.
    ///
    /// No locking is needed since the vault is borrowed mutably.
    pub fn get_mut(&mut self) -> &mut T {
        self.core.get_mut()
    }

    /// Consumes the vault and returns the protected value.
    pub fn into_inner(self) -> T {
        self.core.into_inner()
    }
}

impl<T, S> Default for Vault<T, S>
where
    T: VaultSafe + Default,
    S: Strategy,
{
    fn default() -> Self {
        Self::with_options(T::default(), VaultOptions::default())
    }
}

impl<T, S> Debug for Vault<T, S>
where
    T: VaultSafe + Debug,
    S: Strategy,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field(
                "value",
                &debug_fn(|fmt| match self.try_lock() {
                    Ok(Some(guard)) => Debug::fmt(&*guard, fmt),
                    _ => fmt.write_str("<locked>"),
                }),
            )
            .field("default_timeout", &self.default_timeout())
            .finish_non_exhaustive()
    }
}

impl<'a, T> ValueGuard<'a, T> {
    pub(crate) fn new(resource: &'a ResourceBox<T>, loan: Loan<'a>) -> Self {
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

impl<T> Deref for ValueGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: - This guard holds the exclusive loan, and the shared borrow of the
        //           guard excludes any reference handed out by deref_mut.
        unsafe { self.resource.readonly_value_ref() }
    }
}

impl<T> DerefMut for ValueGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: - This guard holds the exclusive loan and is borrowed mutably.
        unsafe { self.resource.value_ref() }
    }
}

impl<T: Debug> Debug for ValueGuard<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueGuard")
            .field("value", &**self)
            .finish_non_exhaustive()
    }
}
