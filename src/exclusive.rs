use {
    crate::{
        LockMode, LockRequest, Strategy, VaultError, VaultOptions,
        loan::{Loan, Loaned, Release},
        owner::Owner,
        resolve::{self, Claim, Resolver},
        resource::ResourceBox,
    },
    std::time::Duration,
};


/// The state shared by [`Vault`](crate::Vault) and
/// [`MutableVault`](crate::MutableVault).
pub(crate) struct Exclusive<T, S> {
    // Invariants:
    // 1. resource is on loan if and only if strategy is claimed by this vault
    // 2. owner is the thread holding the loan while it is on loan and 0 otherwise
    strategy: S,
    owner: Owner,
    options: VaultOptions,
    resource: ResourceBox<T>,
}

// SAFETY: - Access to resource is serialized by the strategy, so sharing the vault can
//           be modeled as moving the value between the threads that lock it.
unsafe impl<T: Send, S: Strategy> Sync for Exclusive<T, S> {}

struct StrategyClaim<'a, S>(&'a S);

impl<S: Strategy> Claim for StrategyClaim<'_, S> {
    #[inline]
    fn try_claim(&mut self) -> bool {
        self.0.try_claim()
    }

    #[inline]
    fn wait(&mut self, step: u32, hint: Option<Duration>) {
        self.0.wait(step, hint)
    }
}

impl<T, S: Strategy> Exclusive<T, S> {
    pub(crate) fn new(value: T, options: VaultOptions) -> Self {
        Self {
            strategy: S::new(&options),
            owner: Owner::vacant(),
            options,
            resource: ResourceBox::new(value),
        }
    }

    pub(crate) fn options(&self) -> &VaultOptions {
        &self.options
    }

    pub(crate) fn resource(&self) -> &ResourceBox<T> {
        &self.resource
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.strategy.is_claimed()
    }

    pub(crate) fn is_locked_by_current_thread(&self) -> bool {
        self.owner.is_current_thread()
    }

    fn check_reentrancy(&self) -> Result<(), VaultError> {
        if self.owner.is_current_thread() {
            tracing::debug!("rejected reentrant exclusive lock");
            return Err(VaultError::AlreadyHeldByThisThread {
                held: LockMode::Exclusive,
                requested: LockMode::Exclusive,
            });
        }
        Ok(())
    }

    /// Waits for the loan as described by `request`.
    pub(crate) fn acquire(&self, request: LockRequest<'_>) -> Result<Loan<'_>, VaultError> {
        let timeout = request.resolve_timeout(self.options.default_timeout)?;
        self.check_reentrancy()?;
        let resolver = Resolver::new(
            &*self.options.clock,
            timeout,
            request.cancellation(),
            self.options.cancel_poll_interval,
        );
        resolve::acquire(
            &mut StrategyClaim(&self.strategy),
            &resolver,
            LockMode::Exclusive,
        )?;
        Ok(self.loan_after_claim())
    }

    /// Claims the loan if it is available right now.
    pub(crate) fn try_acquire(&self) -> Result<Option<Loan<'_>>, VaultError> {
        self.check_reentrancy()?;
        Ok(self
            .strategy
            .try_claim()
            .then(|| self.loan_after_claim()))
    }

    /// Must only be called right after the strategy has been claimed.
    fn loan_after_claim(&self) -> Loan<'_> {
        self.owner.occupy();
        self.resource.lend();
        Loan::new(self, Loaned::Exclusive)
    }

    pub(crate) fn get_mut(&mut self) -> &mut T {
        self.resource.get_mut()
    }

    pub(crate) fn into_inner(self) -> T {
        self.resource.into_inner()
    }
}

impl<T, S: Strategy> Release for Exclusive<T, S> {
    fn release(&self, loaned: Loaned) {
        debug_assert_eq!(loaned, Loaned::Exclusive);
        self.resource.reclaim();
        self.owner.vacate();
        // SAFETY: - Loans are only created by loan_after_claim, and the loan being
        //           released is the one that claimed the strategy.
        unsafe {
            self.strategy.release();
        }
        tracing::trace!(mode = %LockMode::Exclusive, "lock released");
    }
}
