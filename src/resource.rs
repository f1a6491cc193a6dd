use std::{
    cell::UnsafeCell,
    sync::atomic::{AtomicBool, Ordering::Relaxed},
};


/// The container a vault keeps its protected value in.
///
/// The box never hands out its value on its own. Vaults call [`lend`](Self::lend) after
/// claiming an exclusive or write loan and [`reclaim`](Self::reclaim) before releasing
/// it. Read loans do not touch the flag.
pub(crate) struct ResourceBox<T: ?Sized> {
    on_loan: AtomicBool,
    value: UnsafeCell<T>,
}

impl<T> ResourceBox<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            on_loan: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    pub(crate) fn into_inner(self) -> T {
        debug_assert!(!self.on_loan.load(Relaxed));
        self.value.into_inner()
    }
}

impl<T: ?Sized> ResourceBox<T> {
    /// Marks the box as lent out.
    ///
    /// The flag is written under the vault's lock, so relaxed ordering suffices.
    #[inline]
    pub(crate) fn lend(&self) {
        let was_on_loan = self.on_loan.swap(true, Relaxed);
        debug_assert!(!was_on_loan, "resource lent out twice");
    }

    #[inline]
    pub(crate) fn reclaim(&self) {
        let was_on_loan = self.on_loan.swap(false, Relaxed);
        debug_assert!(was_on_loan, "resource reclaimed without a loan");
    }

    #[inline]
    pub(crate) fn is_on_loan(&self) -> bool {
        self.on_loan.load(Relaxed)
    }

    /// # Safety
    ///
    /// - The caller must hold the exclusive or write loan of the owning vault for the
    ///   lifetime of the returned reference.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn value_ref(&self) -> &mut T {
        // SAFETY: - The loan guarantees that no other reference to the value exists.
        unsafe { &mut *self.value.get() }
    }

    /// # Safety
    ///
    /// - The caller must hold a loan of the owning vault for the lifetime of the
    ///   returned reference, and no exclusive reference may be alive.
    #[inline]
    pub(crate) unsafe fn readonly_value_ref(&self) -> &T {
        // SAFETY: - Read loans exclude write loans, so the value is not mutated while
        //           the reference is alive.
        unsafe { &*self.value.get() }
    }

    pub(crate) fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }
}
