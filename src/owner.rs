use std::{
    ptr,
    sync::atomic::{AtomicUsize, Ordering::Relaxed},
};


/// Returns an ID for the calling thread.
///
/// The ID is the address of a thread-local byte, so it is never 0 and no two live
/// threads share it. A thread that starts after another one terminated may observe the
/// same ID. That is only visible if the terminated thread leaked a guard, in which case
/// the loan is morally handed over to the new thread.
#[inline(always)]
pub(crate) fn current_thread_id() -> usize {
    thread_local!(static THREAD_MARKER: u8 = const { 0 });
    THREAD_MARKER.with(|marker| ptr::from_ref(marker).addr())
}

/// Records which thread holds an exclusive loan.
///
/// Invariant: a non-zero value is only ever stored by the thread it identifies, and only
/// while that thread holds the loan. A thread observing its own ID therefore knows that
/// it holds the loan, even with relaxed loads.
pub(crate) struct Owner {
    thread_id: AtomicUsize,
}

impl Owner {
    pub(crate) const fn vacant() -> Self {
        Self {
            thread_id: AtomicUsize::new(0),
        }
    }

    /// Marks the calling thread as the holder.
    ///
    /// Must only be called right after the loan has been claimed.
    #[inline]
    pub(crate) fn occupy(&self) {
        debug_assert_eq!(self.thread_id.load(Relaxed), 0);
        self.thread_id.store(current_thread_id(), Relaxed);
    }

    /// Clears the holder. Must be called by the holder before the loan is released.
    #[inline]
    pub(crate) fn vacate(&self) {
        debug_assert_eq!(self.thread_id.load(Relaxed), current_thread_id());
        self.thread_id.store(0, Relaxed);
    }

    #[inline]
    pub(crate) fn is_current_thread(&self) -> bool {
        self.thread_id.load(Relaxed) == current_thread_id()
    }
}
