use std::{hint, thread, time::Duration};

#[cfg(test)]
mod tests;

/// Number of doubling rounds a pure spin performs before it starts yielding.
const SPIN_LIMIT: u32 = 6;

/// How a [`Spin`](crate::Spin) vault waits between two claim attempts.
///
/// Every pause is additionally bounded by the time left until the deadline and, if a
/// cancellation token is present, by the cancellation poll interval.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Backoff {
    /// Busy-wait with an exponentially growing number of spin-loop hints, then yield
    /// the time slice. Never sleeps.
    #[default]
    Spin,
    /// Sleep for the same duration after every failed attempt.
    Fixed(Duration),
    /// Sleep for `initial`, doubling after every failed attempt up to `max`.
    Exponential {
        /// The first pause.
        initial: Duration,
        /// The longest pause.
        max: Duration,
    },
}

impl Backoff {
    /// Returns how long the thread sleeps after the `step`th failed attempt, or `None`
    /// if this policy does not sleep.
    pub fn delay(&self, step: u32) -> Option<Duration> {
        match *self {
            Backoff::Spin => None,
            Backoff::Fixed(delay) => Some(delay),
            Backoff::Exponential { initial, max } => {
                Some(initial.saturating_mul(1 << step.min(31)).min(max))
            }
        }
    }

    /// Pauses the calling thread after the `step`th failed attempt.
    pub(crate) fn pause(&self, step: u32, bound: Option<Duration>) {
        match self.delay(step) {
            Some(delay) => {
                let delay = bound.map_or(delay, |bound| delay.min(bound));
                if delay.is_zero() {
                    thread::yield_now();
                } else {
                    thread::sleep(delay);
                }
            }
            None if step < SPIN_LIMIT => {
                for _ in 0..1u32 << step {
                    hint::spin_loop();
                }
            }
            None => thread::yield_now(),
        }
    }
}
