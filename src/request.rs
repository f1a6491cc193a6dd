use {
    crate::{CancellationToken, VaultError},
    std::time::Duration,
};


/// How long an acquisition may wait.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Wait {
    /// Wait for the vault's default timeout.
    #[default]
    DefaultTimeout,
    /// Wait for the given duration. Must not be zero.
    Timeout(Duration),
    /// Wait until the loan becomes available.
    Forever,
}

/// Parameters of a single acquisition.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use lock_vault::{CancellationToken, LockRequest, MonitorVault};
///
/// let vault = MonitorVault::new(1, Duration::from_secs(1));
/// let token = CancellationToken::new();
/// let request = LockRequest::timeout(Duration::from_millis(100)).cancel_with(&token);
/// assert_eq!(*vault.lock_with(request).unwrap(), 1);
/// ```
#[derive(Copy, Clone, Debug, Default)]
pub struct LockRequest<'c> {
    wait: Wait,
    cancel: Option<&'c CancellationToken>,
}

impl<'c> LockRequest<'c> {
    /// A request that waits for the default timeout and cannot be cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// A request that waits for at most `timeout`.
    pub fn timeout(timeout: Duration) -> Self {
        Self {
            wait: Wait::Timeout(timeout),
            cancel: None,
        }
    }

    /// A request that waits until the loan becomes available.
    pub fn forever() -> Self {
        Self {
            wait: Wait::Forever,
            cancel: None,
        }
    }

    /// Makes the request abort once `token` is cancelled.
    pub fn cancel_with(self, token: &'c CancellationToken) -> Self {
        Self {
            cancel: Some(token),
            ..self
        }
    }

    /// Returns how long the request is willing to wait.
    pub fn wait(&self) -> Wait {
        self.wait
    }

    /// Returns the token that aborts the request, if any.
    pub fn cancellation(&self) -> Option<&'c CancellationToken> {
        self.cancel
    }

    /// Resolves the timeout of this request.
    ///
    /// Returns `None` for requests that wait forever.
    pub(crate) fn resolve_timeout(
        &self,
        default_timeout: Duration,
    ) -> Result<Option<Duration>, VaultError> {
        let timeout = match self.wait {
            Wait::DefaultTimeout => default_timeout,
            Wait::Timeout(timeout) => timeout,
            Wait::Forever => return Ok(None),
        };
        if timeout.is_zero() {
            return Err(VaultError::InvalidArgument("timeout must be positive"));
        }
        Ok(Some(timeout))
    }
}
