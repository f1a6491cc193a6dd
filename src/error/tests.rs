use {
    crate::{LockMode, VaultError},
    std::time::Duration,
};

#[test]
fn display() {
    let err = VaultError::AlreadyHeldByThisThread {
        held: LockMode::UpgradableRead,
        requested: LockMode::Write,
    };
    assert_eq!(
        err.to_string(),
        "this thread already holds the vault in upgradable read mode and requested write mode",
    );
    assert_eq!(
        VaultError::TimedOut(Duration::from_millis(10)).to_string(),
        "timed out after 10ms waiting for the lock",
    );
    assert_eq!(
        VaultError::InvalidArgument("timeout must be positive").to_string(),
        "invalid argument: timeout must be positive",
    );
}

#[test]
fn classification() {
    let timed_out = VaultError::TimedOut(Duration::from_secs(1));
    assert!(timed_out.is_timeout());
    assert!(!timed_out.is_cancelled());
    assert!(timed_out.is_recoverable());

    assert!(VaultError::Cancelled.is_cancelled());
    assert!(VaultError::Cancelled.is_recoverable());

    for err in [
        VaultError::InvalidArgument("x"),
        VaultError::InvalidHandleState("x"),
        VaultError::AlreadyHeldByThisThread {
            held: LockMode::Exclusive,
            requested: LockMode::Exclusive,
        },
    ] {
        assert!(!err.is_recoverable());
    }
}
