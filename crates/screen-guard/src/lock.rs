//! Device-admin screen lock

use crate::LockError;

/// Hard lock through a device-admin style capability
pub trait DeviceLock: Send + Sync {
    /// Whether the admin capability has been granted
    fn is_admin_active(&self) -> bool;

    /// Turn the screen off and lock now
    fn lock_now(&self) -> Result<(), LockError>;
}
