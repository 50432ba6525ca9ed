//! Keys kept inside a secure co-processor.
//!
//! The private scalar of such a key never leaves the hardware, so a [SecureElementKey] only
//! exposes its public point and the operations performed with the scalar. Platform bindings
//! implement [SecureElement]; generating or restoring a key may block on user authentication
//! and may fail with [Error::HardwareUnavailable] or [Error::AuthenticationDenied]. No timeout
//! is applied here.
use super::{Error, SharedSecret};

/// When a hardware key may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Accessibility {
    #[default]
    WhenUnlockedThisDeviceOnly,
    AfterFirstUnlockThisDeviceOnly,
    WhenPasscodeSetThisDeviceOnly,
}

/// Access policy attached to a hardware key when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessControl {
    pub accessibility: Accessibility,
    /// Require biometric or passcode authentication on every use.
    pub user_presence: bool,
}

impl AccessControl {
    pub fn with_user_presence() -> Self {
        Self {
            user_presence: true,
            ..Default::default()
        }
    }
}

/// A key store able to create P-256 keys that never leave the device.
pub trait SecureElement: Send + Sync {
    fn is_available(&self) -> bool;

    fn generate_p256(&self, access_control: AccessControl)
        -> Result<Box<dyn SecureElementKey>, Error>;

    /// Reopens a key from its opaque [SecureElementKey::data_representation].
    fn restore_p256(&self, data_representation: &[u8]) -> Result<Box<dyn SecureElementKey>, Error>;
}

/// A P-256 private key held by a [SecureElement].
pub trait SecureElementKey: Send + Sync {
    /// `0x04 || X || Y`
    fn public_key_x963(&self) -> Vec<u8>;

    /// ECDH with an X9.63 encoded P-256 public key.
    fn shared_secret(&self, remote_x963: &[u8]) -> Result<SharedSecret, Error>;

    /// Opaque handle that lets the same store restore this key. It does not contain the
    /// private scalar in the clear.
    fn data_representation(&self) -> Vec<u8>;
}
