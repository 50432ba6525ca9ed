//! Private keys held by a wallet.
//!
//! Encryption keys perform ECDH key agreement with a peer, derive a symmetric key from the
//! shared secret and seal or open AES-GCM messages. Signing keys produce ECDSA signatures.
//! Either kind can be handed to upper layers as a [WalletPrivateKey].
pub mod cipher;
pub mod encryption;
pub mod hardware;
pub mod kdf;
pub mod signing;
pub mod software;
pub mod wallet;

use crate::definitions::device_engagement;
use crate::definitions::device_key::{cose_key, EC2Curve};

pub use encryption::{P256EncryptionKey, P384EncryptionKey, P521EncryptionKey, WalletEncryptionKey};
pub use hardware::{AccessControl, Accessibility, SecureElement, SecureElementKey};
pub use kdf::{HashAlgorithm, SharedSecret, SymmetricKey};
pub use signing::{P256SigningKey, P384SigningKey, WalletSigningKey};
pub use software::{cose_key_to_der, SoftwareKey};
pub use wallet::{
    encryption_key_for, generate_encryption_key, generate_hardware_encryption_key,
    CoseKeyExchange, WalletPrivateKey,
};

/// Failures of key agreement, derivation, encryption and signing.
///
/// Messages never carry key material.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("remote public key is not a valid {0} point")]
    InvalidPublicKey(EC2Curve),
    #[error("unable to encode the {0} public key")]
    PublicKeyEncoding(EC2Curve),
    #[error("private key is not valid for {0}")]
    InvalidPrivateKey(EC2Curve),
    #[error("expected a {expected} key, received a {actual} key")]
    CurveMismatch { expected: EC2Curve, actual: EC2Curve },
    #[error("{0} is not supported for this operation")]
    UnsupportedCurve(EC2Curve),
    #[error("key derivation failed")]
    KeyDerivation,
    #[error("encryption failed")]
    Encryption,
    #[error("decryption failed")]
    Decryption,
    #[error("ciphertext of {0} bytes is shorter than a nonce and a tag")]
    CiphertextTooShort(usize),
    #[error("secure element unavailable: {0}")]
    HardwareUnavailable(String),
    #[error("user authentication was denied")]
    AuthenticationDenied,
    #[error("signing failed")]
    Signing,
    #[error(transparent)]
    CoseKey(#[from] cose_key::Error),
    #[error(transparent)]
    Security(#[from] device_engagement::Error),
}

impl Error {
    /// Failures the caller should treat as a security event rather than bad input.
    pub fn is_cryptographic(&self) -> bool {
        !matches!(self, Error::CoseKey(_) | Error::Security(_))
    }
}
