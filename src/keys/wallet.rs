use std::fmt;

use super::encryption::{
    P256EncryptionKey, P384EncryptionKey, P521EncryptionKey, WalletEncryptionKey,
};
use super::hardware::{AccessControl, SecureElement};
use super::signing::WalletSigningKey;
use super::software::SoftwareKey;
use super::Error;
use crate::definitions::device_key::{CoseKey, CoseKeyPrivate, EC2Curve};
use crate::definitions::Security;

/// Any private key a wallet holds, so callers can accept "a private key" regardless of
/// what it is able to do.
pub enum WalletPrivateKey {
    Signing(Box<dyn WalletSigningKey>),
    Encryption(Box<dyn WalletEncryptionKey>),
}

impl WalletPrivateKey {
    pub fn curve(&self) -> EC2Curve {
        match self {
            WalletPrivateKey::Signing(key) => key.curve(),
            WalletPrivateKey::Encryption(key) => key.curve(),
        }
    }

    pub fn public_cose_key(&self) -> Result<CoseKey, Error> {
        match self {
            WalletPrivateKey::Signing(key) => key.public_cose_key(),
            WalletPrivateKey::Encryption(key) => key.public_cose_key(),
        }
    }

    pub fn as_encryption(&self) -> Option<&dyn WalletEncryptionKey> {
        match self {
            WalletPrivateKey::Encryption(key) => Some(key.as_ref()),
            WalletPrivateKey::Signing(_) => None,
        }
    }

    pub fn as_signing(&self) -> Option<&dyn WalletSigningKey> {
        match self {
            WalletPrivateKey::Signing(key) => Some(key.as_ref()),
            WalletPrivateKey::Encryption(_) => None,
        }
    }
}

impl fmt::Debug for WalletPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            WalletPrivateKey::Signing(_) => "Signing",
            WalletPrivateKey::Encryption(_) => "Encryption",
        };
        f.debug_tuple(kind).field(&self.curve()).finish()
    }
}

impl From<Box<dyn WalletSigningKey>> for WalletPrivateKey {
    fn from(key: Box<dyn WalletSigningKey>) -> Self {
        WalletPrivateKey::Signing(key)
    }
}

impl From<Box<dyn WalletEncryptionKey>> for WalletPrivateKey {
    fn from(key: Box<dyn WalletEncryptionKey>) -> Self {
        WalletPrivateKey::Encryption(key)
    }
}

/// A private key together with the COSE form of its public key, as advertised during
/// device engagement.
#[derive(Debug)]
pub struct CoseKeyExchange {
    pub public_key: CoseKey,
    pub private_key: WalletPrivateKey,
}

impl CoseKeyExchange {
    pub fn new(private_key: WalletPrivateKey) -> Result<Self, Error> {
        Ok(Self {
            public_key: private_key.public_cose_key()?,
            private_key,
        })
    }

    /// A fresh software key agreement key on `curve`.
    pub fn generate(curve: EC2Curve) -> Result<Self, Error> {
        Self::new(WalletPrivateKey::Encryption(generate_encryption_key(curve)))
    }

    /// The device engagement `Security` structure advertising this key.
    pub fn security(&self) -> Result<Security, Error> {
        Ok(Security::new(self.public_key.clone())?)
    }
}

/// A fresh software key agreement key on `curve`.
pub fn generate_encryption_key(curve: EC2Curve) -> Box<dyn WalletEncryptionKey> {
    match curve {
        EC2Curve::P256 => Box::new(P256EncryptionKey::random()),
        EC2Curve::P384 => Box::new(P384EncryptionKey::random()),
        EC2Curve::P521 => Box::new(P521EncryptionKey::random()),
    }
}

/// A key agreement key created inside `store`. Only P-256 is available in hardware.
pub fn generate_hardware_encryption_key(
    store: &dyn SecureElement,
    curve: EC2Curve,
    access_control: AccessControl,
) -> Result<Box<dyn WalletEncryptionKey>, Error> {
    match curve {
        EC2Curve::P256 => Ok(Box::new(P256EncryptionKey::generate_in_secure_element(
            store,
            access_control,
        )?)),
        other => Err(Error::UnsupportedCurve(other)),
    }
}

/// The key agreement key held in a private COSE key.
pub fn encryption_key_for(key: &CoseKeyPrivate) -> Result<Box<dyn WalletEncryptionKey>, Error> {
    let encryption_key: Box<dyn WalletEncryptionKey> = match key.curve() {
        EC2Curve::P256 => Box::new(P256EncryptionKey::from_software(
            SoftwareKey::from_cose_key(key)?,
        )),
        EC2Curve::P384 => Box::new(P384EncryptionKey::from_cose_key(key)?),
        EC2Curve::P521 => Box::new(P521EncryptionKey::from_cose_key(key)?),
    };
    Ok(encryption_key)
}
