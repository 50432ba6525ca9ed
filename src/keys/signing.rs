//! ECDSA keys used to sign on behalf of the wallet.
use std::fmt;

use signature::Signer;

use super::Error;
use crate::definitions::device_key::{CoseKey, EC2Curve};

/// A private key able to produce ECDSA signatures over SHA-2.
pub trait WalletSigningKey: Send + Sync {
    fn curve(&self) -> EC2Curve;

    /// `0x04 || X || Y`
    fn public_key_x963(&self) -> Vec<u8>;

    /// Fixed size `r || s` signature.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, Error>;

    /// ASN.1 DER signature.
    fn sign_der(&self, message: &[u8]) -> Result<Vec<u8>, Error>;

    fn public_cose_key(&self) -> Result<CoseKey, Error> {
        Ok(CoseKey::from_x963(self.curve(), &self.public_key_x963())?)
    }
}

macro_rules! signing_key {
    ($name:ident, $curve:ident, $crv:expr) => {
        #[derive(Clone)]
        pub struct $name($curve::ecdsa::SigningKey);

        impl $name {
            pub fn random() -> Self {
                tracing::debug!(curve = %$crv, "generating signing key");
                Self($curve::ecdsa::SigningKey::random(&mut rand::rngs::OsRng))
            }

            /// From the big-endian private scalar.
            pub fn from_bytes(scalar: &[u8]) -> Result<Self, Error> {
                $curve::ecdsa::SigningKey::from_slice(scalar)
                    .map(Self)
                    .map_err(|_| Error::InvalidPrivateKey($crv))
            }

            pub fn verifying_key(&self) -> &$curve::ecdsa::VerifyingKey {
                self.0.verifying_key()
            }

            fn signature(&self, message: &[u8]) -> Result<$curve::ecdsa::Signature, Error> {
                self.0.try_sign(message).map_err(|_| Error::Signing)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }

        impl WalletSigningKey for $name {
            fn curve(&self) -> EC2Curve {
                $crv
            }

            fn public_key_x963(&self) -> Vec<u8> {
                self.0
                    .verifying_key()
                    .to_encoded_point(false)
                    .as_bytes()
                    .to_vec()
            }

            fn sign(&self, message: &[u8]) -> Result<Vec<u8>, Error> {
                Ok(self.signature(message)?.to_bytes().to_vec())
            }

            fn sign_der(&self, message: &[u8]) -> Result<Vec<u8>, Error> {
                Ok(self.signature(message)?.to_der().as_bytes().to_vec())
            }
        }
    };
}

signing_key!(P256SigningKey, p256, EC2Curve::P256);
signing_key!(P384SigningKey, p384, EC2Curve::P384);

#[cfg(test)]
mod test {
    use super::*;
    use signature::Verifier;

    #[test]
    fn p256_signature_verifies() {
        let key = P256SigningKey::random();
        let raw = key.sign(b"device authentication").unwrap();
        assert_eq!(raw.len(), 64);
        let signature = p256::ecdsa::Signature::from_slice(&raw).unwrap();
        key.verifying_key()
            .verify(b"device authentication", &signature)
            .unwrap();

        let der = key.sign_der(b"device authentication").unwrap();
        let signature = p256::ecdsa::Signature::from_der(&der).unwrap();
        key.verifying_key()
            .verify(b"device authentication", &signature)
            .unwrap();
    }

    #[test]
    fn p384_signature_verifies() {
        let key = P384SigningKey::random();
        let raw = key.sign(b"reader authentication").unwrap();
        assert_eq!(raw.len(), 96);
        let signature = p384::ecdsa::Signature::from_slice(&raw).unwrap();
        assert!(key
            .verifying_key()
            .verify(b"other message", &signature)
            .is_err());
    }

    #[test]
    fn public_cose_key_matches_verifying_key() {
        let key = P384SigningKey::random();
        let cose = key.public_cose_key().unwrap();
        assert_eq!(cose.crv, EC2Curve::P384);
        assert_eq!(cose.to_x963(), key.public_key_x963());
    }

    #[test]
    fn from_bytes_roundtrip() {
        let key = P256SigningKey::from_bytes(&[0x42; 32]).unwrap();
        let again = P256SigningKey::from_bytes(&[0x42; 32]).unwrap();
        assert_eq!(key.public_key_x963(), again.public_key_x963());
        assert!(matches!(
            P256SigningKey::from_bytes(&[0; 32]),
            Err(Error::InvalidPrivateKey(EC2Curve::P256))
        ));
    }
}
