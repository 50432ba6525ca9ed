//! Key agreement keys used to encrypt messages to a peer.
//!
//! Both parties hold their own private key and the peer's public key. A message is encrypted
//! under a key derived with `sharedInfo = remote || local` and decrypted under one derived
//! with `sharedInfo = local || remote`, so each derived key is bound to one direction of
//! travel: a ciphertext only opens at the party it was sent to.
use std::fmt;

use elliptic_curve::sec1::{FromEncodedPoint, ModulusSize, ToEncodedPoint};
use elliptic_curve::{AffinePoint, FieldBytesSize, SecretKey};
use p256::NistP256;
use p384::NistP384;
use p521::NistP521;

use super::hardware::{AccessControl, SecureElement, SecureElementKey};
use super::kdf::{self, HashAlgorithm, SharedSecret, SymmetricKey};
use super::software::{der_to_x963, x963_to_der, NistCurve, SoftwareKey};
use super::{cipher, Error};
use crate::definitions::device_key::{CoseKey, EC2Curve};

/// A private key able to agree on secrets with a peer and encrypt to it.
///
/// The private scalar is never part of this interface, so hardware backed keys can
/// implement it.
pub trait WalletEncryptionKey: Send + Sync {
    fn curve(&self) -> EC2Curve;

    /// `0x04 || X || Y`
    fn public_key_x963(&self) -> Vec<u8>;

    /// SubjectPublicKeyInfo DER.
    fn public_key_der(&self) -> Result<Vec<u8>, Error>;

    /// ECDH with an X9.63 encoded public key on the same curve.
    fn shared_secret(&self, remote_x963: &[u8]) -> Result<SharedSecret, Error>;

    /// ECDH with a DER encoded public key on the same curve.
    fn shared_secret_from_der(&self, remote_der: &[u8]) -> Result<SharedSecret, Error>;

    /// The public key as `X || Y`. Empty if the key reports no point.
    fn public_key(&self) -> Vec<u8> {
        match self.public_key_x963().split_first() {
            Some((_, point)) => point.to_vec(),
            None => Vec::new(),
        }
    }

    /// Base64 of [WalletEncryptionKey::public_key_der].
    fn public_key_string(&self) -> Result<String, Error> {
        Ok(base64::encode(self.public_key_der()?))
    }

    fn public_cose_key(&self) -> Result<CoseKey, Error> {
        Ok(CoseKey::from_x963(self.curve(), &self.public_key_x963())?)
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::for_curve(self.curve())
    }

    /// X9.63 KDF over `secret`, with the hash and output length bound to the curve.
    fn derive_symmetric_key(
        &self,
        secret: &SharedSecret,
        shared_info: &[u8],
    ) -> Result<SymmetricKey, Error> {
        let hash = self.hash_algorithm();
        kdf::x963_derive(secret, hash, shared_info, hash.output_size())
    }

    /// ECDH with `remote_x963` followed by HKDF, with the hash and output length bound to
    /// the curve.
    fn hkdf_derived_symmetric_key(
        &self,
        salt: &[u8],
        remote_x963: &[u8],
        shared_info: &[u8],
    ) -> Result<SymmetricKey, Error> {
        let secret = self.shared_secret(remote_x963)?;
        let hash = self.hash_algorithm();
        kdf::hkdf_derive(&secret, hash, salt, shared_info, hash.output_size())
    }

    /// Encrypts `plaintext` to the holder of `remote_der`, returning `nonce || ciphertext || tag`.
    fn encrypt(&self, plaintext: &[u8], remote_der: &[u8]) -> Result<Vec<u8>, Error> {
        let secret = self.shared_secret_from_der(remote_der)?;
        let shared_info = [remote_der, &self.public_key_der()?].concat();
        let key = self.derive_symmetric_key(&secret, &shared_info)?;
        cipher::seal(&key, plaintext)
    }

    /// Decrypts a message the holder of `remote_der` encrypted to this key.
    fn decrypt(&self, ciphertext: &[u8], remote_der: &[u8]) -> Result<Vec<u8>, Error> {
        let secret = self.shared_secret_from_der(remote_der)?;
        let shared_info = [&self.public_key_der()?, remote_der].concat();
        let key = self.derive_symmetric_key(&secret, &shared_info)?;
        cipher::open(&key, ciphertext)
    }
}

impl<C> WalletEncryptionKey for SoftwareKey<C>
where
    C: NistCurve,
    AffinePoint<C>: FromEncodedPoint<C> + ToEncodedPoint<C>,
    FieldBytesSize<C>: ModulusSize,
    SecretKey<C>: Send + Sync,
{
    fn curve(&self) -> EC2Curve {
        SoftwareKey::curve(self)
    }

    fn public_key_x963(&self) -> Vec<u8> {
        SoftwareKey::public_key_x963(self)
    }

    fn public_key_der(&self) -> Result<Vec<u8>, Error> {
        SoftwareKey::public_key_der(self)
    }

    fn shared_secret(&self, remote_x963: &[u8]) -> Result<SharedSecret, Error> {
        SoftwareKey::shared_secret(self, remote_x963)
    }

    fn shared_secret_from_der(&self, remote_der: &[u8]) -> Result<SharedSecret, Error> {
        SoftwareKey::shared_secret_from_der(self, remote_der)
    }
}

pub type P384EncryptionKey = SoftwareKey<NistP384>;
pub type P521EncryptionKey = SoftwareKey<NistP521>;

/// P-256 key agreement key, held in memory or inside a [SecureElement].
pub struct P256EncryptionKey(P256Backing);

enum P256Backing {
    Software(SoftwareKey<NistP256>),
    SecureElement(Box<dyn SecureElementKey>),
}

impl fmt::Debug for P256EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("P256EncryptionKey")
            .field("hardware_backed", &self.is_hardware_backed())
            .finish_non_exhaustive()
    }
}

impl P256EncryptionKey {
    pub fn random() -> Self {
        Self(P256Backing::Software(SoftwareKey::random()))
    }

    pub fn from_software(key: SoftwareKey<NistP256>) -> Self {
        Self(P256Backing::Software(key))
    }

    /// Creates a key inside `store`. May block until the user authenticates.
    pub fn generate_in_secure_element(
        store: &dyn SecureElement,
        access_control: AccessControl,
    ) -> Result<Self, Error> {
        if !store.is_available() {
            return Err(Error::HardwareUnavailable(
                "no secure element on this device".to_string(),
            ));
        }
        tracing::debug!(?access_control, "generating secure element key");
        let key = store.generate_p256(access_control)?;
        Ok(Self(P256Backing::SecureElement(key)))
    }

    /// Reopens a key previously created in `store`.
    pub fn restore_from_secure_element(
        store: &dyn SecureElement,
        data_representation: &[u8],
    ) -> Result<Self, Error> {
        if !store.is_available() {
            return Err(Error::HardwareUnavailable(
                "no secure element on this device".to_string(),
            ));
        }
        tracing::debug!("restoring secure element key");
        let key = store.restore_p256(data_representation)?;
        Ok(Self(P256Backing::SecureElement(key)))
    }

    pub fn is_hardware_backed(&self) -> bool {
        matches!(self.0, P256Backing::SecureElement(_))
    }

    /// The handle needed to restore a hardware backed key.
    pub fn data_representation(&self) -> Option<Vec<u8>> {
        match &self.0 {
            P256Backing::Software(_) => None,
            P256Backing::SecureElement(key) => Some(key.data_representation()),
        }
    }
}

impl WalletEncryptionKey for P256EncryptionKey {
    fn curve(&self) -> EC2Curve {
        EC2Curve::P256
    }

    fn public_key_x963(&self) -> Vec<u8> {
        match &self.0 {
            P256Backing::Software(key) => key.public_key_x963(),
            P256Backing::SecureElement(key) => key.public_key_x963(),
        }
    }

    fn public_key_der(&self) -> Result<Vec<u8>, Error> {
        match &self.0 {
            P256Backing::Software(key) => key.public_key_der(),
            P256Backing::SecureElement(key) => x963_to_der::<NistP256>(&key.public_key_x963()),
        }
    }

    fn shared_secret(&self, remote_x963: &[u8]) -> Result<SharedSecret, Error> {
        match &self.0 {
            P256Backing::Software(key) => key.shared_secret(remote_x963),
            P256Backing::SecureElement(key) => key.shared_secret(remote_x963),
        }
    }

    fn shared_secret_from_der(&self, remote_der: &[u8]) -> Result<SharedSecret, Error> {
        match &self.0 {
            P256Backing::Software(key) => key.shared_secret_from_der(remote_der),
            P256Backing::SecureElement(key) => {
                key.shared_secret(&der_to_x963::<NistP256>(remote_der)?)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn keys() -> Vec<(Box<dyn WalletEncryptionKey>, Box<dyn WalletEncryptionKey>)> {
        vec![
            (
                Box::new(P256EncryptionKey::random()),
                Box::new(P256EncryptionKey::random()),
            ),
            (
                Box::new(P384EncryptionKey::random()),
                Box::new(P384EncryptionKey::random()),
            ),
            (
                Box::new(P521EncryptionKey::random()),
                Box::new(P521EncryptionKey::random()),
            ),
        ]
    }

    #[test]
    fn encrypt_decrypt_between_parties() {
        for (a, b) in keys() {
            let a_der = a.public_key_der().unwrap();
            let b_der = b.public_key_der().unwrap();
            let ciphertext = a.encrypt(b"family_name", &b_der).unwrap();
            assert_eq!(b.decrypt(&ciphertext, &a_der).unwrap(), b"family_name");
        }
    }

    #[test]
    fn ciphertext_does_not_open_at_sender() {
        for (a, b) in keys() {
            let b_der = b.public_key_der().unwrap();
            let ciphertext = a.encrypt(b"family_name", &b_der).unwrap();
            assert!(matches!(
                a.decrypt(&ciphertext, &b_der),
                Err(Error::Decryption)
            ));
        }
    }

    #[test]
    fn tampered_ciphertext_fails() {
        for (a, b) in keys() {
            let a_der = a.public_key_der().unwrap();
            let ciphertext = a.encrypt(b"portrait", &b.public_key_der().unwrap()).unwrap();
            for i in 0..ciphertext.len() * 8 {
                let mut tampered = ciphertext.clone();
                tampered[i / 8] ^= 1 << (i % 8);
                assert!(b.decrypt(&tampered, &a_der).is_err(), "bit {i} on {}", a.curve());
            }
        }
    }

    #[test]
    fn derived_keys_are_curve_bound() {
        for ((a, b), len) in keys().into_iter().zip([32, 48, 64]) {
            let secret = a.shared_secret(&b.public_key_x963()).unwrap();
            let infos: [&[u8]; 3] = [b"", b"info", &[0u8; 300]];
            for info in infos {
                assert_eq!(a.derive_symmetric_key(&secret, info).unwrap().len(), len);
                let hkdf = a
                    .hkdf_derived_symmetric_key(info, &b.public_key_x963(), b"SKDevice")
                    .unwrap();
                assert_eq!(hkdf.len(), len);
            }
        }
    }

    #[test]
    fn both_sides_derive_the_same_hkdf_key() {
        for (a, b) in keys() {
            let ab = a
                .hkdf_derived_symmetric_key(b"salt", &b.public_key_x963(), b"SKReader")
                .unwrap();
            let ba = b
                .hkdf_derived_symmetric_key(b"salt", &a.public_key_x963(), b"SKReader")
                .unwrap();
            assert_eq!(ab, ba);
        }
    }

    #[test]
    fn public_key_accessors_agree() {
        for (a, _) in keys() {
            let size = a.curve().coordinate_size();
            let x963 = a.public_key_x963();
            assert_eq!(x963.len(), 1 + 2 * size);
            assert_eq!(a.public_key(), x963[1..].to_vec());
            let cose = a.public_cose_key().unwrap();
            assert_eq!(cose.crv, a.curve());
            assert_eq!(cose.to_x963(), x963);
            let der = base64::decode(a.public_key_string().unwrap()).unwrap();
            assert_eq!(der, a.public_key_der().unwrap());
        }
    }

    #[test]
    fn remote_key_on_other_curve_fails() {
        let a = P256EncryptionKey::random();
        let b = P384EncryptionKey::random();
        assert!(matches!(
            a.encrypt(b"x", &b.public_key_der().unwrap()),
            Err(Error::InvalidPublicKey(EC2Curve::P256))
        ));
    }

    #[test]
    fn secure_element_key_without_a_point() {
        struct NoPoint;
        impl SecureElementKey for NoPoint {
            fn public_key_x963(&self) -> Vec<u8> {
                Vec::new()
            }

            fn shared_secret(&self, _: &[u8]) -> Result<SharedSecret, Error> {
                Err(Error::InvalidPublicKey(EC2Curve::P256))
            }

            fn data_representation(&self) -> Vec<u8> {
                Vec::new()
            }
        }

        let key = P256EncryptionKey(P256Backing::SecureElement(Box::new(NoPoint)));
        assert!(key.public_key().is_empty());
        assert!(matches!(
            key.public_key_der(),
            Err(Error::PublicKeyEncoding(EC2Curve::P256))
        ));
    }

    /// Secure element simulated with in-memory software keys.
    #[derive(Default)]
    struct Simulated {
        available: bool,
        deny: bool,
        keys: Mutex<HashMap<Vec<u8>, SoftwareKey<NistP256>>>,
    }

    struct SimulatedKey(SoftwareKey<NistP256>, Vec<u8>);

    impl SecureElementKey for SimulatedKey {
        fn public_key_x963(&self) -> Vec<u8> {
            self.0.public_key_x963()
        }

        fn shared_secret(&self, remote_x963: &[u8]) -> Result<SharedSecret, Error> {
            self.0.shared_secret(remote_x963)
        }

        fn data_representation(&self) -> Vec<u8> {
            self.1.clone()
        }
    }

    impl SecureElement for Simulated {
        fn is_available(&self) -> bool {
            self.available
        }

        fn generate_p256(
            &self,
            access_control: AccessControl,
        ) -> Result<Box<dyn SecureElementKey>, Error> {
            if self.deny && access_control.user_presence {
                return Err(Error::AuthenticationDenied);
            }
            let key = SoftwareKey::random();
            let mut keys = self.keys.lock().unwrap();
            let handle = (keys.len() as u32).to_be_bytes().to_vec();
            keys.insert(handle.clone(), key.clone());
            Ok(Box::new(SimulatedKey(key, handle)))
        }

        fn restore_p256(&self, handle: &[u8]) -> Result<Box<dyn SecureElementKey>, Error> {
            let keys = self.keys.lock().unwrap();
            let key = keys
                .get(handle)
                .ok_or_else(|| Error::HardwareUnavailable("unknown key".into()))?;
            Ok(Box::new(SimulatedKey(key.clone(), handle.to_vec())))
        }
    }

    #[test]
    fn secure_element_key_interoperates() {
        let store = Simulated {
            available: true,
            ..Default::default()
        };
        let hw = P256EncryptionKey::generate_in_secure_element(&store, AccessControl::default())
            .unwrap();
        assert!(hw.is_hardware_backed());
        let sw = P256EncryptionKey::random();
        assert!(!sw.is_hardware_backed());
        assert_eq!(sw.data_representation(), None);

        let hw_der = hw.public_key_der().unwrap();
        let sw_der = sw.public_key_der().unwrap();
        let ciphertext = sw.encrypt(b"age_over_18", &hw_der).unwrap();
        assert_eq!(hw.decrypt(&ciphertext, &sw_der).unwrap(), b"age_over_18");
        let reply = hw.encrypt(b"true", &sw_der).unwrap();
        assert_eq!(sw.decrypt(&reply, &hw_der).unwrap(), b"true");

        let handle = hw.data_representation().unwrap();
        let restored = P256EncryptionKey::restore_from_secure_element(&store, &handle).unwrap();
        assert_eq!(restored.public_key_x963(), hw.public_key_x963());
    }

    #[test]
    fn secure_element_failures_are_distinct() {
        let missing = Simulated::default();
        assert!(matches!(
            P256EncryptionKey::generate_in_secure_element(&missing, AccessControl::default()),
            Err(Error::HardwareUnavailable(_))
        ));
        assert!(matches!(
            P256EncryptionKey::restore_from_secure_element(&missing, &[0]),
            Err(Error::HardwareUnavailable(_))
        ));

        let denying = Simulated {
            available: true,
            deny: true,
            ..Default::default()
        };
        assert!(matches!(
            P256EncryptionKey::generate_in_secure_element(
                &denying,
                AccessControl::with_user_presence()
            ),
            Err(Error::AuthenticationDenied)
        ));
    }
}
