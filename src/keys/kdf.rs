//! Key derivation from an ECDH shared secret.
use std::fmt;

use digest::Digest;
use hkdf::Hkdf;
use sha2::{Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

use super::Error;
use crate::definitions::device_key::EC2Curve;

/// Raw output of an ECDH key agreement, the x-coordinate of the shared point.
pub struct SharedSecret(Zeroizing<Vec<u8>>);

/// Key material derived from a [SharedSecret].
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey(Zeroizing<Vec<u8>>);

impl SharedSecret {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl SymmetricKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymmetricKey(<{} bytes redacted>)", self.0.len())
    }
}

/// Hash function bound to a curve for key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn for_curve(crv: EC2Curve) -> Self {
        match crv {
            EC2Curve::P256 => HashAlgorithm::Sha256,
            EC2Curve::P384 => HashAlgorithm::Sha384,
            EC2Curve::P521 => HashAlgorithm::Sha512,
        }
    }

    /// Digest size in bytes, also the length of the key derived for the bound curve.
    pub fn output_size(self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }
}

/// ANSI X9.63 key derivation: `Hash(Z || counter || sharedInfo)` for a big-endian 32-bit
/// counter starting at 1, concatenated and truncated to `output_len` bytes.
pub fn x963_derive(
    secret: &SharedSecret,
    hash: HashAlgorithm,
    shared_info: &[u8],
    output_len: usize,
) -> Result<SymmetricKey, Error> {
    let max_len = hash.output_size() as u64 * u64::from(u32::MAX);
    if output_len == 0 || output_len as u64 > max_len {
        return Err(Error::KeyDerivation);
    }
    let okm = match hash {
        HashAlgorithm::Sha256 => x963::<Sha256>(secret.as_bytes(), shared_info, output_len),
        HashAlgorithm::Sha384 => x963::<Sha384>(secret.as_bytes(), shared_info, output_len),
        HashAlgorithm::Sha512 => x963::<Sha512>(secret.as_bytes(), shared_info, output_len),
    };
    Ok(SymmetricKey(okm))
}

fn x963<D: Digest>(z: &[u8], shared_info: &[u8], output_len: usize) -> Zeroizing<Vec<u8>> {
    let mut okm = Zeroizing::new(Vec::with_capacity(output_len + <D as Digest>::output_size()));
    let mut counter: u32 = 1;
    while okm.len() < output_len {
        let mut hasher = D::new();
        hasher.update(z);
        hasher.update(counter.to_be_bytes());
        hasher.update(shared_info);
        okm.extend_from_slice(&hasher.finalize());
        counter = counter.wrapping_add(1);
    }
    okm.truncate(output_len);
    okm
}

/// HKDF (RFC 5869) over the shared secret.
pub fn hkdf_derive(
    secret: &SharedSecret,
    hash: HashAlgorithm,
    salt: &[u8],
    info: &[u8],
    output_len: usize,
) -> Result<SymmetricKey, Error> {
    let mut okm = Zeroizing::new(vec![0u8; output_len]);
    let expanded = match hash {
        HashAlgorithm::Sha256 => {
            Hkdf::<Sha256>::new(Some(salt), secret.as_bytes()).expand(info, &mut okm)
        }
        HashAlgorithm::Sha384 => {
            Hkdf::<Sha384>::new(Some(salt), secret.as_bytes()).expand(info, &mut okm)
        }
        HashAlgorithm::Sha512 => {
            Hkdf::<Sha512>::new(Some(salt), secret.as_bytes()).expand(info, &mut okm)
        }
    };
    expanded.map_err(|_| Error::KeyDerivation)?;
    Ok(SymmetricKey(okm))
}
