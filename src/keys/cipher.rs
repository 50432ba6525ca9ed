//! AES-256-GCM in the combined layout `nonce || ciphertext || tag`.
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::rngs::OsRng;

use super::{Error, SymmetricKey};

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;

fn cipher(key: &SymmetricKey) -> Result<Aes256Gcm, Error> {
    // Curve-bound keys are 32, 48 or 64 bytes long. AES-256 takes the leading 32.
    let key = key.as_bytes().get(..KEY_SIZE).ok_or(Error::KeyDerivation)?;
    Aes256Gcm::new_from_slice(key).map_err(|_| Error::KeyDerivation)
}

/// Encrypts under a fresh random nonce.
pub fn seal(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher(key)?
        .encrypt(&nonce, plaintext)
        .map_err(|_| Error::Encryption)?;
    let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    combined.extend_from_slice(&nonce);
    combined.extend_from_slice(&ciphertext);
    Ok(combined)
}

pub fn open(key: &SymmetricKey, combined: &[u8]) -> Result<Vec<u8>, Error> {
    if combined.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::CiphertextTooShort(combined.len()));
    }
    let (nonce, ciphertext) = combined.split_at(NONCE_SIZE);
    cipher(key)?
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::Decryption)
}
