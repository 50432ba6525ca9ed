use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Context, Result};
use coset::CborSerializable;

use mdoc_core::definitions::device_request::MDL_NAMESPACE;
use mdoc_core::keys::{
    self, AccessControl, P256EncryptionKey, SecureElement, SecureElementKey, SharedSecret,
    SoftwareKey,
};
use mdoc_core::{CoseKeyExchange, DeviceRequest, Security, WalletEncryptionKey};

#[allow(dead_code)]
pub const AGE_OVER: u8 = 21;
#[allow(dead_code)]
pub const REQUESTED_ELEMENTS: [&str; 2] = ["family_name", "portrait"];

#[allow(dead_code)]
fn main() {}

/// Secure element backed by in-memory software keys.
#[derive(Default)]
pub struct SimulatedSecureElement {
    pub unavailable: bool,
    pub deny_authentication: bool,
    keys: Mutex<HashMap<Vec<u8>, SoftwareKey<p256::NistP256>>>,
}

#[allow(dead_code)]
impl SimulatedSecureElement {
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    pub fn denying_authentication() -> Self {
        Self {
            deny_authentication: true,
            ..Default::default()
        }
    }
}

struct SimulatedKey {
    key: SoftwareKey<p256::NistP256>,
    handle: Vec<u8>,
}

impl SecureElementKey for SimulatedKey {
    fn public_key_x963(&self) -> Vec<u8> {
        self.key.public_key_x963()
    }

    fn shared_secret(&self, remote_x963: &[u8]) -> Result<SharedSecret, keys::Error> {
        self.key.shared_secret(remote_x963)
    }

    fn data_representation(&self) -> Vec<u8> {
        self.handle.clone()
    }
}

impl SecureElement for SimulatedSecureElement {
    fn is_available(&self) -> bool {
        !self.unavailable
    }

    fn generate_p256(
        &self,
        access_control: AccessControl,
    ) -> Result<Box<dyn SecureElementKey>, keys::Error> {
        if access_control.user_presence && self.deny_authentication {
            return Err(keys::Error::AuthenticationDenied);
        }
        let key = SoftwareKey::random();
        let mut stored = self
            .keys
            .lock()
            .map_err(|_| keys::Error::HardwareUnavailable("poisoned".into()))?;
        let handle = format!("key-{}", stored.len()).into_bytes();
        stored.insert(handle.clone(), key.clone());
        Ok(Box::new(SimulatedKey { key, handle }))
    }

    fn restore_p256(&self, handle: &[u8]) -> Result<Box<dyn SecureElementKey>, keys::Error> {
        let stored = self
            .keys
            .lock()
            .map_err(|_| keys::Error::HardwareUnavailable("poisoned".into()))?;
        let key = stored
            .get(handle)
            .cloned()
            .ok_or_else(|| keys::Error::HardwareUnavailable("unknown key handle".into()))?;
        Ok(Box::new(SimulatedKey {
            key,
            handle: handle.to_vec(),
        }))
    }
}

/// Creates a hardware backed device key and its engagement `Security` bytes.
#[allow(dead_code)]
pub fn engage_with_secure_element(
    store: &SimulatedSecureElement,
) -> Result<(CoseKeyExchange, Vec<u8>)> {
    let key = P256EncryptionKey::generate_in_secure_element(store, AccessControl::default())
        .context("could not generate device key")?;
    let exchange = CoseKeyExchange::new(mdoc_core::WalletPrivateKey::Encryption(Box::new(key)))?;
    let security = exchange.security()?;
    let bytes = security
        .to_vec()
        .map_err(|e| anyhow::anyhow!("could not encode Security: {e}"))?;
    Ok((exchange, bytes))
}

/// Reader side: reads the device key from engagement and encrypts an mDL request to it.
#[allow(dead_code)]
pub fn reader_request(
    security: &[u8],
    reader_key: &dyn WalletEncryptionKey,
) -> Result<Vec<u8>> {
    let security = Security::from_slice(security)
        .map_err(|e| anyhow::anyhow!("could not decode Security: {e}"))?;
    let device_der = keys::cose_key_to_der(security.device_key())?;
    let request = DeviceRequest::mdl(&REQUESTED_ELEMENTS, &[AGE_OVER], false)?;
    let bytes = request
        .to_vec()
        .map_err(|e| anyhow::anyhow!("could not encode DeviceRequest: {e}"))?;
    Ok(reader_key.encrypt(&bytes, &device_der)?)
}

/// Device side: opens the request sent by the holder of `reader_der`.
#[allow(dead_code)]
pub fn device_open_request(
    device_key: &dyn WalletEncryptionKey,
    ciphertext: &[u8],
    reader_der: &[u8],
) -> Result<Vec<String>> {
    let bytes = device_key.decrypt(ciphertext, reader_der)?;
    let request = DeviceRequest::from_slice(&bytes)
        .map_err(|e| anyhow::anyhow!("could not decode DeviceRequest: {e}"))?;
    Ok(request
        .items_requests()
        .filter_map(|items| items.namespaces.get(MDL_NAMESPACE))
        .flat_map(|elements| elements.keys().cloned())
        .collect())
}
