//! The `Security` structure of a device engagement, advertising the mdoc's ephemeral key.
//!
//! ```cddl
//! Security = [
//!     int,             ; cipher suite identifier
//!     EDeviceKeyBytes  ; #6.24(bstr .cbor EDeviceKey)
//! ]
//! ```
use ciborium::Value;
use coset::{AsCborValue, CborSerializable};
use serde::{Deserialize, Serialize};

pub use error::Error;

use crate::cbor;
use crate::definitions::helpers::Tag24;
use crate::definitions::CoseKey;

pub mod error;

pub type EDeviceKey = CoseKey;
pub type EDeviceKeyBytes = Tag24<EDeviceKey>;

/// Represents the security settings of a device engagement.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "Value", into = "Value")]
pub struct Security {
    /// The ephemeral public key of the mdoc, kept with its encoded bytes.
    device_key: EDeviceKeyBytes,
}

impl Security {
    pub const CIPHER_SUITE_IDENTIFIER: u64 = 1;

    pub fn new(device_key: EDeviceKey) -> Result<Self, Error> {
        Ok(Self {
            device_key: Tag24::new(device_key)?,
        })
    }

    pub fn device_key(&self) -> &EDeviceKey {
        self.device_key.as_ref()
    }

    pub fn device_key_bytes(&self) -> &EDeviceKeyBytes {
        &self.device_key
    }
}

impl From<Security> for Value {
    fn from(security: Security) -> Value {
        Value::Array(vec![
            Value::Integer(Security::CIPHER_SUITE_IDENTIFIER.into()),
            security.device_key.into(),
        ])
    }
}

impl TryFrom<Value> for Security {
    type Error = Error;

    fn try_from(v: Value) -> Result<Self, Error> {
        let list = match v {
            Value::Array(list) => list,
            other => return Err(Error::NotAnArray(cbor::kind(&other))),
        };
        if list.len() < 2 {
            return Err(Error::Malformed(list.len()));
        }
        let mut items = list.into_iter();
        match items.next().as_ref().and_then(cbor::as_u64) {
            Some(Self::CIPHER_SUITE_IDENTIFIER) => {}
            _ => return Err(Error::UnsupportedCipherSuite),
        }
        let device_key = items
            .next()
            .ok_or(Error::Malformed(1))
            .and_then(|item| EDeviceKeyBytes::try_from(item).map_err(Error::from))?;
        Ok(Security { device_key })
    }
}

impl CborSerializable for Security {}
impl AsCborValue for Security {
    fn from_cbor_value(value: Value) -> coset::Result<Self> {
        Security::try_from(value).map_err(|e| {
            coset::CoseError::DecodeFailed(ciborium::de::Error::Semantic(None, e.to_string()))
        })
    }

    fn to_cbor_value(self) -> coset::Result<Value> {
        Ok(self.into())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::definitions::helpers::{decode_embedded_typed, tag_embedded};
    use crate::definitions::EC2Curve;
    use hex_literal::hex;

    // Security item of the ISO/IEC 18013-5:2021 sample device engagement.
    static SECURITY: [u8; 81] = hex!(
        "8201d818584ba4010220012158205a88d182bce5f42efa59943f33359d2e8a968ff289d93e5fa444b624343167fe225820b16e8cf858ddc7690407ba61d4c338237a8cfcf3de6aa672fc60a557aa32fc67"
    );

    fn device_key() -> CoseKey {
        CoseKey::new(EC2Curve::P256, vec![0x11; 32], vec![0x22; 32])
    }

    #[test]
    fn security_bytes_roundtrip() {
        let security = Security::from_slice(&SECURITY).unwrap();
        assert_eq!(security.device_key().crv, EC2Curve::P256);
        assert_eq!(security.to_vec().unwrap(), SECURITY.to_vec());
    }

    #[test]
    fn security_is_identifier_then_tagged_key() {
        let value = Value::from(Security::new(device_key()).unwrap());
        let list = value.into_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0], Value::Integer(1.into()));
        assert_eq!(decode_embedded_typed::<CoseKey>(&list[1]), Some(device_key()));
    }

    #[test]
    fn security_roundtrip() {
        let security = Security::new(device_key()).unwrap();
        let bytes = security.clone().to_vec().unwrap();
        assert_eq!(Security::from_slice(&bytes).unwrap(), security);
    }

    #[test]
    fn wrong_cipher_suite_is_rejected() {
        let key_bytes = device_key().to_vec().unwrap();
        let value = Value::Array(vec![Value::Integer(2.into()), tag_embedded(key_bytes)]);
        assert!(matches!(
            Security::try_from(value),
            Err(Error::UnsupportedCipherSuite)
        ));
    }

    #[test]
    fn untagged_or_short_security_is_rejected() {
        let key = Value::from(device_key());
        let untagged = Value::Array(vec![Value::Integer(1.into()), key]);
        assert!(matches!(
            Security::try_from(untagged),
            Err(Error::Tag24Error(_))
        ));

        let short = Value::Array(vec![Value::Integer(1.into())]);
        assert!(matches!(Security::try_from(short), Err(Error::Malformed(1))));

        assert!(matches!(
            Security::try_from(Value::Map(vec![])),
            Err(Error::NotAnArray("map"))
        ));
    }

    #[test]
    fn extra_elements_are_ignored() {
        let mut list = Value::from(Security::new(device_key()).unwrap()).into_array().unwrap();
        list.push(Value::Null);
        assert_eq!(
            Security::try_from(Value::Array(list)).unwrap(),
            Security::new(device_key()).unwrap()
        );
    }
}
