//! Support for embedded
//! [CBOR Data Items](https://www.ietf.org/rfc/rfc8949.html#name-encoded-cbor-data-item),
//! also known as a tagged data item with tag number 24.
//!
//! Tag 24 is the only mechanism used to embed one encoded structure inside another, for
//! example the device key inside [Security](crate::definitions::Security) or the
//! [ItemsRequest](crate::definitions::device_request::ItemsRequest) inside a
//! [DocRequest](crate::definitions::DocRequest).

use ciborium::Value;
use coset::{AsCborValue, CborSerializable, CoseError};
use serde::{Deserialize, Serialize};

pub const EMBEDDED_CBOR_TAG: u64 = 24;

/// A wrapper for a struct that is to be encoded as a CBOR tagged item, with tag number 24.
///
/// If this struct is created through deserializing CBOR, then the original byte representation is
/// preserved for future serializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "Value",
    into = "Value",
    bound(
        serialize = "T: Clone",
        deserialize = "T: CborSerializable + Clone"
    )
)]
pub struct Tag24<T> {
    inner: T,
    pub inner_bytes: Vec<u8>,
}

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Expected a CBOR byte string, received: '{0:?}'")]
    InvalidTag24(Box<Value>),
    #[error("Expected a CBOR tagged data item with tag number 24, received: '{0:?}'")]
    NotATag24(Value),
    #[error("Unable to encode value as CBOR: {0}")]
    UnableToEncode(CoseError),
    #[error("Unable to decode bytes to inner type: {0}")]
    UnableToDecode(CoseError),
}

impl<T> Tag24<T> {
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: CborSerializable + Clone> Tag24<T> {
    pub fn new(inner: T) -> Result<Tag24<T>> {
        let inner_bytes = inner.clone().to_vec().map_err(Error::UnableToEncode)?;
        Ok(Self { inner, inner_bytes })
    }

    pub fn from_bytes(inner_bytes: Vec<u8>) -> Result<Tag24<T>> {
        let inner = T::from_slice(&inner_bytes).map_err(Error::UnableToDecode)?;
        Ok(Self { inner, inner_bytes })
    }
}

impl<T: CborSerializable + Clone> TryFrom<Value> for Tag24<T> {
    type Error = Error;

    fn try_from(v: Value) -> Result<Tag24<T>> {
        match v {
            Value::Tag(EMBEDDED_CBOR_TAG, inner_value) => match *inner_value {
                Value::Bytes(inner_bytes) => Tag24::from_bytes(inner_bytes),
                other => Err(Error::InvalidTag24(Box::new(other))),
            },
            _ => Err(Error::NotATag24(v)),
        }
    }
}

impl<T> From<Tag24<T>> for Value {
    fn from(Tag24 { inner_bytes, .. }: Tag24<T>) -> Value {
        tag_embedded(inner_bytes)
    }
}

impl<T> AsRef<T> for Tag24<T> {
    fn as_ref(&self) -> &T {
        &self.inner
    }
}

impl<T: CborSerializable + Clone> CborSerializable for Tag24<T> {}
impl<T: CborSerializable + Clone> AsCborValue for Tag24<T> {
    fn from_cbor_value(value: Value) -> coset::Result<Self> {
        Tag24::try_from(value).map_err(|e| match e {
            Error::UnableToDecode(e) => e,
            e => CoseError::DecodeFailed(ciborium::de::Error::Semantic(None, e.to_string())),
        })
    }

    fn to_cbor_value(self) -> coset::Result<Value> {
        Ok(self.into())
    }
}

/// Wraps already encoded bytes as an embedded CBOR data item.
pub fn tag_embedded(bytes: Vec<u8>) -> Value {
    Value::Tag(EMBEDDED_CBOR_TAG, Box::new(Value::Bytes(bytes)))
}

/// Encodes `value` and wraps the encoding as an embedded CBOR data item.
pub fn embed<T: CborSerializable>(value: T) -> Result<Value> {
    let bytes = value.to_vec().map_err(Error::UnableToEncode)?;
    Ok(tag_embedded(bytes))
}

/// The embedded bytes, if `value` is a tag 24 over a byte string.
pub fn decode_embedded(value: &Value) -> Option<&[u8]> {
    match value {
        Value::Tag(EMBEDDED_CBOR_TAG, inner) => inner.as_bytes().map(Vec::as_slice),
        _ => None,
    }
}

/// The embedded structure, if `value` is a tag 24 over bytes that decode as `T`.
pub fn decode_embedded_typed<T: CborSerializable>(value: &Value) -> Option<T> {
    decode_embedded(value).and_then(|bytes| T::from_slice(bytes).ok())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::definitions::device_key::{CoseKey, EC2Curve};

    fn key() -> CoseKey {
        CoseKey::new(EC2Curve::P256, vec![0u8; 32], vec![1u8; 32])
    }

    #[test]
    fn tag24_roundtrip() {
        let original = Tag24::new(key()).unwrap();
        let cbor = original.clone().to_vec().unwrap();
        let roundtripped = Tag24::<CoseKey>::from_slice(&cbor).unwrap();
        assert_eq!(original, roundtripped);
        assert_eq!(roundtripped.as_ref(), &key());
    }

    #[test]
    fn embedded_bytes_are_preserved() {
        // Non-canonical key order, which must survive a decode/encode cycle.
        let map = Value::Map(vec![
            (Value::Integer((-1).into()), Value::Integer(1.into())),
            (Value::Integer(1.into()), Value::Integer(2.into())),
            (Value::Integer((-2).into()), Value::Bytes(vec![0u8; 32])),
            (Value::Integer((-3).into()), Value::Bytes(vec![1u8; 32])),
        ]);
        let inner = crate::cbor::to_vec(&map).unwrap();
        assert_ne!(inner, key().to_vec().unwrap());

        let tagged = tag_embedded(inner.clone());
        let decoded = Tag24::<CoseKey>::try_from(tagged.clone()).unwrap();
        assert_eq!(decoded.as_ref(), &key());
        assert_eq!(decoded.inner_bytes, inner);
        assert_eq!(Value::from(decoded), tagged);
    }

    #[test]
    fn decode_embedded_requires_tag_24() {
        let bytes = vec![0xa0];
        assert_eq!(decode_embedded(&tag_embedded(bytes.clone())), Some(&bytes[..]));
        assert_eq!(
            decode_embedded(&Value::Tag(1004, Box::new(Value::Bytes(bytes.clone())))),
            None
        );
        assert_eq!(decode_embedded(&Value::Bytes(bytes)), None);
        assert_eq!(
            decode_embedded(&Value::Tag(24, Box::new(Value::Text("a0".into())))),
            None
        );
    }

    #[test]
    fn decode_embedded_typed_checks_inner_structure() {
        let tagged = embed(key()).unwrap();
        assert_eq!(decode_embedded_typed::<CoseKey>(&tagged), Some(key()));

        let not_a_key = tag_embedded(vec![0x01]);
        assert_eq!(decode_embedded_typed::<CoseKey>(&not_a_key), None);
    }

    #[test]
    fn wrong_tag_is_reported() {
        let value = Value::Tag(1004, Box::new(Value::Text("2020-01-01".into())));
        assert!(matches!(
            Tag24::<CoseKey>::try_from(value),
            Err(Error::NotATag24(_))
        ));
        let value = Value::Tag(24, Box::new(Value::Text("a0".into())));
        assert!(matches!(
            Tag24::<CoseKey>::try_from(value),
            Err(Error::InvalidTag24(_))
        ));
    }
}
