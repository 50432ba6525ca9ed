use std::fmt;

use ciborium::Value;
use coset::{AsCborValue, CborSerializable};
use serde::{Deserialize, Serialize};

use crate::cbor;

/// COSE key type label.
pub const KTY: i64 = 1;
/// EC identifier label.
pub const CRV: i64 = -1;
/// x-coordinate label.
pub const X: i64 = -2;
/// y-coordinate label.
pub const Y: i64 = -3;
/// Private key label.
pub const D: i64 = -4;

/// Key type EC2, the only key type used by ISO/IEC 18013-5 device keys.
pub const KTY_EC2: u64 = 2;

/// Marker byte of an uncompressed point in the ANSI X9.63 representation.
pub const X963_UNCOMPRESSED: u8 = 0x04;

/// An implementation of RFC-8152 [COSE_Key](https://datatracker.ietf.org/doc/html/rfc8152#section-13)
/// restricted to the EC2 keys used by ISO/IEC 18013-5:2021.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "Value", into = "Value")]
pub struct CoseKey {
    pub crv: EC2Curve,
    pub x: Vec<u8>,
    pub y: Vec<u8>,
}

/// The RFC-8152 identifier of the curve, for EC2 key type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EC2Curve {
    P256,
    P384,
    P521,
}

/// Errors that can occur when deserialising a COSE_Key or converting it from raw bytes.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Expected to parse a CBOR map, received: '{0}'")]
    NotAMap(&'static str),
    #[error("COSE_Key is missing label {0}")]
    MissingLabel(i64),
    #[error("COSE_Key label {label} should be a {expected}, received: '{received}'")]
    InvalidType {
        label: i64,
        expected: &'static str,
        received: &'static str,
    },
    #[error("This implementation of COSE_Key only supports EC2 keys, received kty {0}")]
    UnsupportedKeyType(u64),
    #[error("This implementation of COSE_Key only supports P-256, P-384 and P-521, received crv {0}")]
    UnsupportedCurve(u64),
    #[error("X9.63 representation must start with 0x04, found {0:#04x}")]
    InvalidX963Marker(u8),
    #[error("X9.63 representation for {curve} must be {expected} bytes long, found {actual}")]
    InvalidX963Length {
        curve: EC2Curve,
        expected: usize,
        actual: usize,
    },
    #[error("Private key blob is not valid base64")]
    InvalidBase64,
    #[error("Unable to decode CBOR: {0}")]
    Cbor(String),
}

impl Error {
    /// Whether the error is a precondition violation on raw key bytes, rather than a
    /// malformed CBOR structure.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidX963Marker(_)
                | Error::InvalidX963Length { .. }
                | Error::InvalidBase64
                | Error::UnsupportedCurve(_)
        )
    }
}

impl EC2Curve {
    /// Identifier in the COSE Elliptic Curves registry.
    pub fn cose_id(self) -> u64 {
        match self {
            EC2Curve::P256 => 1,
            EC2Curve::P384 => 2,
            EC2Curve::P521 => 3,
        }
    }

    /// Length in bytes of a single coordinate, and of the private scalar.
    pub fn coordinate_size(self) -> usize {
        match self {
            EC2Curve::P256 => 32,
            EC2Curve::P384 => 48,
            EC2Curve::P521 => 66,
        }
    }
}

impl fmt::Display for EC2Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EC2Curve::P256 => "P-256",
            EC2Curve::P384 => "P-384",
            EC2Curve::P521 => "P-521",
        })
    }
}

impl TryFrom<u64> for EC2Curve {
    type Error = Error;

    fn try_from(crv_id: u64) -> Result<Self, Error> {
        match crv_id {
            1 => Ok(EC2Curve::P256),
            2 => Ok(EC2Curve::P384),
            3 => Ok(EC2Curve::P521),
            _ => Err(Error::UnsupportedCurve(crv_id)),
        }
    }
}

impl From<EC2Curve> for Value {
    fn from(crv: EC2Curve) -> Value {
        Value::Integer(crv.cose_id().into())
    }
}

impl CoseKey {
    pub fn new(crv: EC2Curve, x: Vec<u8>, y: Vec<u8>) -> Self {
        Self { crv, x, y }
    }

    /// Splits an uncompressed point, `0x04 || X || Y`, into its coordinates.
    pub fn from_x963(crv: EC2Curve, bytes: &[u8]) -> Result<Self, Error> {
        let coordinates = strip_x963_marker(crv, bytes, 2)?;
        let (x, y) = coordinates.split_at(crv.coordinate_size());
        Ok(Self::new(crv, x.to_vec(), y.to_vec()))
    }

    /// The ANSI X9.63 representation of the public key, `0x04 || X || Y`.
    pub fn to_x963(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + self.x.len() + self.y.len());
        bytes.push(X963_UNCOMPRESSED);
        bytes.extend_from_slice(&self.x);
        bytes.extend_from_slice(&self.y);
        bytes
    }

    pub(crate) fn into_entries(self) -> Vec<(Value, Value)> {
        vec![
            (cbor::int_key(KTY), Value::Integer(KTY_EC2.into())),
            (cbor::int_key(CRV), self.crv.into()),
            (cbor::int_key(X), Value::Bytes(self.x)),
            (cbor::int_key(Y), Value::Bytes(self.y)),
        ]
    }

    /// Reads the public part of a COSE_Key out of a decoded map, leaving any other labels behind.
    pub(crate) fn from_entries(map: &mut Vec<(Value, Value)>) -> Result<Self, Error> {
        let crv = take_label(map, CRV)?;
        let crv = cbor::as_u64(&crv).ok_or(Error::InvalidType {
            label: CRV,
            expected: "uint",
            received: cbor::kind(&crv),
        })?;
        let kty = take_label(map, KTY)?;
        let kty = cbor::as_u64(&kty).ok_or(Error::InvalidType {
            label: KTY,
            expected: "uint",
            received: cbor::kind(&kty),
        })?;
        let x = take_bytes(map, X)?;
        let y = take_bytes(map, Y)?;
        let crv = EC2Curve::try_from(crv)?;
        if kty != KTY_EC2 {
            return Err(Error::UnsupportedKeyType(kty));
        }
        Ok(Self { crv, x, y })
    }
}

/// Checks the marker and length of an X9.63 blob holding `parts` curve-sized values and
/// returns the bytes following the marker.
pub(crate) fn strip_x963_marker(crv: EC2Curve, bytes: &[u8], parts: usize) -> Result<&[u8], Error> {
    let expected = 1 + parts * crv.coordinate_size();
    match bytes.first() {
        Some(&X963_UNCOMPRESSED) if bytes.len() == expected => Ok(&bytes[1..]),
        Some(&X963_UNCOMPRESSED) | None => Err(Error::InvalidX963Length {
            curve: crv,
            expected,
            actual: bytes.len(),
        }),
        Some(&marker) => Err(Error::InvalidX963Marker(marker)),
    }
}

fn take_label(map: &mut Vec<(Value, Value)>, label: i64) -> Result<Value, Error> {
    cbor::remove_entry(map, &cbor::int_key(label)).ok_or(Error::MissingLabel(label))
}

pub(crate) fn take_bytes(map: &mut Vec<(Value, Value)>, label: i64) -> Result<Vec<u8>, Error> {
    match take_label(map, label)? {
        Value::Bytes(bytes) => Ok(bytes),
        other => Err(Error::InvalidType {
            label,
            expected: "bstr",
            received: cbor::kind(&other),
        }),
    }
}

impl From<CoseKey> for Value {
    fn from(key: CoseKey) -> Value {
        Value::Map(key.into_entries())
    }
}

impl TryFrom<Value> for CoseKey {
    type Error = Error;

    fn try_from(v: Value) -> Result<Self, Error> {
        match v {
            Value::Map(mut map) => CoseKey::from_entries(&mut map),
            other => Err(Error::NotAMap(cbor::kind(&other))),
        }
    }
}

impl CborSerializable for CoseKey {}
impl AsCborValue for CoseKey {
    fn from_cbor_value(value: Value) -> coset::Result<Self> {
        CoseKey::try_from(value).map_err(|e| {
            coset::CoseError::DecodeFailed(ciborium::de::Error::Semantic(None, e.to_string()))
        })
    }

    fn to_cbor_value(self) -> coset::Result<Value> {
        Ok(self.into())
    }
}
