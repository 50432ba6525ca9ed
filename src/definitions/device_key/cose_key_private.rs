use std::fmt;

use ciborium::Value;
use coset::{AsCborValue, CborSerializable};
use elliptic_curve::sec1::{FromEncodedPoint, ModulusSize, ToEncodedPoint};
use elliptic_curve::{AffinePoint, CurveArithmetic, FieldBytesSize, SecretKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::cose_key::{self, strip_x963_marker, take_bytes, CoseKey, EC2Curve, Error, D};
use crate::cbor;

/// A COSE_Key carrying the private scalar `d` (label -4) next to the public point.
///
/// `(x, y)` is expected to be the point of `d` on `crv`; this is not checked when decoding.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct CoseKeyPrivate {
    pub key: CoseKey,
    d: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for CoseKeyPrivate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoseKeyPrivate")
            .field("key", &self.key)
            .field("d", &"<redacted>")
            .finish()
    }
}

impl CoseKeyPrivate {
    pub fn new(key: CoseKey, d: Vec<u8>) -> Self {
        Self {
            key,
            d: Zeroizing::new(d),
        }
    }

    /// Generates a fresh random key on `crv`.
    pub fn generate(crv: EC2Curve) -> Self {
        let x963 = match crv {
            EC2Curve::P256 => private_x963(&SecretKey::<p256::NistP256>::random(&mut OsRng)),
            EC2Curve::P384 => private_x963(&SecretKey::<p384::NistP384>::random(&mut OsRng)),
            EC2Curve::P521 => private_x963(&SecretKey::<p521::NistP521>::random(&mut OsRng)),
        };
        tracing::debug!(curve = %crv, "generated private key");
        // `x963` is `0x04 || X || Y || D` sized for `crv`.
        Self::split_x963(crv, &x963[1..])
    }

    /// Reads the ANSI X9.63 private key representation, `0x04 || X || Y || D`.
    pub fn from_x963(crv: EC2Curve, bytes: &[u8]) -> Result<Self, Error> {
        let parts = strip_x963_marker(crv, bytes, 3)?;
        Ok(Self::split_x963(crv, parts))
    }

    fn split_x963(crv: EC2Curve, parts: &[u8]) -> Self {
        let size = crv.coordinate_size();
        let (x, rest) = parts.split_at(size);
        let (y, d) = rest.split_at(size);
        Self::new(CoseKey::new(crv, x.to_vec(), y.to_vec()), d.to_vec())
    }

    /// The ANSI X9.63 private key representation, `0x04 || X || Y || D`.
    pub fn to_x963(&self) -> Zeroizing<Vec<u8>> {
        let mut bytes = Zeroizing::new(self.key.to_x963());
        bytes.extend_from_slice(&self.d);
        bytes
    }

    /// Decodes a base64 encoded CBOR COSE_Key holding all of `crv`, `x`, `y` and `d`.
    pub fn from_base64(encoded: &str) -> Result<Self, Error> {
        let bytes = Zeroizing::new(base64::decode(encoded).map_err(|_| Error::InvalidBase64)?);
        let value: Value = cbor::from_slice(&bytes).map_err(|e| Error::Cbor(e.to_string()))?;
        Self::try_from(value)
    }

    pub fn to_base64(&self) -> Result<String, Error> {
        let bytes = Zeroizing::new(cbor::to_vec(self).map_err(|e| Error::Cbor(e.to_string()))?);
        Ok(base64::encode(&*bytes))
    }

    pub fn curve(&self) -> EC2Curve {
        self.key.crv
    }

    pub fn public_key(&self) -> &CoseKey {
        &self.key
    }

    /// The private scalar, big-endian.
    pub fn d(&self) -> &[u8] {
        &self.d
    }
}

/// `0x04 || X || Y || D` for a software secret key.
pub(crate) fn private_x963<C>(secret: &SecretKey<C>) -> Zeroizing<Vec<u8>>
where
    C: CurveArithmetic,
    AffinePoint<C>: FromEncodedPoint<C> + ToEncodedPoint<C>,
    FieldBytesSize<C>: ModulusSize,
{
    let mut bytes = Zeroizing::new(
        secret
            .public_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec(),
    );
    bytes.extend_from_slice(&secret.to_bytes());
    bytes
}

impl From<CoseKeyPrivate> for Value {
    fn from(key: CoseKeyPrivate) -> Value {
        let mut map = key.key.clone().into_entries();
        map.push((cbor::int_key(D), Value::Bytes(key.d.to_vec())));
        Value::Map(map)
    }
}

impl TryFrom<Value> for CoseKeyPrivate {
    type Error = Error;

    fn try_from(v: Value) -> Result<Self, Error> {
        match v {
            Value::Map(mut map) => {
                let key = CoseKey::from_entries(&mut map)?;
                let d = take_bytes(&mut map, cose_key::D)?;
                Ok(Self::new(key, d))
            }
            other => Err(Error::NotAMap(cbor::kind(&other))),
        }
    }
}

impl CborSerializable for CoseKeyPrivate {}
impl AsCborValue for CoseKeyPrivate {
    fn from_cbor_value(value: Value) -> coset::Result<Self> {
        CoseKeyPrivate::try_from(value).map_err(|e| {
            coset::CoseError::DecodeFailed(ciborium::de::Error::Semantic(None, e.to_string()))
        })
    }

    fn to_cbor_value(self) -> coset::Result<Value> {
        Ok(self.into())
    }
}
