//! Elliptic curve private keys held in memory.
use std::fmt;

use elliptic_curve::{
    ecdh,
    pkcs8::{AssociatedOid, DecodePublicKey, EncodePublicKey},
    sec1::{FromEncodedPoint, ModulusSize, ToEncodedPoint},
    AffinePoint, CurveArithmetic, FieldBytesSize, PublicKey, SecretKey,
};
use p256::NistP256;
use p384::NistP384;
use p521::NistP521;
use rand::rngs::OsRng;

use super::{Error, SharedSecret};
use crate::definitions::device_key::cose_key_private::private_x963;
use crate::definitions::device_key::{CoseKey, CoseKeyPrivate, EC2Curve};

/// A NIST curve usable for key agreement.
pub trait NistCurve: CurveArithmetic + AssociatedOid {
    const CURVE: EC2Curve;
}

impl NistCurve for NistP256 {
    const CURVE: EC2Curve = EC2Curve::P256;
}

impl NistCurve for NistP384 {
    const CURVE: EC2Curve = EC2Curve::P384;
}

impl NistCurve for NistP521 {
    const CURVE: EC2Curve = EC2Curve::P521;
}

/// A private key on curve `C` whose scalar lives in process memory.
#[derive(Clone)]
pub struct SoftwareKey<C: CurveArithmetic> {
    secret: SecretKey<C>,
}

impl<C: NistCurve> fmt::Debug for SoftwareKey<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareKey")
            .field("curve", &C::CURVE)
            .finish_non_exhaustive()
    }
}

impl<C> SoftwareKey<C>
where
    C: NistCurve,
    AffinePoint<C>: FromEncodedPoint<C> + ToEncodedPoint<C>,
    FieldBytesSize<C>: ModulusSize,
{
    pub fn random() -> Self {
        tracing::debug!(curve = %C::CURVE, "generating software key");
        Self {
            secret: SecretKey::random(&mut OsRng),
        }
    }

    /// From the big-endian private scalar.
    pub fn from_bytes(scalar: &[u8]) -> Result<Self, Error> {
        let secret = SecretKey::from_slice(scalar).map_err(|_| Error::InvalidPrivateKey(C::CURVE))?;
        Ok(Self { secret })
    }

    /// From `0x04 || X || Y || D`. The public point must belong to `D`.
    pub fn from_x963(bytes: &[u8]) -> Result<Self, Error> {
        Self::from_cose_key(&CoseKeyPrivate::from_x963(C::CURVE, bytes)?)
    }

    /// From a private COSE key on the same curve. The public point must belong to `d`.
    pub fn from_cose_key(key: &CoseKeyPrivate) -> Result<Self, Error> {
        if key.curve() != C::CURVE {
            return Err(Error::CurveMismatch {
                expected: C::CURVE,
                actual: key.curve(),
            });
        }
        let software = Self::from_bytes(key.d())?;
        if software.public_key_x963() != key.public_key().to_x963() {
            return Err(Error::InvalidPrivateKey(C::CURVE));
        }
        Ok(software)
    }

    pub fn curve(&self) -> EC2Curve {
        C::CURVE
    }

    pub fn public_key_x963(&self) -> Vec<u8> {
        self.secret
            .public_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    /// SubjectPublicKeyInfo DER encoding of the public key.
    pub fn public_key_der(&self) -> Result<Vec<u8>, Error> {
        let der = self
            .secret
            .public_key()
            .to_public_key_der()
            .map_err(|_| Error::PublicKeyEncoding(C::CURVE))?;
        Ok(der.as_bytes().to_vec())
    }

    pub fn public_cose_key(&self) -> Result<CoseKey, Error> {
        Ok(CoseKey::from_x963(C::CURVE, &self.public_key_x963())?)
    }

    pub fn to_cose_key_private(&self) -> Result<CoseKeyPrivate, Error> {
        Ok(CoseKeyPrivate::from_x963(C::CURVE, &private_x963(&self.secret))?)
    }

    /// ECDH with an X9.63 encoded public key on the same curve.
    pub fn shared_secret(&self, remote_x963: &[u8]) -> Result<SharedSecret, Error> {
        let remote =
            PublicKey::<C>::from_sec1_bytes(remote_x963).map_err(|_| Error::InvalidPublicKey(C::CURVE))?;
        Ok(self.diffie_hellman(&remote))
    }

    /// ECDH with a DER (SubjectPublicKeyInfo) encoded public key on the same curve.
    pub fn shared_secret_from_der(&self, remote_der: &[u8]) -> Result<SharedSecret, Error> {
        let remote = PublicKey::<C>::from_public_key_der(remote_der)
            .map_err(|_| Error::InvalidPublicKey(C::CURVE))?;
        Ok(self.diffie_hellman(&remote))
    }

    fn diffie_hellman(&self, remote: &PublicKey<C>) -> SharedSecret {
        let shared = ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), remote.as_affine());
        SharedSecret::new(shared.raw_secret_bytes().to_vec())
    }
}

/// Decodes a DER public key on curve `C` and returns its X9.63 encoding.
pub(crate) fn der_to_x963<C>(der: &[u8]) -> Result<Vec<u8>, Error>
where
    C: NistCurve,
    AffinePoint<C>: FromEncodedPoint<C> + ToEncodedPoint<C>,
    FieldBytesSize<C>: ModulusSize,
{
    let key = PublicKey::<C>::from_public_key_der(der).map_err(|_| Error::InvalidPublicKey(C::CURVE))?;
    Ok(key.to_encoded_point(false).as_bytes().to_vec())
}

/// Encodes an X9.63 public key on curve `C` as DER.
pub(crate) fn x963_to_der<C>(x963: &[u8]) -> Result<Vec<u8>, Error>
where
    C: NistCurve,
    AffinePoint<C>: FromEncodedPoint<C> + ToEncodedPoint<C>,
    FieldBytesSize<C>: ModulusSize,
{
    let key = PublicKey::<C>::from_sec1_bytes(x963).map_err(|_| Error::PublicKeyEncoding(C::CURVE))?;
    let der = key
        .to_public_key_der()
        .map_err(|_| Error::PublicKeyEncoding(C::CURVE))?;
    Ok(der.as_bytes().to_vec())
}

/// DER (SubjectPublicKeyInfo) encoding of a public COSE key, as used for `sharedInfo`.
pub fn cose_key_to_der(key: &CoseKey) -> Result<Vec<u8>, Error> {
    let x963 = key.to_x963();
    match key.crv {
        EC2Curve::P256 => x963_to_der::<NistP256>(&x963),
        EC2Curve::P384 => x963_to_der::<NistP384>(&x963),
        EC2Curve::P521 => x963_to_der::<NistP521>(&x963),
    }
}
