use crate::definitions::device_key::cose_key::Error as CoseKeyError;
use crate::definitions::helpers::tag24::Error as Tag24Error;

/// Errors that can occur when deserialising the device engagement security structure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Expected Security to be a CBOR array, received: '{0}'")]
    NotAnArray(&'static str),
    #[error("Security must hold a cipher suite identifier and a device key, found {0} elements")]
    Malformed(usize),
    #[error("Unsupported cipher suite identifier")]
    UnsupportedCipherSuite,
    #[error("Something went wrong parsing the tagged device key: {0}")]
    Tag24Error(#[from] Tag24Error),
    #[error("Something went wrong parsing a cose key: {0}")]
    CoseKeyError(#[from] CoseKeyError),
}
