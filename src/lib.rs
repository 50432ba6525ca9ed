//! ISO/IEC 18013-5 mobile document building blocks: the CBOR wire structures exchanged
//! during device engagement and request, and the wallet keys used to agree on session
//! secrets and encrypt to a peer.
pub mod cbor;
pub mod definitions;
pub mod keys;

pub use definitions::{
    CoseKey, CoseKeyPrivate, DeviceRequest, DocRequest, EC2Curve, ItemsRequest, Security,
};
pub use keys::{CoseKeyExchange, WalletEncryptionKey, WalletPrivateKey, WalletSigningKey};
