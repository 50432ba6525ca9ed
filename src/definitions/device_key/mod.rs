pub mod cose_key;
pub mod cose_key_private;

pub use cose_key::{CoseKey, EC2Curve};
pub use cose_key_private::CoseKeyPrivate;
