pub mod device_engagement;
pub mod device_key;
pub mod device_request;
pub mod fulldate;
pub mod helpers;

pub use device_engagement::Security;
pub use device_key::{CoseKey, CoseKeyPrivate, EC2Curve};
pub use device_request::{DeviceRequest, DocRequest, ItemsRequest};
pub use fulldate::FullDate;
