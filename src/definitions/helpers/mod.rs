pub mod non_empty_vec;
pub mod tag24;

pub use non_empty_vec::NonEmptyVec;
pub use tag24::{decode_embedded, decode_embedded_typed, embed, tag_embedded, Tag24};
