//! Pure mappings between the backend's string identifiers and integers the
//! legacy client can store and echo back.
//!
//! Two schemes live here and are never mixed: the radix-39 compactor in
//! [`compact`] and the fixed-width base32 TID codec in [`tid`]. [`post_id`]
//! builds the post/repost identifiers on top of the compactor.

pub mod compact;
pub mod post_id;
pub mod tid;

pub use compact::{decode_compound, encode_compound, int_to_string, string_to_int};
pub use post_id::{decode_post_id, encode_post_id, AtUri, PostRef};
pub use tid::{number_to_tid, tid_clock_id, tid_from_timestamp, tid_timestamp, tid_to_number};

use crate::errors::ErrorKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("TID must be exactly 13 characters, got {0}")]
    TidLength(usize),
    #[error("invalid TID character {0:?}")]
    TidCharacter(char),
    #[error("value has its top bit set")]
    TopBitSet,
    #[error("compound identifier is corrupt")]
    CorruptCompound,
    #[error("field {0:?} cannot be encoded reversibly")]
    UnencodableField(String),
    #[error("invalid AT-URI {0:?}")]
    InvalidAtUri(String),
}

impl CodecError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
