//! # Field Codec
//!
//! Banklink messages are flat `name → value` maps. What the banks sign is
//! not the map itself but a byte string built from it in a fixed order:
//!
//! ```text
//!   VK_SERVICE=1012, VK_VERSION=008, VK_SND_ID=uid100052, ...
//!
//!   004 1012 003 008 009 uid100052 ...
//!   └┬┘ └┬─┘ └┬┘ └┬┘ └┬┘ └───┬───┘
//!   len value len value len  value
//! ```
//!
//! - [`fields`]: field names and the canonical order per message type.
//! - [`digest`]: the length-prefixed serializer and its inverse.
//! - [`form`]: `application/x-www-form-urlencoded` bodies in a bank charset.
//! - [`encoding`]: the two charsets banks actually use.

pub mod digest;
pub mod encoding;
pub mod fields;
pub mod form;

use std::collections::BTreeMap;

use thiserror::Error;

pub use digest::{digest, format_amount, parse_digest, LengthMode};
pub use encoding::Encoding;
pub use fields::MessageType;
pub use form::{decode_form, decode_form_lossy, encode_form};

/// A banklink message: field name to field value.
pub type FieldMap = BTreeMap<String, String>;

/// Errors raised while serializing or parsing banklink fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The 3-digit length prefix cannot describe this value.
    #[error("field {field} is {length} long; at most 999 fits the length prefix")]
    FieldTooLong { field: String, length: usize },

    /// The value has characters outside the bank's charset.
    #[error("field {field} cannot be represented in {encoding}")]
    Unencodable {
        field: String,
        encoding: &'static str,
    },

    /// The payload bytes are not valid in the bank's charset.
    #[error("field {field} is not valid {encoding}")]
    InvalidText {
        field: String,
        encoding: &'static str,
    },

    /// The charset name is not one we support.
    #[error("unknown character encoding: {0}")]
    UnknownEncoding(String),

    /// A digest could not be split back into its fields.
    #[error("malformed digest: {0}")]
    MalformedDigest(String),
}
