//! # Cryptography for Banklinks
//!
//! Two schemes, both chosen by the banks rather than by us:
//!
//! - **IPizza**: RSA PKCS#1 v1.5 over SHA-1, 2048-bit keys, signature sent
//!   base64-encoded in `VK_MAC`. The merchant signs requests with its own
//!   key; the bank signs responses with a key whose public half we hold.
//! - **Nordea**: a shared secret appended to the field values, MD5'd, sent
//!   as uppercase hex. Compared in constant time.
//!
//! SHA-1 and MD5 are long past retirement for new designs. They are here
//! because that is what the other side verifies; nothing in this crate uses
//! them for anything else.

pub mod keys;
pub mod mac;
pub mod signatures;

pub use keys::{KeyError, KeyKind, KeyStore};
pub use mac::{constant_time_eq, nordea_mac, verify_nordea_mac};
pub use signatures::{sign, sign_base64, verify, verify_base64, SignatureError};
