//! # Nordea MAC
//!
//! ```text
//!   MD5( v1 & v2 & ... & vN & key & )      each token ISO-8859-1
//! ```
//!
//! Missing fields contribute an empty token, so the `&` count is fixed by
//! the field order alone. The result is 32 uppercase hex digits.

use subtle::ConstantTimeEq;

use crate::codec::{CodecError, Encoding, FieldMap};

/// Computes the MAC over `order` plus `mac_key`.
pub fn nordea_mac(fields: &FieldMap, order: &[&str], mac_key: &str) -> Result<String, CodecError> {
    let mut data = Vec::with_capacity(256);

    let values = order
        .iter()
        .map(|name| (*name, fields.get(*name).map(String::as_str).unwrap_or("")));
    for (name, value) in values.chain(std::iter::once(("mac_key", mac_key))) {
        let bytes = Encoding::Latin1
            .encode(value)
            .ok_or_else(|| CodecError::Unencodable {
                field: name.to_string(),
                encoding: Encoding::Latin1.label(),
            })?;
        data.extend_from_slice(&bytes);
        data.push(b'&');
    }

    Ok(hex::encode_upper(md5::compute(&data).0))
}

/// True if `received` equals the MAC we compute. Constant time in the MAC
/// bytes; an unencodable field is simply a mismatch.
pub fn verify_nordea_mac(fields: &FieldMap, order: &[&str], mac_key: &str, received: &str) -> bool {
    match nordea_mac(fields, order, mac_key) {
        Ok(expected) => constant_time_eq(expected.as_bytes(), received.as_bytes()),
        Err(_) => false,
    }
}

/// Byte comparison that does not short-circuit on the first difference.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
