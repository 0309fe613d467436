//! Form bodies in a bank's charset.
//!
//! Callbacks arrive as `application/x-www-form-urlencoded` (POST body or
//! query string). Percent escapes produce raw bytes; what those bytes mean
//! depends on the bank, which we only know after looking up the record. So
//! decoding happens twice: a lossy pass to find the stamp, then a strict
//! pass in the bank's charset.

use std::borrow::Cow;

use super::{CodecError, Encoding, FieldMap};

/// Strictly decodes a form body. Later duplicates of a key win.
pub fn decode_form(raw: &[u8], encoding: Encoding) -> Result<FieldMap, CodecError> {
    let mut fields = FieldMap::new();
    for (key, value) in split_pairs(raw) {
        let key = decode_part(&key, encoding, "form key")?;
        let value = decode_part(&value, encoding, &key)?;
        fields.insert(key, value);
    }
    Ok(fields)
}

/// Decodes a form body as UTF-8, replacing invalid sequences.
///
/// Good enough to read ASCII fields such as `VK_STAMP` or `VK_MAC` before
/// the bank is known.
pub fn decode_form_lossy(raw: &[u8]) -> FieldMap {
    split_pairs(raw)
        .map(|(key, value)| {
            (
                String::from_utf8_lossy(&key).into_owned(),
                String::from_utf8_lossy(&value).into_owned(),
            )
        })
        .collect()
}

/// Encodes `fields` as a form body with values in `encoding`.
pub fn encode_form(fields: &FieldMap, encoding: Encoding) -> Result<String, CodecError> {
    let mut pairs = Vec::with_capacity(fields.len());
    for (key, value) in fields {
        let bytes = encoding
            .encode(value)
            .ok_or_else(|| CodecError::Unencodable {
                field: key.clone(),
                encoding: encoding.label(),
            })?;
        pairs.push(format!(
            "{}={}",
            urlencoding::encode(key),
            urlencoding::encode_binary(&bytes)
        ));
    }
    Ok(pairs.join("&"))
}

fn split_pairs(raw: &[u8]) -> impl Iterator<Item = (Vec<u8>, Vec<u8>)> + '_ {
    raw.split(|&b| b == b'&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut parts = segment.splitn(2, |&b| b == b'=');
            let key = parts.next().unwrap_or_default();
            let value = parts.next().unwrap_or_default();
            (unescape(key), unescape(value))
        })
}

fn unescape(part: &[u8]) -> Vec<u8> {
    let spaced: Vec<u8> = part
        .iter()
        .map(|&b| if b == b'+' { b' ' } else { b })
        .collect();
    match urlencoding::decode_binary(&spaced) {
        Cow::Borrowed(bytes) => bytes.to_vec(),
        Cow::Owned(bytes) => bytes,
    }
}

fn decode_part(bytes: &[u8], encoding: Encoding, field: &str) -> Result<String, CodecError> {
    encoding.decode(bytes).ok_or_else(|| CodecError::InvalidText {
        field: field.to_string(),
        encoding: encoding.label(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plus_and_percent_escapes() {
        let fields = decode_form(b"VK_MSG=My+cool%20payment&VK_STAMP=1", Encoding::Utf8).unwrap();
        assert_eq!(fields["VK_MSG"], "My cool payment");
        assert_eq!(fields["VK_STAMP"], "1");
    }

    #[test]
    fn test_decode_latin1_body() {
        // %F5 is õ in ISO-8859-1 and invalid as a lone UTF-8 byte.
        let raw = b"B02K_CUSTNAME=J%F5geva";
        let fields = decode_form(raw, Encoding::Latin1).unwrap();
        assert_eq!(fields["B02K_CUSTNAME"], "Jõgeva");

        let err = decode_form(raw, Encoding::Utf8).unwrap_err();
        assert!(matches!(err, CodecError::InvalidText { ref field, .. } if field == "B02K_CUSTNAME"));
    }

    #[test]
    fn test_lossy_decode_never_fails() {
        let fields = decode_form_lossy(b"VK_STAMP=7&VK_MSG=J%F5geva");
        assert_eq!(fields["VK_STAMP"], "7");
        assert!(fields["VK_MSG"].starts_with('J'));
    }

    #[test]
    fn test_missing_value_and_empty_segments() {
        let fields = decode_form(b"&VK_AUTO&VK_REF=&&", Encoding::Utf8).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["VK_AUTO"], "");
        assert_eq!(fields["VK_REF"], "");
    }

    #[test]
    fn test_last_duplicate_wins() {
        let fields = decode_form(b"VK_AUTO=N&VK_AUTO=Y", Encoding::Utf8).unwrap();
        assert_eq!(fields["VK_AUTO"], "Y");
    }

    #[test]
    fn test_encode_then_decode_in_latin1() {
        let mut fields = FieldMap::new();
        fields.insert("VK_MSG".into(), "Käsitöö & co".into());
        fields.insert("VK_MAC".into(), "ab+/=".into());
        let body = encode_form(&fields, Encoding::Latin1).unwrap();
        assert!(body.contains("K%E4sit%F6%F6%20%26%20co"));
        assert_eq!(decode_form(body.as_bytes(), Encoding::Latin1).unwrap(), fields);
    }
}
