//! The length-prefixed digest that IPizza signatures cover.

use rust_decimal::{Decimal, RoundingStrategy};

use super::{CodecError, Encoding, FieldMap, MessageType};
use crate::config::{LENGTH_PREFIX_WIDTH, MAX_FIELD_LENGTH};

/// What the 3-digit prefix counts.
///
/// The published format counts characters. Some bank test environments
/// count encoded bytes instead, which only differs for non-ASCII values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LengthMode {
    #[default]
    Characters,
    Bytes,
}

impl LengthMode {
    /// Maps the per-bank `digest_counts_bytes` flag.
    pub fn from_counts_bytes(counts_bytes: bool) -> Self {
        if counts_bytes {
            LengthMode::Bytes
        } else {
            LengthMode::Characters
        }
    }

    fn measure(&self, value: &str, encoded: &[u8]) -> usize {
        match self {
            LengthMode::Characters => value.chars().count(),
            LengthMode::Bytes => encoded.len(),
        }
    }
}

/// Serializes `fields` for signing.
///
/// Walks the canonical order of `message_type`, skipping fields that are not
/// in the map, and emits `<len:03><value>` for each one in `encoding`.
/// Values whose length needs more than three digits are rejected, never
/// truncated.
pub fn digest(
    fields: &FieldMap,
    message_type: MessageType,
    mode: LengthMode,
    encoding: Encoding,
) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(256);

    for name in message_type.canonical_order() {
        let Some(value) = fields.get(*name) else {
            continue;
        };
        let encoded = encode_value(name, value, encoding)?;
        let length = checked_length(name, value, &encoded, mode)?;
        out.extend_from_slice(format!("{length:0width$}", width = LENGTH_PREFIX_WIDTH).as_bytes());
        out.extend_from_slice(&encoded);
    }

    Ok(out)
}

/// Length a single value will be prefixed with, or the error `digest`
/// would raise for it. Lets builders reject bad input before anything is
/// persisted.
pub fn measure_field(
    name: &str,
    value: &str,
    mode: LengthMode,
    encoding: Encoding,
) -> Result<usize, CodecError> {
    let encoded = encode_value(name, value, encoding)?;
    checked_length(name, value, &encoded, mode)
}

/// Splits a digest back into fields.
///
/// `present` names the fields that were in the signed map; they are read in
/// canonical order, exactly as [`digest`] wrote them.
pub fn parse_digest(
    digest: &[u8],
    message_type: MessageType,
    present: &[&str],
    mode: LengthMode,
    encoding: Encoding,
) -> Result<FieldMap, CodecError> {
    let text = encoding
        .decode(digest)
        .ok_or_else(|| CodecError::InvalidText {
            field: "digest".into(),
            encoding: encoding.label(),
        })?;

    let mut rest = text.as_str();
    let mut fields = FieldMap::new();

    for name in message_type
        .canonical_order()
        .iter()
        .filter(|name| present.contains(name))
    {
        let prefix = rest
            .get(..LENGTH_PREFIX_WIDTH)
            .filter(|p| p.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| CodecError::MalformedDigest(format!("bad length prefix for {name}")))?;
        let length: usize = prefix
            .parse()
            .map_err(|_| CodecError::MalformedDigest(format!("bad length prefix for {name}")))?;
        let tail = &rest[LENGTH_PREFIX_WIDTH..];

        let end = value_end(tail, length, mode, encoding)
            .ok_or_else(|| CodecError::MalformedDigest(format!("{name} is shorter than {length}")))?;
        fields.insert((*name).to_string(), tail[..end].to_string());
        rest = &tail[end..];
    }

    if !rest.is_empty() {
        return Err(CodecError::MalformedDigest(format!(
            "{} trailing characters",
            rest.chars().count()
        )));
    }
    Ok(fields)
}

/// Renders an amount the way banks expect it: two decimals, dot separator,
/// half away from zero.
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.2}")
}

fn encode_value(name: &str, value: &str, encoding: Encoding) -> Result<Vec<u8>, CodecError> {
    encoding.encode(value).ok_or_else(|| CodecError::Unencodable {
        field: name.to_string(),
        encoding: encoding.label(),
    })
}

fn checked_length(
    name: &str,
    value: &str,
    encoded: &[u8],
    mode: LengthMode,
) -> Result<usize, CodecError> {
    let length = mode.measure(value, encoded);
    if length > MAX_FIELD_LENGTH {
        return Err(CodecError::FieldTooLong {
            field: name.to_string(),
            length,
        });
    }
    Ok(length)
}

/// Byte offset in `tail` where a value of `length` units ends.
fn value_end(tail: &str, length: usize, mode: LengthMode, encoding: Encoding) -> Option<usize> {
    let mut consumed = 0;
    for (idx, ch) in tail.char_indices() {
        if consumed == length {
            return Some(idx);
        }
        consumed += match (mode, encoding) {
            (LengthMode::Characters, _) | (LengthMode::Bytes, Encoding::Latin1) => 1,
            (LengthMode::Bytes, Encoding::Utf8) => ch.len_utf8(),
        };
        if consumed > length {
            return None;
        }
    }
    (consumed == length).then_some(tail.len())
}
