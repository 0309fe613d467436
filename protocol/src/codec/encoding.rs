//! Character sets used on the wire.
//!
//! Most banks moved to UTF-8, a few still sign ISO-8859-1 bytes. The
//! Latin-1 side is true ISO-8859-1 (U+0000..U+00FF), not the windows-1252
//! that the WHATWG `iso-8859-1` label resolves to, so it goes through
//! `encoding_rs::mem` rather than `encoding_rs::Encoding::for_label`.

use std::fmt;
use std::str::FromStr;

use encoding_rs::{mem, UTF_8};

use super::CodecError;

/// Charset a bank expects for form bodies and digest bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
}

impl Encoding {
    /// Canonical label, as sent in `VK_ENCODING` and `accept-charset`.
    pub fn label(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Latin1 => "ISO-8859-1",
        }
    }

    /// Encodes `text`, or `None` if a character has no representation.
    pub fn encode(&self, text: &str) -> Option<Vec<u8>> {
        match self {
            Encoding::Utf8 => Some(text.as_bytes().to_vec()),
            Encoding::Latin1 if mem::is_str_latin1(text) => {
                Some(mem::encode_latin1_lossy(text).into_owned())
            }
            Encoding::Latin1 => None,
        }
    }

    /// Decodes `bytes` strictly. Latin-1 never fails.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            Encoding::Utf8 => UTF_8
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|text| text.into_owned()),
            Encoding::Latin1 => Some(mem::decode_latin1(bytes).into_owned()),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Encoding {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "iso-8859-1" | "iso8859-1" | "latin-1" | "latin1" => Ok(Encoding::Latin1),
            _ => Err(CodecError::UnknownEncoding(s.to_string())),
        }
    }
}
