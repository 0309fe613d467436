//! # Outbound Requests
//!
//! A request goes through four stages before it leaves the building:
//!
//! ```text
//!   Created ──► Prepared ──► Signed ──► Ready
//!   record      fields       VK_MAC /   post-sign checks passed,
//!   persisted   filled in    A01Y_MAC   RedirectForm handed out
//! ```
//!
//! Bank settings and key material are resolved before the record is
//! persisted, so a misconfigured bank leaves no orphan `Pending` records.
//! The post-sign check re-verifies our own signature: a form that would be
//! rejected by the bank is an [`InvariantViolation`] here instead of a
//! confused shopper there.
//!
//! [`InvariantViolation`]: crate::BanklinkError::InvariantViolation

pub mod auth;
pub mod form;
pub mod payment;

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::RsaPublicKey;

pub use auth::{AuthRequest, AuthRequestBuilder};
pub use form::RedirectForm;
pub use payment::{PaymentRequest, PaymentRequestBuilder};

use crate::codec::FieldMap;
use crate::config::EXPECTED_SIGNATURE_LENGTH;
use crate::crypto::verify;
use crate::error::{BanklinkError, Result};

/// Language of the bank's pages (`VK_LANG`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    #[default]
    Est,
    Eng,
    Rus,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Est => "EST",
            Language::Eng => "ENG",
            Language::Rus => "RUS",
        }
    }

    /// Maps a locale such as `en-US` or `ru`; anything else is Estonian.
    pub fn from_locale(locale: &str) -> Self {
        let primary = locale
            .split(|c| c == '-' || c == '_')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "en" => Language::Eng,
            "ru" => Language::Rus,
            _ => Language::Est,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = BanklinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "EST" | "ET" => Ok(Language::Est),
            "ENG" | "EN" => Ok(Language::Eng),
            "RUS" | "RU" => Ok(Language::Rus),
            other => Err(BanklinkError::Protocol(format!(
                "unsupported language {other}, expected EST, ENG or RUS"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Post-sign checks
// ---------------------------------------------------------------------------

/// Every `required` field is present and non-empty.
fn require_fields(fields: &FieldMap, required: &[&str]) -> Result<()> {
    for name in required {
        match fields.get(*name) {
            Some(value) if !value.is_empty() => {}
            _ => {
                return Err(BanklinkError::InvariantViolation(format!(
                    "signed request is missing {name}"
                )))
            }
        }
    }
    Ok(())
}

/// `mac` decodes to a full-length signature that verifies over `digest`.
fn check_rsa_mac(digest: &[u8], mac: &str, key: &RsaPublicKey) -> Result<()> {
    let raw = STANDARD
        .decode(mac)
        .map_err(|e| BanklinkError::InvariantViolation(format!("VK_MAC is not base64: {e}")))?;
    if raw.len() != EXPECTED_SIGNATURE_LENGTH {
        return Err(BanklinkError::InvariantViolation(format!(
            "VK_MAC decodes to {} bytes, expected {EXPECTED_SIGNATURE_LENGTH}",
            raw.len()
        )));
    }
    if !verify(digest, &raw, key) {
        return Err(BanklinkError::InvariantViolation(
            "VK_MAC does not verify against the signing key".into(),
        ));
    }
    Ok(())
}

/// Rejects input the banks cannot carry before anything is persisted.
fn require_input<T>(value: Option<T>, what: &str) -> Result<T> {
    value.ok_or_else(|| BanklinkError::Protocol(format!("{what} is required")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_codes() {
        assert_eq!(Language::default().code(), "EST");
        assert_eq!(Language::Rus.to_string(), "RUS");
        assert_eq!("eng".parse::<Language>().unwrap(), Language::Eng);
        assert!("FIN".parse::<Language>().is_err());
    }

    #[test]
    fn test_language_from_locale() {
        assert_eq!(Language::from_locale("en-US"), Language::Eng);
        assert_eq!(Language::from_locale("ru_RU"), Language::Rus);
        assert_eq!(Language::from_locale("et"), Language::Est);
        assert_eq!(Language::from_locale("fi"), Language::Est);
        assert_eq!(Language::from_locale(""), Language::Est);
    }

    #[test]
    fn test_require_fields_rejects_empty_values() {
        let fields = FieldMap::from([
            ("A".to_string(), "1".to_string()),
            ("B".to_string(), String::new()),
        ]);
        assert!(require_fields(&fields, &["A"]).is_ok());
        assert!(matches!(
            require_fields(&fields, &["A", "B"]),
            Err(BanklinkError::InvariantViolation(_))
        ));
        assert!(require_fields(&fields, &["C"]).is_err());
    }
}
