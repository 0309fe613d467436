//! Per-bank configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use super::RegistryError;
use crate::codec::{Encoding, LengthMode};
use crate::config::{DEFAULT_BANK_ORDER, DEFAULT_LINK_TYPE, MAX_BANK_NAME_LENGTH};
use crate::crypto::KeyKind;

/// Protocol family a bank speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Swedbank, SEB, LHV, Luminor, Coop, ... RSA signatures.
    IPizza,
    /// Nordea Solo/TUPAS identification. MD5 MAC with a shared key.
    Nordea,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::IPizza => "ipizza",
            Protocol::Nordea => "nordea",
        })
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ipizza" => Ok(Protocol::IPizza),
            "nordea" => Ok(Protocol::Nordea),
            other => Err(other.to_string()),
        }
    }
}

/// One bank's settings. Built once, then only read.
#[derive(Debug, Clone, PartialEq)]
pub struct BankConfig {
    /// Registry key, also stored on every record. At most 16 characters.
    pub name: String,
    pub protocol: Protocol,
    /// Our merchant id at the bank (`VK_SND_ID`, `A01Y_RCVID`).
    pub client_id: String,
    /// The bank's id (`VK_REC_ID` in auth requests). IPizza only.
    pub bank_id: Option<String>,
    /// Where the redirect form posts to.
    pub request_url: String,
    pub private_key: Option<PathBuf>,
    pub public_key: Option<PathBuf>,
    /// Nordea shared secret.
    pub mac_key: Option<String>,
    pub encoding: Encoding,
    /// Count digest lengths in encoded bytes instead of characters.
    pub digest_counts_bytes: bool,
    /// Send a 7-3-1 reference number in `VK_REF`.
    pub send_ref: bool,
    pub link_type: String,
    pub printable_name: String,
    pub image_path: String,
    pub order: i64,
}

impl BankConfig {
    /// An IPizza bank with default presentation settings.
    pub fn ipizza(
        name: impl Into<String>,
        request_url: impl Into<String>,
        client_id: impl Into<String>,
        bank_id: impl Into<String>,
        private_key: impl Into<PathBuf>,
        public_key: impl Into<PathBuf>,
    ) -> Self {
        let name = name.into();
        Self {
            protocol: Protocol::IPizza,
            client_id: client_id.into(),
            bank_id: Some(bank_id.into()),
            request_url: request_url.into(),
            private_key: Some(private_key.into()),
            public_key: Some(public_key.into()),
            mac_key: None,
            ..Self::defaults(name)
        }
    }

    /// A Nordea bank. Nordea only speaks ISO-8859-1.
    pub fn nordea(
        name: impl Into<String>,
        request_url: impl Into<String>,
        client_id: impl Into<String>,
        mac_key: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            protocol: Protocol::Nordea,
            client_id: client_id.into(),
            request_url: request_url.into(),
            mac_key: Some(mac_key.into()),
            encoding: Encoding::Latin1,
            ..Self::defaults(name)
        }
    }

    fn defaults(name: String) -> Self {
        Self {
            protocol: Protocol::IPizza,
            client_id: String::new(),
            bank_id: None,
            request_url: String::new(),
            private_key: None,
            public_key: None,
            mac_key: None,
            encoding: Encoding::Utf8,
            digest_counts_bytes: false,
            send_ref: true,
            link_type: DEFAULT_LINK_TYPE.to_string(),
            printable_name: name.clone(),
            image_path: name.clone(),
            order: DEFAULT_BANK_ORDER,
            name,
        }
    }

    pub fn length_mode(&self) -> LengthMode {
        LengthMode::from_counts_bytes(self.digest_counts_bytes)
    }

    /// Checks everything a bank needs for its protocol, including that the
    /// key files exist. Parsing the keys is the key store's job.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.name.chars().count() > MAX_BANK_NAME_LENGTH {
            return Err(RegistryError::NameTooLong(self.name.clone()));
        }
        if self.request_url.is_empty() {
            return Err(self.missing("request_url"));
        }
        if self.client_id.is_empty() {
            return Err(self.missing("client_id"));
        }

        match self.protocol {
            Protocol::IPizza => {
                let private_key = self.private_key.as_ref().ok_or_else(|| self.missing("private_key"))?;
                let public_key = self.public_key.as_ref().ok_or_else(|| self.missing("public_key"))?;
                if self.bank_id.as_deref().map_or(true, str::is_empty) {
                    return Err(self.missing("bank_id"));
                }
                for (kind, path) in [(KeyKind::Private, private_key), (KeyKind::Public, public_key)] {
                    if !path.exists() {
                        return Err(RegistryError::KeyFileMissing {
                            bank: self.name.clone(),
                            kind,
                            path: path.clone(),
                        });
                    }
                }
            }
            Protocol::Nordea => {
                if self.mac_key.as_deref().map_or(true, str::is_empty) {
                    return Err(self.missing("mac_key"));
                }
            }
        }
        Ok(())
    }

    fn missing(&self, field: &'static str) -> RegistryError {
        RegistryError::MissingField {
            bank: self.name.clone(),
            field,
        }
    }
}
