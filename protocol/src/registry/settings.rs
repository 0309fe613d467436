//! TOML settings as written by operators.
//!
//! ```toml
//! [banks.swedbank]
//! request_url = "https://banklink.example/swedbank"
//! client_id = "uid100052"
//! bank_id = "HP"
//! private_key = "certs/swed_key.pem"
//! public_key = "certs/swed_pub.pem"
//! ```
//!
//! Keys are lowercase; the upper-case spellings of older deployments are
//! accepted as aliases. Relative key paths resolve against the directory of
//! the settings file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::bank::{BankConfig, Protocol};
use super::RegistryError;
use crate::codec::Encoding;

/// The whole settings document.
#[derive(Debug, Default, Deserialize)]
pub struct BanklinkSettings {
    #[serde(default, alias = "BANKLINKS")]
    pub banks: BTreeMap<String, RawBank>,
}

/// One `[banks.<name>]` table, before validation.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawBank {
    #[serde(alias = "PROTOCOL")]
    pub protocol: Option<String>,
    #[serde(alias = "REQUEST_URL")]
    pub request_url: Option<String>,
    #[serde(alias = "CLIENT_ID")]
    pub client_id: Option<String>,
    #[serde(alias = "BANK_ID")]
    pub bank_id: Option<String>,
    #[serde(alias = "PRIVATE_KEY")]
    pub private_key: Option<PathBuf>,
    #[serde(alias = "PUBLIC_KEY")]
    pub public_key: Option<PathBuf>,
    #[serde(alias = "MAC_KEY")]
    pub mac_key: Option<String>,
    #[serde(alias = "SND_ID")]
    pub snd_id: Option<toml::Value>,
    #[serde(alias = "ENCODING")]
    pub encoding: Option<String>,
    #[serde(alias = "DIGEST_COUNTS_BYTES")]
    pub digest_counts_bytes: Option<bool>,
    #[serde(alias = "SEND_REF")]
    pub send_ref: Option<bool>,
    #[serde(rename = "type", alias = "TYPE")]
    pub link_type: Option<String>,
    #[serde(alias = "PRINTABLE_NAME")]
    pub printable_name: Option<String>,
    #[serde(alias = "IMAGE_PATH")]
    pub image_path: Option<String>,
    #[serde(alias = "ORDER")]
    pub order: Option<i64>,
}

impl BanklinkSettings {
    pub fn from_toml_str(text: &str) -> Result<Self, RegistryError> {
        toml::from_str(text).map_err(|e| RegistryError::Parse(e.to_string()))
    }
}

impl RawBank {
    /// Fills defaults and resolves paths. Presence checks that depend on
    /// the protocol are left to [`BankConfig::validate`].
    pub fn into_config(self, name: &str, base_dir: &Path) -> Result<BankConfig, RegistryError> {
        let missing = |field: &'static str| RegistryError::MissingField {
            bank: name.to_string(),
            field,
        };

        if self.snd_id.is_some() {
            return Err(RegistryError::DeprecatedSndId(name.to_string()));
        }

        let protocol = match self.protocol.as_deref() {
            None => Protocol::IPizza,
            Some(p) => p.parse().map_err(|protocol| RegistryError::UnknownProtocol {
                bank: name.to_string(),
                protocol,
            })?,
        };
        let encoding = match self.encoding.as_deref() {
            // Nordea only ever speaks ISO-8859-1.
            None if protocol == Protocol::Nordea => Encoding::Latin1,
            None => Encoding::Utf8,
            Some(e) => e.parse().map_err(|_| RegistryError::UnknownEncoding {
                bank: name.to_string(),
                encoding: e.to_string(),
            })?,
        };

        let resolve = |path: PathBuf| {
            if path.is_relative() {
                base_dir.join(path)
            } else {
                path
            }
        };

        let mut bank = match protocol {
            Protocol::IPizza => BankConfig::ipizza(
                name,
                self.request_url.ok_or_else(|| missing("request_url"))?,
                self.client_id.unwrap_or_default(),
                self.bank_id.unwrap_or_default(),
                resolve(self.private_key.ok_or_else(|| missing("private_key"))?),
                resolve(self.public_key.ok_or_else(|| missing("public_key"))?),
            ),
            Protocol::Nordea => BankConfig::nordea(
                name,
                self.request_url.ok_or_else(|| missing("request_url"))?,
                self.client_id.unwrap_or_default(),
                self.mac_key.unwrap_or_default(),
            ),
        };

        bank.encoding = encoding;
        if let Some(flag) = self.digest_counts_bytes {
            bank.digest_counts_bytes = flag;
        }
        if let Some(flag) = self.send_ref {
            bank.send_ref = flag;
        }
        if let Some(link_type) = self.link_type {
            bank.link_type = link_type;
        }
        if let Some(printable_name) = self.printable_name {
            bank.printable_name = printable_name;
        }
        if let Some(image_path) = self.image_path {
            bank.image_path = image_path;
        }
        if let Some(order) = self.order {
            bank.order = order;
        }
        Ok(bank)
    }
}
