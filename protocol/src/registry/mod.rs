//! # Bank Configuration Registry
//!
//! Built once at startup from operator settings, validated as a whole, and
//! then shared read-only (`Arc<BankConfigRegistry>`) with every builder and
//! handler. Nothing mutates it afterwards; reloading settings means building
//! a new registry.

pub mod bank;
pub mod settings;

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

pub use bank::{BankConfig, Protocol};
pub use settings::{BanklinkSettings, RawBank};

use crate::crypto::KeyKind;

/// Configuration problems, reported with the offending bank and setting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("no banks configured")]
    Empty,

    #[error("bank name {0} is longer than 16 characters")]
    NameTooLong(String),

    #[error("{field} not found in settings for bank {bank}")]
    MissingField { bank: String, field: &'static str },

    #[error("snd_id is removed, use client_id instead (bank {0})")]
    DeprecatedSndId(String),

    #[error("{kind} key file {} for bank {bank} does not exist", path.display())]
    KeyFileMissing {
        bank: String,
        kind: KeyKind,
        path: PathBuf,
    },

    #[error("unknown protocol {protocol} for bank {bank}")]
    UnknownProtocol { bank: String, protocol: String },

    #[error("unknown encoding {encoding} for bank {bank}")]
    UnknownEncoding { bank: String, encoding: String },

    #[error("bank {0} is configured more than once")]
    Duplicate(String),

    #[error("unknown bank {0}")]
    UnknownBank(String),

    #[error("failed to read settings file {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },

    #[error("invalid banklink settings: {0}")]
    Parse(String),
}

/// A bank as offered to the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankChoice {
    pub name: String,
    pub printable_name: String,
    pub image_path: String,
    pub order: i64,
}

/// All configured banks by name.
#[derive(Debug, Clone)]
pub struct BankConfigRegistry {
    banks: BTreeMap<String, BankConfig>,
}

impl BankConfigRegistry {
    /// Validates and indexes `banks`. Fails on the first invalid bank.
    pub fn new(banks: impl IntoIterator<Item = BankConfig>) -> Result<Self, RegistryError> {
        let mut indexed = BTreeMap::new();
        for bank in banks {
            bank.validate()?;
            if indexed.contains_key(&bank.name) {
                return Err(RegistryError::Duplicate(bank.name));
            }
            indexed.insert(bank.name.clone(), bank);
        }
        if indexed.is_empty() {
            return Err(RegistryError::Empty);
        }
        Ok(Self { banks: indexed })
    }

    /// Builds the registry from parsed settings. Relative key paths resolve
    /// against `base_dir`.
    pub fn from_settings(settings: BanklinkSettings, base_dir: &Path) -> Result<Self, RegistryError> {
        let mut banks = Vec::with_capacity(settings.banks.len());
        for (name, raw) in settings.banks {
            if name.chars().count() > crate::config::MAX_BANK_NAME_LENGTH {
                return Err(RegistryError::NameTooLong(name));
            }
            banks.push(raw.into_config(&name, base_dir)?);
        }
        Self::new(banks)
    }

    pub fn from_toml_str(text: &str, base_dir: &Path) -> Result<Self, RegistryError> {
        Self::from_settings(BanklinkSettings::from_toml_str(text)?, base_dir)
    }

    /// Loads a TOML settings file; key paths are relative to its directory.
    pub fn from_file(path: &Path) -> Result<Self, RegistryError> {
        let text = fs::read_to_string(path).map_err(|e| RegistryError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&text, base_dir)
    }

    pub fn get(&self, name: &str) -> Option<&BankConfig> {
        self.banks.get(name)
    }

    /// Like [`get`](Self::get), but an unknown bank is an error.
    pub fn require(&self, name: &str) -> Result<&BankConfig, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::UnknownBank(name.to_string()))
    }

    pub fn banks(&self) -> impl Iterator<Item = &BankConfig> {
        self.banks.values()
    }

    pub fn len(&self) -> usize {
        self.banks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }

    /// Every bank, ordered by display order and then name.
    pub fn bank_choices(&self) -> Vec<BankChoice> {
        self.bank_choices_with(&HashMap::new(), None)
    }

    /// Bank choices for one checkout form: `overrides` replaces display
    /// orders, `allowed` (when given) restricts which banks are offered.
    pub fn bank_choices_with(
        &self,
        overrides: &HashMap<String, i64>,
        allowed: Option<&[&str]>,
    ) -> Vec<BankChoice> {
        let mut choices: Vec<BankChoice> = self
            .banks()
            .filter(|bank| allowed.map_or(true, |names| names.contains(&bank.name.as_str())))
            .map(|bank| BankChoice {
                name: bank.name.clone(),
                printable_name: bank.printable_name.clone(),
                image_path: bank.image_path.clone(),
                order: overrides.get(&bank.name).copied().unwrap_or(bank.order),
            })
            .collect();
        choices.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
        choices
    }
}
