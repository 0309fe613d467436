//! # Key Management
//!
//! Banks hand out RSA keys as PEM files: the merchant's private key (often
//! PKCS#1 `BEGIN RSA PRIVATE KEY` straight out of `openssl genrsa`) and the
//! bank's public key (usually SPKI `BEGIN PUBLIC KEY`, sometimes a bare
//! PKCS#1 key). Both flavours are accepted.
//!
//! Parsing a 2048-bit key is not free, so [`KeyStore`] keeps parsed keys per
//! bank. Hosts call [`KeyStore::preload`] at startup so that a bad key file
//! stops the process instead of the first customer's checkout.
//!
//! Key bytes are never logged.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use thiserror::Error;
use tracing::debug;

use crate::config::RSA_KEY_BITS;
use crate::registry::{BankConfig, BankConfigRegistry, Protocol};

/// Which half of a bank's key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// Our signing key for requests to this bank.
    Private,
    /// The bank's verification key for its responses.
    Public,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeyKind::Private => "private",
            KeyKind::Public => "public",
        })
    }
}

/// Errors while locating or parsing key material.
///
/// Messages name the bank and the path, never the key contents.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("bank {bank} has no {kind} key configured")]
    NotConfigured { bank: String, kind: KeyKind },

    #[error("{kind} key file {} for bank {bank} could not be read: {reason}", path.display())]
    Unreadable {
        bank: String,
        kind: KeyKind,
        path: PathBuf,
        reason: String,
    },

    #[error("{kind} key file {} for bank {bank} is not a PEM RSA key", path.display())]
    InvalidPem {
        bank: String,
        kind: KeyKind,
        path: PathBuf,
    },

    #[error("{kind} key for bank {bank} is {bits} bits, banklink keys are {expected} bits")]
    UnexpectedSize {
        bank: String,
        kind: KeyKind,
        bits: usize,
        expected: usize,
    },
}

// ---------------------------------------------------------------------------
// PEM Parsing
// ---------------------------------------------------------------------------

/// Parses a PKCS#1 or PKCS#8 PEM private key.
pub fn parse_private_key_pem(pem: &str) -> Option<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs1_pem(pem)
        .ok()
        .or_else(|| RsaPrivateKey::from_pkcs8_pem(pem).ok())
}

/// Parses an SPKI or PKCS#1 PEM public key.
pub fn parse_public_key_pem(pem: &str) -> Option<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem)
        .ok()
        .or_else(|| RsaPublicKey::from_pkcs1_pem(pem).ok())
}

/// Reads and parses a private key file, enforcing the key size.
pub fn load_private_key(bank: &str, path: &Path) -> Result<RsaPrivateKey, KeyError> {
    let pem = read_pem(bank, KeyKind::Private, path)?;
    let key = parse_private_key_pem(&pem).ok_or_else(|| KeyError::InvalidPem {
        bank: bank.to_string(),
        kind: KeyKind::Private,
        path: path.to_path_buf(),
    })?;
    check_size(bank, KeyKind::Private, key.size())?;
    Ok(key)
}

/// Reads and parses a public key file, enforcing the key size.
pub fn load_public_key(bank: &str, path: &Path) -> Result<RsaPublicKey, KeyError> {
    let pem = read_pem(bank, KeyKind::Public, path)?;
    let key = parse_public_key_pem(&pem).ok_or_else(|| KeyError::InvalidPem {
        bank: bank.to_string(),
        kind: KeyKind::Public,
        path: path.to_path_buf(),
    })?;
    check_size(bank, KeyKind::Public, key.size())?;
    Ok(key)
}

fn read_pem(bank: &str, kind: KeyKind, path: &Path) -> Result<String, KeyError> {
    fs::read_to_string(path).map_err(|e| KeyError::Unreadable {
        bank: bank.to_string(),
        kind,
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn check_size(bank: &str, kind: KeyKind, modulus_bytes: usize) -> Result<(), KeyError> {
    let bits = modulus_bytes * 8;
    if bits != RSA_KEY_BITS {
        return Err(KeyError::UnexpectedSize {
            bank: bank.to_string(),
            kind,
            bits,
            expected: RSA_KEY_BITS,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// KeyStore
// ---------------------------------------------------------------------------

/// Parsed keys per bank, filled on first use or by [`KeyStore::preload`].
///
/// Safe to share behind an `Arc`; lookups never block each other.
#[derive(Debug, Default)]
pub struct KeyStore {
    private: DashMap<String, Arc<RsaPrivateKey>>,
    public: DashMap<String, Arc<RsaPublicKey>>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The merchant signing key for `bank`.
    pub fn signing_key(&self, bank: &BankConfig) -> Result<Arc<RsaPrivateKey>, KeyError> {
        if let Some(cached) = self.private.get(&bank.name) {
            return Ok(Arc::clone(cached.value()));
        }

        let path = bank
            .private_key
            .as_deref()
            .ok_or_else(|| KeyError::NotConfigured {
                bank: bank.name.clone(),
                kind: KeyKind::Private,
            })?;
        let key = Arc::new(load_private_key(&bank.name, path)?);
        debug!(bank = %bank.name, "loaded private key");
        self.private.insert(bank.name.clone(), Arc::clone(&key));
        Ok(key)
    }

    /// The bank's verification key.
    pub fn verifying_key(&self, bank: &BankConfig) -> Result<Arc<RsaPublicKey>, KeyError> {
        if let Some(cached) = self.public.get(&bank.name) {
            return Ok(Arc::clone(cached.value()));
        }

        let path = bank
            .public_key
            .as_deref()
            .ok_or_else(|| KeyError::NotConfigured {
                bank: bank.name.clone(),
                kind: KeyKind::Public,
            })?;
        let key = Arc::new(load_public_key(&bank.name, path)?);
        debug!(bank = %bank.name, "loaded public key");
        self.public.insert(bank.name.clone(), Arc::clone(&key));
        Ok(key)
    }

    /// Parses every IPizza key in `registry`. Returns how many keys are
    /// cached afterwards.
    pub fn preload(&self, registry: &BankConfigRegistry) -> Result<usize, KeyError> {
        for bank in registry.banks().filter(|b| b.protocol == Protocol::IPizza) {
            self.signing_key(bank)?;
            self.verifying_key(bank)?;
        }
        Ok(self.len())
    }

    /// Number of cached keys, private and public together.
    pub fn len(&self) -> usize {
        self.private.len() + self.public.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
