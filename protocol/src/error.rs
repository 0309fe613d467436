//! Error types for the banklink engine.
//!
//! Every public operation returns a [`BanklinkError`]. The variants follow
//! who is at fault: a misconfigured bank, a malformed or forged message from
//! the outside, a record that does not exist, or a bug on our side. Module
//! errors convert into it with `From`, so `?` does the classification.

use thiserror::Error;

use crate::codec::CodecError;
use crate::crypto::keys::KeyError;
use crate::crypto::signatures::SignatureError;
use crate::record::RecordKind;
use crate::registry::RegistryError;
use crate::storage::StoreError;

/// Errors surfaced by request builders and callback handlers.
#[derive(Debug, Error)]
pub enum BanklinkError {
    /// Bank settings are missing, unknown or unusable (keys included).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The message is malformed or carries fields we do not understand.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Signature or MAC verification failed.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// No record matches the stamp or nonce in the message.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Which record family was searched.
        kind: RecordKind,
        /// The identifier as received.
        id: String,
    },

    /// A freshly built request failed its own post-sign checks.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// The record store failed underneath us.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BanklinkError>;

impl BanklinkError {
    /// Short machine-readable name, used as a metrics label and in API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            BanklinkError::Configuration(_) => "configuration",
            BanklinkError::Protocol(_) => "protocol",
            BanklinkError::Authentication(_) => "authentication",
            BanklinkError::NotFound { .. } => "not_found",
            BanklinkError::InvariantViolation(_) => "invariant_violation",
            BanklinkError::Storage(_) => "storage",
        }
    }

    pub(crate) fn not_found(kind: RecordKind, id: impl Into<String>) -> Self {
        BanklinkError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<CodecError> for BanklinkError {
    fn from(err: CodecError) -> Self {
        BanklinkError::Protocol(err.to_string())
    }
}

impl From<RegistryError> for BanklinkError {
    fn from(err: RegistryError) -> Self {
        BanklinkError::Configuration(err.to_string())
    }
}

impl From<KeyError> for BanklinkError {
    fn from(err: KeyError) -> Self {
        BanklinkError::Configuration(err.to_string())
    }
}

impl From<SignatureError> for BanklinkError {
    fn from(err: SignatureError) -> Self {
        BanklinkError::InvariantViolation(err.to_string())
    }
}
