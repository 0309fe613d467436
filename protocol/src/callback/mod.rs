//! # Inbound Callbacks
//!
//! The bank reports back twice for a payment: a server-to-server pingback
//! (`VK_AUTO=Y`) and the shopper's browser following the return link. Both
//! carry the same signed fields and either may arrive first, so handling is
//! idempotent:
//!
//! ```text
//!   raw body ─► lossy decode ─► look up record ─► decode in bank charset
//!            ─► verify signature ─► classify service code
//!            ─► compare-and-set Pending → Completed | Failed
//!            ─► notify (winner only) ─► reply
//! ```
//!
//! A signature failure never touches state. The record lookup happens on a
//! lossy first pass because the charset is a property of the bank, and the
//! bank is only known once the record is found.

pub mod auth;
pub mod message;
pub mod payment;

pub use auth::{AuthOutcome, AuthResponseHandler};
pub use message::ProtocolMessage;
pub use payment::{PaymentCallback, PaymentResponseHandler};

use crate::codec::FieldMap;
use crate::error::{BanklinkError, Result};
use crate::record::RecordKind;

/// What the host should answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackReply {
    /// Plain-text body for the bank's server-to-server pingback.
    Acknowledge(String),
    /// Send the browser on to this URL.
    Redirect(String),
}

impl CallbackReply {
    pub fn is_redirect(&self) -> bool {
        matches!(self, CallbackReply::Redirect(_))
    }
}

/// `name`, or a protocol error naming it.
fn required<'a>(fields: &'a FieldMap, name: &str) -> Result<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| BanklinkError::Protocol(format!("{name} is missing from the response")))
}

/// Parses a stamp or nonce. Anything that is not a record id cannot name a
/// record, so it is reported as not found.
fn record_id(kind: RecordKind, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| BanklinkError::not_found(kind, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_field() {
        let fields = FieldMap::from([("VK_STAMP".to_string(), "7".to_string())]);
        assert_eq!(required(&fields, "VK_STAMP").unwrap(), "7");
        assert!(matches!(
            required(&fields, "VK_MAC"),
            Err(BanklinkError::Protocol(_))
        ));
    }

    #[test]
    fn test_record_id() {
        assert_eq!(record_id(RecordKind::Transaction, " 42 ").unwrap(), 42);
        assert!(matches!(
            record_id(RecordKind::Transaction, "abc"),
            Err(BanklinkError::NotFound { .. })
        ));
        assert!(record_id(RecordKind::Authentication, "-1").is_err());
    }

    #[test]
    fn test_reply_kind() {
        assert!(CallbackReply::Redirect("/x".into()).is_redirect());
        assert!(!CallbackReply::Acknowledge("request handled".into()).is_redirect());
    }
}
