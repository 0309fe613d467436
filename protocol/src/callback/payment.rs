//! Payment responses (IPizza 1111 / 1911).

use tracing::{debug, error, info, warn};

use super::{record_id, required, CallbackReply};
use crate::codec::fields::{VK_AUTO, VK_MAC, VK_SERVICE, VK_STAMP};
use crate::codec::{self, decode_form, decode_form_lossy, MessageType};
use crate::config::{
    AUTO_PINGBACK, PINGBACK_ACKNOWLEDGEMENT, SERVICE_PAYMENT_FAILURE, SERVICE_PAYMENT_SUCCESS,
};
use crate::crypto::verify_base64;
use crate::error::{BanklinkError, Result};
use crate::gateway::Gateway;
use crate::notify::BanklinkEvent;
use crate::record::{RecordKind, Status, Transaction};

/// Result of a handled payment callback.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentCallback {
    /// The record as stored after handling.
    pub transaction: Transaction,
    /// Outcome the bank reported.
    pub outcome: Status,
    pub reply: CallbackReply,
    /// False when the record had already been settled by an earlier
    /// callback; nothing was changed or announced.
    pub applied: bool,
}

/// Verifies and applies payment callbacks.
#[derive(Debug, Clone, Copy)]
pub struct PaymentResponseHandler<'g> {
    gateway: &'g Gateway,
}

impl<'g> PaymentResponseHandler<'g> {
    pub fn new(gateway: &'g Gateway) -> Self {
        Self { gateway }
    }

    /// Handles a raw `application/x-www-form-urlencoded` body or query
    /// string.
    pub fn handle(&self, raw: &[u8]) -> Result<PaymentCallback> {
        let preview = decode_form_lossy(raw);
        if !preview.contains_key(VK_MAC) {
            return Err(BanklinkError::Protocol(
                "VK_MAC is missing from the payment response".into(),
            ));
        }
        let stamp = record_id(RecordKind::Transaction, required(&preview, VK_STAMP)?)?;

        let transactions = self.gateway.transactions();
        let transaction = transactions
            .find_by_stamp(stamp)?
            .ok_or_else(|| BanklinkError::not_found(RecordKind::Transaction, stamp.to_string()))?;
        let bank = self.gateway.bank(&transaction.bank_name)?;

        let fields = decode_form(raw, bank.encoding)?;
        let digest = codec::digest(
            &fields,
            MessageType::PaymentResponse,
            bank.length_mode(),
            bank.encoding,
        )?;
        let key = self.gateway.keys().verifying_key(bank)?;
        if !verify_base64(&digest, required(&fields, VK_MAC)?, &key) {
            warn!(bank = %bank.name, stamp, "payment response signature rejected");
            return Err(BanklinkError::Authentication(format!(
                "invalid signature on payment response for transaction {stamp}"
            )));
        }

        let service = fields.get(VK_SERVICE).map(String::as_str).unwrap_or_default();
        let outcome = match service {
            SERVICE_PAYMENT_SUCCESS => Status::Completed,
            SERVICE_PAYMENT_FAILURE => Status::Failed,
            other => {
                error!(bank = %bank.name, stamp, service = other, "unknown payment response service");
                return Err(BanklinkError::Protocol(format!(
                    "unknown VK_SERVICE {other:?} in payment response"
                )));
            }
        };

        let applied = transactions.compare_and_set_status(stamp, Status::Pending, outcome)?;
        let transaction = transactions
            .find_by_stamp(stamp)?
            .ok_or_else(|| BanklinkError::not_found(RecordKind::Transaction, stamp.to_string()))?;
        if applied {
            info!(bank = %bank.name, stamp, status = %outcome, "transaction settled");
            let event = if outcome == Status::Completed {
                BanklinkEvent::TransactionSucceeded(transaction.clone())
            } else {
                BanklinkEvent::TransactionFailed(transaction.clone())
            };
            self.gateway.notifications().publish(&event);
        } else {
            debug!(bank = %bank.name, stamp, status = %transaction.status, "transaction already settled");
        }

        let reply = if fields.get(VK_AUTO).map(String::as_str) == Some(AUTO_PINGBACK) {
            CallbackReply::Acknowledge(PINGBACK_ACKNOWLEDGEMENT.to_string())
        } else {
            CallbackReply::Redirect(transaction.redirect_for(outcome).to_string())
        };

        Ok(PaymentCallback {
            transaction,
            outcome,
            reply,
            applied,
        })
    }
}
