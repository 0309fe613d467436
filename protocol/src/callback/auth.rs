//! Authentication responses: IPizza 3012 / 3013 and Nordea B02K.

use tracing::{debug, info, warn};

use super::{record_id, required, ProtocolMessage};
use crate::codec::fields::*;
use crate::codec::{self, decode_form, decode_form_lossy, Encoding, FieldMap, MessageType};
use crate::config::{NORDEA_VERSION, SERVICE_AUTH_RESPONSE};
use crate::crypto::{verify_base64, verify_nordea_mac};
use crate::error::{BanklinkError, Result};
use crate::gateway::Gateway;
use crate::notify::BanklinkEvent;
use crate::record::{Authentication, RecordKind, Status};
use crate::registry::{BankConfig, Protocol};

/// Result of a handled identification callback.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthOutcome {
    pub authentication: Authentication,
    /// Where to send the browser next.
    pub redirect_url: String,
    /// `VK_USER_NAME` or `B02K_CUSTNAME`.
    pub user_name: Option<String>,
    /// `VK_USER_ID` or `B02K_CUSTID`.
    pub person_code: Option<String>,
    pub protocol: Protocol,
    /// False when an earlier callback already settled the record.
    pub applied: bool,
}

impl AuthOutcome {
    pub fn succeeded(&self) -> bool {
        self.authentication.status == Status::Completed
    }
}

/// Verifies and applies identification callbacks for both protocols.
#[derive(Debug, Clone, Copy)]
pub struct AuthResponseHandler<'g> {
    gateway: &'g Gateway,
}

impl<'g> AuthResponseHandler<'g> {
    pub fn new(gateway: &'g Gateway) -> Self {
        Self { gateway }
    }

    pub fn handle(&self, raw: &[u8]) -> Result<AuthOutcome> {
        match ProtocolMessage::detect(decode_form_lossy(raw))? {
            ProtocolMessage::IPizza(preview) => self.handle_ipizza(raw, &preview),
            ProtocolMessage::Nordea(preview) => self.handle_nordea(raw, &preview),
        }
    }

    fn handle_ipizza(&self, raw: &[u8], preview: &FieldMap) -> Result<AuthOutcome> {
        let authentication = self.lookup(required(preview, VK_NONCE)?)?;
        let bank = self.gateway.bank(&authentication.bank_name)?;
        expect_protocol(bank, Protocol::IPizza)?;

        let fields = decode_form(raw, bank.encoding)?;
        let service = fields.get(VK_SERVICE).map(String::as_str).unwrap_or_default();
        let digest = codec::digest(
            &fields,
            MessageType::for_auth_response(service),
            bank.length_mode(),
            bank.encoding,
        )?;
        let key = self.gateway.keys().verifying_key(bank)?;
        if !verify_base64(&digest, required(&fields, VK_MAC)?, &key) {
            warn!(bank = %bank.name, nonce = authentication.id, "auth response signature rejected");
            return Err(BanklinkError::Authentication(format!(
                "invalid signature on auth response for authentication {}",
                authentication.id
            )));
        }

        let outcome = if service == SERVICE_AUTH_RESPONSE {
            Status::Completed
        } else {
            Status::Failed
        };
        let (authentication, applied) = self.settle(authentication.id, outcome, &fields)?;

        Ok(AuthOutcome {
            redirect_url: authentication.redirect_for(outcome).to_string(),
            user_name: fields.get(VK_USER_NAME).cloned(),
            person_code: fields.get(VK_USER_ID).cloned(),
            protocol: Protocol::IPizza,
            authentication,
            applied,
        })
    }

    fn handle_nordea(&self, raw: &[u8], preview: &FieldMap) -> Result<AuthOutcome> {
        let authentication = self.lookup(required(preview, B02K_STAMP)?)?;
        let bank = self.gateway.bank(&authentication.bank_name)?;
        expect_protocol(bank, Protocol::Nordea)?;
        let mac_key = bank.mac_key.as_deref().ok_or_else(|| {
            BanklinkError::Configuration(format!(
                "mac_key not found in settings for bank {}",
                bank.name
            ))
        })?;

        let fields = decode_form(raw, Encoding::Latin1)?;
        let received = required(&fields, B02K_MAC)?;
        if !verify_nordea_mac(&fields, NORDEA_AUTH_RESPONSE_ORDER, mac_key, received) {
            warn!(bank = %bank.name, nonce = authentication.id, "auth response MAC rejected");
            return Err(BanklinkError::Authentication(format!(
                "invalid MAC on auth response for authentication {}",
                authentication.id
            )));
        }
        let version = fields.get(B02K_VERS).map(String::as_str).unwrap_or_default();
        if version != NORDEA_VERSION {
            return Err(BanklinkError::Protocol(format!(
                "unsupported B02K_VERS {version:?}, expected {NORDEA_VERSION}"
            )));
        }

        // Nordea only reports successful identifications.
        let (authentication, applied) = self.settle(authentication.id, Status::Completed, &fields)?;

        Ok(AuthOutcome {
            redirect_url: authentication.redirect_after_success.clone(),
            user_name: fields.get(B02K_CUSTNAME).cloned(),
            person_code: fields.get(B02K_CUSTID).cloned(),
            protocol: Protocol::Nordea,
            authentication,
            applied,
        })
    }

    fn lookup(&self, nonce: &str) -> Result<Authentication> {
        let id = record_id(RecordKind::Authentication, nonce)?;
        self.gateway
            .authentications()
            .find_by_nonce(id)?
            .ok_or_else(|| BanklinkError::not_found(RecordKind::Authentication, nonce))
    }

    /// Moves a pending record to `outcome`, keeping the raw response.
    fn settle(&self, id: u64, outcome: Status, raw: &FieldMap) -> Result<(Authentication, bool)> {
        let store = self.gateway.authentications();
        let applied = store.compare_and_set_status(id, Status::Pending, outcome, raw)?;
        let authentication = store
            .find_by_nonce(id)?
            .ok_or_else(|| BanklinkError::not_found(RecordKind::Authentication, id.to_string()))?;

        if applied {
            info!(bank = %authentication.bank_name, nonce = id, status = %outcome, "authentication settled");
            let event = if outcome == Status::Completed {
                BanklinkEvent::AuthSucceeded(authentication.clone())
            } else {
                BanklinkEvent::AuthFailed(authentication.clone())
            };
            self.gateway.notifications().publish(&event);
        } else {
            debug!(
                bank = %authentication.bank_name,
                nonce = id,
                status = %authentication.status,
                "authentication already settled"
            );
        }
        Ok((authentication, applied))
    }
}

/// The payload's protocol has to be the one the record's bank speaks.
fn expect_protocol(bank: &BankConfig, received: Protocol) -> Result<()> {
    if bank.protocol != received {
        warn!(bank = %bank.name, %received, "auth response in the wrong protocol");
        return Err(BanklinkError::Protocol(format!(
            "{received} response for a {} bank",
            bank.protocol
        )));
    }
    Ok(())
}
