//! Authentication requests: IPizza 4012 and Nordea e-identification.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rsa::RsaPrivateKey;
use tracing::{debug, info};

use super::{check_rsa_mac, require_fields, require_input, RedirectForm};
use crate::codec::fields::*;
use crate::codec::{self, digest::measure_field, FieldMap, MessageType};
use crate::config::{
    DATETIME_FORMAT, IPIZZA_VERSION, MAX_NONCE_LENGTH, NORDEA_ACTION_ID, NORDEA_ALGORITHM,
    NORDEA_ID_TYPE, NORDEA_KEY_VERSION, NORDEA_LANGUAGE, NORDEA_VERSION, SERVICE_AUTH_REQUEST,
    SERVICE_AUTH_RESPONSE,
};
use crate::crypto::{nordea_mac, sign_base64, verify_nordea_mac};
use crate::error::{BanklinkError, Result};
use crate::gateway::Gateway;
use crate::notify::BanklinkEvent;
use crate::record::{Authentication, NewAuthentication};
use crate::registry::{BankConfig, Protocol};

const IPIZZA_FORM_ORDER: &[&str] = &[
    VK_SERVICE,
    VK_VERSION,
    VK_SND_ID,
    VK_REC_ID,
    VK_NONCE,
    VK_RETURN,
    VK_DATETIME,
    VK_RID,
    VK_MAC,
    VK_REPLY,
    VK_ENCODING,
];

/// `VK_RID` is sent empty on purpose.
const IPIZZA_REQUIRED_FIELDS: &[&str] = &[
    VK_SERVICE,
    VK_VERSION,
    VK_SND_ID,
    VK_REC_ID,
    VK_NONCE,
    VK_RETURN,
    VK_DATETIME,
    VK_REPLY,
    VK_ENCODING,
    VK_MAC,
];

/// A signed identification redirect and the record it created.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub authentication: Authentication,
    pub form: RedirectForm,
    pub protocol: Protocol,
}

/// Builder for "log in with your bank" redirects.
#[derive(Debug, Clone)]
pub struct AuthRequestBuilder {
    bank: String,
    return_url: Option<String>,
    redirect_after_success: Option<String>,
    redirect_on_failure: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

/// What a bank needs to authenticate the request, resolved before anything
/// is persisted.
enum Credentials {
    Rsa(Arc<RsaPrivateKey>),
    Mac(String),
}

impl AuthRequestBuilder {
    pub fn new(bank: impl Into<String>) -> Self {
        Self {
            bank: bank.into(),
            return_url: None,
            redirect_after_success: None,
            redirect_on_failure: None,
            created_at: None,
        }
    }

    /// Callback URL the bank answers on. Usually
    /// [`auth_callback_url`](crate::config::auth_callback_url).
    pub fn return_url(mut self, url: impl Into<String>) -> Self {
        self.return_url = Some(url.into());
        self
    }

    pub fn redirect_to(mut self, url: impl Into<String>) -> Self {
        self.redirect_after_success = Some(url.into());
        self
    }

    /// Defaults to the success redirect.
    pub fn redirect_on_failure(mut self, url: impl Into<String>) -> Self {
        self.redirect_on_failure = Some(url.into());
        self
    }

    pub fn created_at(mut self, created: DateTime<Utc>) -> Self {
        self.created_at = Some(created);
        self
    }

    /// Persists a `Pending` authentication and returns its signed redirect.
    pub fn build(self, gateway: &Gateway) -> Result<AuthRequest> {
        let bank = gateway.bank(&self.bank)?;
        let return_url = require_input(self.return_url, "return URL")?;
        let redirect_after_success = require_input(self.redirect_after_success, "success redirect")?;
        let redirect_on_failure = self
            .redirect_on_failure
            .unwrap_or_else(|| redirect_after_success.clone());

        let credentials = match bank.protocol {
            Protocol::IPizza => {
                measure_field(VK_RETURN, &return_url, bank.length_mode(), bank.encoding)?;
                Credentials::Rsa(gateway.keys().signing_key(bank)?)
            }
            Protocol::Nordea => {
                let mac_key = bank
                    .mac_key
                    .clone()
                    .filter(|key| !key.is_empty())
                    .ok_or_else(|| {
                        BanklinkError::Configuration(format!(
                            "mac_key not found in settings for bank {}",
                            bank.name
                        ))
                    })?;
                if codec::Encoding::Latin1.encode(&return_url).is_none() {
                    return Err(BanklinkError::Protocol(
                        "return URL is not representable in ISO-8859-1".into(),
                    ));
                }
                Credentials::Mac(mac_key)
            }
        };

        // Created
        let authentication = gateway.authentications().save(NewAuthentication {
            bank_name: bank.name.clone(),
            created: self.created_at.unwrap_or_else(Utc::now),
            redirect_after_success,
            redirect_on_failure,
        })?;
        debug!(bank = %bank.name, nonce = authentication.id, "auth request created");
        gateway
            .notifications()
            .publish(&BanklinkEvent::AuthStarted(authentication.clone()));

        let form = match credentials {
            Credentials::Rsa(key) => ipizza_form(bank, &authentication, &return_url, &key)?,
            Credentials::Mac(mac_key) => nordea_form(bank, &authentication, &return_url, &mac_key)?,
        };

        info!(
            bank = %bank.name,
            nonce = authentication.id,
            protocol = %bank.protocol,
            "auth request ready"
        );
        Ok(AuthRequest {
            authentication,
            form,
            protocol: bank.protocol,
        })
    }
}

fn ipizza_form(
    bank: &BankConfig,
    authentication: &Authentication,
    return_url: &str,
    key: &RsaPrivateKey,
) -> Result<RedirectForm> {
    let nonce = authentication.nonce();
    if nonce.len() > MAX_NONCE_LENGTH {
        return Err(BanklinkError::InvariantViolation(format!(
            "nonce {nonce} is longer than {MAX_NONCE_LENGTH} characters"
        )));
    }

    let mut fields: FieldMap = [
        (VK_SERVICE, SERVICE_AUTH_REQUEST.to_string()),
        (VK_VERSION, IPIZZA_VERSION.to_string()),
        (VK_SND_ID, bank.client_id.clone()),
        (VK_REC_ID, bank.bank_id.clone().unwrap_or_default()),
        (VK_NONCE, nonce),
        (VK_RETURN, return_url.to_string()),
        (VK_DATETIME, authentication.created.format(DATETIME_FORMAT).to_string()),
        (VK_RID, String::new()),
        (VK_REPLY, SERVICE_AUTH_RESPONSE.to_string()),
        (VK_ENCODING, bank.encoding.label().to_string()),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .collect();
    debug!(bank = %bank.name, nonce = authentication.id, "auth request prepared");

    let digest = codec::digest(&fields, MessageType::AuthRequest, bank.length_mode(), bank.encoding)?;
    let mac = sign_base64(&digest, key)?;
    debug!(bank = %bank.name, nonce = authentication.id, "auth request signed");

    check_rsa_mac(&digest, &mac, &key.to_public_key())?;
    fields.insert(VK_MAC.to_string(), mac);
    require_fields(&fields, IPIZZA_REQUIRED_FIELDS)?;

    Ok(RedirectForm::new(
        bank.request_url.clone(),
        bank.encoding,
        fields,
        IPIZZA_FORM_ORDER,
    ))
}

fn nordea_form(
    bank: &BankConfig,
    authentication: &Authentication,
    return_url: &str,
    mac_key: &str,
) -> Result<RedirectForm> {
    let mut fields: FieldMap = [
        (A01Y_ACTION_ID, NORDEA_ACTION_ID.to_string()),
        (A01Y_VERS, NORDEA_VERSION.to_string()),
        (A01Y_RCVID, bank.client_id.clone()),
        (A01Y_LANGCODE, NORDEA_LANGUAGE.to_string()),
        (A01Y_STAMP, authentication.nonce()),
        (A01Y_IDTYPE, NORDEA_ID_TYPE.to_string()),
        (A01Y_RETLINK, return_url.to_string()),
        (A01Y_CANLINK, return_url.to_string()),
        (A01Y_REJLINK, return_url.to_string()),
        (A01Y_KEYVERS, NORDEA_KEY_VERSION.to_string()),
        (A01Y_ALG, NORDEA_ALGORITHM.to_string()),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .collect();
    debug!(bank = %bank.name, nonce = authentication.id, "auth request prepared");

    let mac = nordea_mac(&fields, NORDEA_AUTH_REQUEST_ORDER, mac_key)?;
    debug!(bank = %bank.name, nonce = authentication.id, "auth request signed");

    if !verify_nordea_mac(&fields, NORDEA_AUTH_REQUEST_ORDER, mac_key, &mac) {
        return Err(BanklinkError::InvariantViolation(
            "A01Y_MAC does not verify against the MAC key".into(),
        ));
    }
    fields.insert(A01Y_MAC.to_string(), mac);
    require_fields(&fields, NORDEA_AUTH_REQUEST_ORDER)?;
    require_fields(&fields, &[A01Y_MAC])?;

    let order: Vec<&str> = NORDEA_AUTH_REQUEST_ORDER
        .iter()
        .copied()
        .chain(std::iter::once(A01Y_MAC))
        .collect();
    Ok(RedirectForm::new(
        bank.request_url.clone(),
        bank.encoding,
        fields,
        &order,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::verify_base64;
    use crate::record::Status;
    use crate::test_support::{gateway, gateway_with, merchant_private_key, nordea_bank};
    use chrono::TimeZone;

    fn builder(bank: &str) -> AuthRequestBuilder {
        AuthRequestBuilder::new(bank)
            .return_url("http://example.com/banks/auth/")
            .redirect_to("http://example.com/welcome")
            .redirect_on_failure("http://example.com/login")
            .created_at(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap())
    }

    #[test]
    fn test_ipizza_fields_and_signature() {
        let gateway = gateway();
        let request = builder("swedbank").build(&gateway).unwrap();
        let form = &request.form;

        assert_eq!(request.protocol, Protocol::IPizza);
        assert_eq!(form.field(VK_SERVICE), Some("4012"));
        assert_eq!(form.field(VK_REC_ID), Some("HP"));
        assert_eq!(form.field(VK_NONCE), Some("1"));
        assert_eq!(form.field(VK_RID), Some(""));
        assert_eq!(form.field(VK_REPLY), Some("3013"));
        assert_eq!(form.field(VK_DATETIME), Some("2024-03-01T08:00:00+0000"));

        let fields = form.to_field_map();
        let digest = codec::digest(
            &fields,
            MessageType::AuthRequest,
            Default::default(),
            Default::default(),
        )
        .unwrap();
        assert!(verify_base64(
            &digest,
            &fields[VK_MAC],
            &merchant_private_key().to_public_key()
        ));
    }

    #[test]
    fn test_record_is_pending() {
        let gateway = gateway();
        let request = builder("swedbank").build(&gateway).unwrap();
        let stored = gateway
            .authentications()
            .find_by_nonce(request.authentication.id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, Status::Pending);
        assert_eq!(stored.redirect_on_failure, "http://example.com/login");
    }

    #[test]
    fn test_nordea_fields_and_mac() {
        let gateway = gateway();
        let request = builder("nordea").build(&gateway).unwrap();
        let form = &request.form;

        assert_eq!(request.protocol, Protocol::Nordea);
        assert_eq!(form.encoding(), codec::Encoding::Latin1);
        assert_eq!(form.field(A01Y_ACTION_ID), Some("701"));
        assert_eq!(form.field(A01Y_VERS), Some("0002"));
        assert_eq!(form.field(A01Y_RCVID), Some("87654321"));
        assert_eq!(form.field(A01Y_STAMP), Some("1"));
        assert_eq!(form.field(A01Y_REJLINK), Some("http://example.com/banks/auth/"));
        assert_eq!(form.fields().last().map(|(k, _)| k.as_str()), Some(A01Y_MAC));

        let mac = form.field(A01Y_MAC).unwrap();
        assert_eq!(mac.len(), 32);
        assert!(verify_nordea_mac(
            &form.to_field_map(),
            NORDEA_AUTH_REQUEST_ORDER,
            "LEHTI",
            mac
        ));
    }

    #[test]
    fn test_unknown_bank_creates_no_record() {
        let gateway = gateway_with(vec![crate::test_support::swedbank()]);
        assert!(matches!(
            builder("nordea").build(&gateway),
            Err(BanklinkError::Configuration(_))
        ));
        assert!(gateway.authentications().find_by_nonce(1).unwrap().is_none());
    }

    #[test]
    fn test_nordea_rejects_return_url_outside_latin1() {
        let gateway = gateway_with(vec![nordea_bank()]);
        let result = builder("nordea").return_url("http://example.com/\u{2603}").build(&gateway);
        assert!(matches!(result, Err(BanklinkError::Protocol(_))));
        assert!(gateway.authentications().find_by_nonce(1).unwrap().is_none());
    }

    #[test]
    fn test_missing_return_url_is_protocol_error() {
        let gateway = gateway();
        let result = AuthRequestBuilder::new("swedbank")
            .redirect_to("http://example.com/welcome")
            .build(&gateway);
        assert!(matches!(result, Err(BanklinkError::Protocol(_))));
    }
}
