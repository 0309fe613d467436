//! # Bank Simulator
//!
//! The bank's half of the protocol: take the fields of a request we built,
//! answer with a response signed the way a real bank would sign it. Used by
//! tests, the demo and local hosts that have no bank test environment.
//!
//! The simulator holds the *bank's* private key. Hosts must never run it
//! with production keys.

use chrono::Utc;
use rsa::RsaPrivateKey;

use crate::codec::fields::*;
use crate::codec::{self, encode_form, Encoding, FieldMap, LengthMode, MessageType};
use crate::config::{
    DATETIME_FORMAT, IPIZZA_VERSION, NORDEA_ALGORITHM, NORDEA_KEY_VERSION, NORDEA_VERSION,
    SERVICE_PAYMENT_FAILURE,
};
use crate::crypto::{nordea_mac, sign_base64};
use crate::error::{BanklinkError, Result};

const SIM_TRANSACTION_NO: &str = "1254";
const SIM_MERCHANT_ACCOUNT: &str = "EE871600161234567892";
const SIM_MERCHANT_NAME: &str = "ALAS POOD OÜ";
const SIM_PAYER_ACCOUNT: &str = "EE382200221020145685";
const SIM_PAYER_NAME: &str = "Tõnu Tester";

/// Signs IPizza responses with a bank key.
#[derive(Debug, Clone)]
pub struct BankSimulator {
    key: RsaPrivateKey,
    bank_id: String,
    client_id: String,
    encoding: Encoding,
    length_mode: LengthMode,
}

impl BankSimulator {
    /// `bank_id` is the bank's own identifier (`VK_SND_ID` in responses),
    /// `client_id` the merchant's.
    pub fn new(key: RsaPrivateKey, bank_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            key,
            bank_id: bank_id.into(),
            client_id: client_id.into(),
            encoding: Encoding::Utf8,
            length_mode: LengthMode::Characters,
        }
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_length_mode(mut self, mode: LengthMode) -> Self {
        self.length_mode = mode;
        self
    }

    /// Answers a 1012 request. `service` is normally 1111 or 1911; any
    /// other code is signed as given. `auto` marks a server pingback.
    pub fn payment_response(&self, request: &FieldMap, service: &str, auto: bool) -> Result<FieldMap> {
        let echo = |name: &str| request.get(name).cloned().unwrap_or_default();

        let mut fields = FieldMap::new();
        let mut put = |name: &str, value: String| {
            fields.insert(name.to_string(), value);
        };
        put(VK_SERVICE, service.to_string());
        put(VK_VERSION, IPIZZA_VERSION.to_string());
        put(VK_SND_ID, self.bank_id.clone());
        put(VK_REC_ID, self.client_id.clone());
        put(VK_STAMP, echo(VK_STAMP));
        put(VK_AMOUNT, echo(VK_AMOUNT));
        put(VK_CURR, echo(VK_CURR));
        put(VK_REF, echo(VK_REF));
        put(VK_MSG, echo(VK_MSG));
        // Failure notices carry no settlement details.
        if service != SERVICE_PAYMENT_FAILURE {
            put(VK_T_NO, SIM_TRANSACTION_NO.to_string());
            put(VK_REC_ACC, SIM_MERCHANT_ACCOUNT.to_string());
            put(VK_REC_NAME, SIM_MERCHANT_NAME.to_string());
            put(VK_SND_ACC, SIM_PAYER_ACCOUNT.to_string());
            put(VK_SND_NAME, SIM_PAYER_NAME.to_string());
            put(VK_T_DATETIME, now());
        }
        put(VK_LANG, echo(VK_LANG));
        put(VK_ENCODING, self.encoding.label().to_string());
        put(VK_AUTO, if auto { "Y" } else { "N" }.to_string());

        self.sign(fields, MessageType::PaymentResponse)
    }

    /// Answers a 4011/4012 request with a 3012 or 3013 layout chosen by
    /// `service`.
    pub fn auth_response(
        &self,
        request: &FieldMap,
        service: &str,
        user_name: &str,
        user_id: &str,
    ) -> Result<FieldMap> {
        let layout = MessageType::for_auth_response(service);
        let mut fields: FieldMap = [
            (VK_SERVICE, service.to_string()),
            (VK_VERSION, IPIZZA_VERSION.to_string()),
            (VK_DATETIME, now()),
            (VK_SND_ID, self.bank_id.clone()),
            (VK_REC_ID, self.client_id.clone()),
            (VK_NONCE, request.get(VK_NONCE).cloned().unwrap_or_default()),
            (VK_USER_NAME, user_name.to_string()),
            (VK_USER_ID, user_id.to_string()),
            (VK_COUNTRY, "EE".to_string()),
            (VK_OTHER, String::new()),
            (VK_TOKEN, "1".to_string()),
            (VK_RID, request.get(VK_RID).cloned().unwrap_or_default()),
            (VK_ENCODING, self.encoding.label().to_string()),
            (VK_LANG, "EST".to_string()),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();
        if layout == MessageType::AuthResponseV1 {
            fields.insert(VK_USER.to_string(), user_id.to_string());
        }

        self.sign(fields, layout)
    }

    /// Form body in the simulator's charset, ready to hand to a callback
    /// handler.
    pub fn encode(&self, fields: &FieldMap) -> Result<Vec<u8>> {
        Ok(encode_form(fields, self.encoding)?.into_bytes())
    }

    fn sign(&self, mut fields: FieldMap, layout: MessageType) -> Result<FieldMap> {
        let digest = codec::digest(&fields, layout, self.length_mode, self.encoding)?;
        let mac = sign_base64(&digest, &self.key)?;
        fields.insert(VK_MAC.to_string(), mac);
        Ok(fields)
    }
}

/// Answers a Nordea `A01Y` request the way the bank's e-identification
/// service does: success only, MAC'd with the shared key.
pub fn nordea_auth_response(
    request: &FieldMap,
    mac_key: &str,
    customer_name: &str,
    customer_id: &str,
) -> Result<FieldMap> {
    let stamp = request
        .get(A01Y_STAMP)
        .cloned()
        .ok_or_else(|| BanklinkError::Protocol("A01Y_STAMP is missing from the request".into()))?;

    let mut fields: FieldMap = [
        (B02K_VERS, NORDEA_VERSION.to_string()),
        (B02K_TIMESTMP, format!("{}{:06}", Utc::now().format("%Y%m%d%H%M%S"), 0)),
        (B02K_IDNBR, "87654321LEHTI".to_string()),
        (B02K_STAMP, stamp),
        (B02K_CUSTNAME, customer_name.to_string()),
        (B02K_KEYVERS, NORDEA_KEY_VERSION.to_string()),
        (B02K_ALG, NORDEA_ALGORITHM.to_string()),
        (B02K_CUSTID, customer_id.to_string()),
        (B02K_CUSTTYPE, "01".to_string()),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .collect();

    let mac = nordea_mac(&fields, NORDEA_AUTH_RESPONSE_ORDER, mac_key)?;
    fields.insert(B02K_MAC.to_string(), mac);
    Ok(fields)
}

fn now() -> String {
    Utc::now().format(DATETIME_FORMAT).to_string()
}
