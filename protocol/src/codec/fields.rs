//! Field names and canonical orders.
//!
//! The orders below are a wire format. A field that is missing from a
//! message is skipped in the digest; a field that is present but listed in
//! the wrong place produces a signature no bank will accept.

use crate::config;

// ---------------------------------------------------------------------------
// IPizza Fields
// ---------------------------------------------------------------------------

pub const VK_SERVICE: &str = "VK_SERVICE";
pub const VK_VERSION: &str = "VK_VERSION";
pub const VK_SND_ID: &str = "VK_SND_ID";
pub const VK_REC_ID: &str = "VK_REC_ID";
pub const VK_STAMP: &str = "VK_STAMP";
pub const VK_T_NO: &str = "VK_T_NO";
pub const VK_AMOUNT: &str = "VK_AMOUNT";
pub const VK_CURR: &str = "VK_CURR";
pub const VK_REC_ACC: &str = "VK_REC_ACC";
pub const VK_REC_NAME: &str = "VK_REC_NAME";
pub const VK_SND_ACC: &str = "VK_SND_ACC";
pub const VK_SND_NAME: &str = "VK_SND_NAME";
pub const VK_REF: &str = "VK_REF";
pub const VK_MSG: &str = "VK_MSG";
pub const VK_RETURN: &str = "VK_RETURN";
pub const VK_CANCEL: &str = "VK_CANCEL";
pub const VK_DATETIME: &str = "VK_DATETIME";
pub const VK_T_DATETIME: &str = "VK_T_DATETIME";
pub const VK_MAC: &str = "VK_MAC";
pub const VK_LANG: &str = "VK_LANG";
pub const VK_ENCODING: &str = "VK_ENCODING";
pub const VK_AUTO: &str = "VK_AUTO";
pub const VK_REPLY: &str = "VK_REPLY";
pub const VK_NONCE: &str = "VK_NONCE";
pub const VK_RID: &str = "VK_RID";
pub const VK_USER: &str = "VK_USER";
pub const VK_USER_NAME: &str = "VK_USER_NAME";
pub const VK_USER_ID: &str = "VK_USER_ID";
pub const VK_COUNTRY: &str = "VK_COUNTRY";
pub const VK_OTHER: &str = "VK_OTHER";
pub const VK_TOKEN: &str = "VK_TOKEN";

// ---------------------------------------------------------------------------
// Nordea Fields
// ---------------------------------------------------------------------------

pub const A01Y_ACTION_ID: &str = "A01Y_ACTION_ID";
pub const A01Y_VERS: &str = "A01Y_VERS";
pub const A01Y_RCVID: &str = "A01Y_RCVID";
pub const A01Y_LANGCODE: &str = "A01Y_LANGCODE";
pub const A01Y_STAMP: &str = "A01Y_STAMP";
pub const A01Y_IDTYPE: &str = "A01Y_IDTYPE";
pub const A01Y_RETLINK: &str = "A01Y_RETLINK";
pub const A01Y_CANLINK: &str = "A01Y_CANLINK";
pub const A01Y_REJLINK: &str = "A01Y_REJLINK";
pub const A01Y_KEYVERS: &str = "A01Y_KEYVERS";
pub const A01Y_ALG: &str = "A01Y_ALG";
pub const A01Y_MAC: &str = "A01Y_MAC";

pub const B02K_VERS: &str = "B02K_VERS";
pub const B02K_TIMESTMP: &str = "B02K_TIMESTMP";
pub const B02K_IDNBR: &str = "B02K_IDNBR";
pub const B02K_STAMP: &str = "B02K_STAMP";
pub const B02K_CUSTNAME: &str = "B02K_CUSTNAME";
pub const B02K_KEYVERS: &str = "B02K_KEYVERS";
pub const B02K_ALG: &str = "B02K_ALG";
pub const B02K_CUSTID: &str = "B02K_CUSTID";
pub const B02K_CUSTTYPE: &str = "B02K_CUSTTYPE";
pub const B02K_MAC: &str = "B02K_MAC";

// ---------------------------------------------------------------------------
// Canonical Orders
// ---------------------------------------------------------------------------

const PAYMENT_REQUEST_ORDER: &[&str] = &[
    VK_SERVICE,
    VK_VERSION,
    VK_SND_ID,
    VK_STAMP,
    VK_AMOUNT,
    VK_CURR,
    VK_REF,
    VK_MSG,
    VK_RETURN,
    VK_CANCEL,
    VK_DATETIME,
];

const PAYMENT_RESPONSE_ORDER: &[&str] = &[
    VK_SERVICE,
    VK_VERSION,
    VK_SND_ID,
    VK_REC_ID,
    VK_STAMP,
    VK_T_NO,
    VK_AMOUNT,
    VK_CURR,
    VK_REC_ACC,
    VK_REC_NAME,
    VK_SND_ACC,
    VK_SND_NAME,
    VK_REF,
    VK_MSG,
    VK_T_DATETIME,
];

const AUTH_REQUEST_V1_ORDER: &[&str] = &[
    VK_SERVICE,
    VK_VERSION,
    VK_SND_ID,
    VK_REPLY,
    VK_RETURN,
    VK_DATETIME,
    VK_RID,
];

const AUTH_REQUEST_ORDER: &[&str] = &[
    VK_SERVICE,
    VK_VERSION,
    VK_SND_ID,
    VK_REC_ID,
    VK_NONCE,
    VK_RETURN,
    VK_DATETIME,
    VK_RID,
];

const AUTH_RESPONSE_V1_ORDER: &[&str] = &[
    VK_SERVICE,
    VK_VERSION,
    VK_USER,
    VK_DATETIME,
    VK_SND_ID,
    VK_REC_ID,
    VK_USER_NAME,
    VK_USER_ID,
    VK_COUNTRY,
    VK_OTHER,
    VK_TOKEN,
    VK_RID,
];

const AUTH_RESPONSE_ORDER: &[&str] = &[
    VK_SERVICE,
    VK_VERSION,
    VK_DATETIME,
    VK_SND_ID,
    VK_REC_ID,
    VK_NONCE,
    VK_USER_NAME,
    VK_USER_ID,
    VK_COUNTRY,
    VK_OTHER,
    VK_TOKEN,
    VK_RID,
];

/// Fields covered by `A01Y_MAC`, in MAC order.
pub const NORDEA_AUTH_REQUEST_ORDER: &[&str] = &[
    A01Y_ACTION_ID,
    A01Y_VERS,
    A01Y_RCVID,
    A01Y_LANGCODE,
    A01Y_STAMP,
    A01Y_IDTYPE,
    A01Y_RETLINK,
    A01Y_CANLINK,
    A01Y_REJLINK,
    A01Y_KEYVERS,
    A01Y_ALG,
];

/// Fields covered by `B02K_MAC`, in MAC order.
pub const NORDEA_AUTH_RESPONSE_ORDER: &[&str] = &[
    B02K_VERS,
    B02K_TIMESTMP,
    B02K_IDNBR,
    B02K_STAMP,
    B02K_CUSTNAME,
    B02K_KEYVERS,
    B02K_ALG,
    B02K_CUSTID,
    B02K_CUSTTYPE,
];

/// Order in which payment request fields are rendered into the redirect form.
pub const PAYMENT_FORM_ORDER: &[&str] = &[
    VK_SERVICE,
    VK_VERSION,
    VK_SND_ID,
    VK_STAMP,
    VK_AMOUNT,
    VK_CURR,
    VK_REF,
    VK_MSG,
    VK_RETURN,
    VK_CANCEL,
    VK_DATETIME,
    VK_MAC,
    VK_LANG,
    VK_ENCODING,
];

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// IPizza message types with a signed digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// 1012
    PaymentRequest,
    /// 1111 and 1911 share one order.
    PaymentResponse,
    /// 4011
    AuthRequestV1,
    /// 4012
    AuthRequest,
    /// 3012
    AuthResponseV1,
    /// 3013
    AuthResponse,
}

impl MessageType {
    /// Fields covered by the signature, in digest order.
    pub fn canonical_order(&self) -> &'static [&'static str] {
        match self {
            MessageType::PaymentRequest => PAYMENT_REQUEST_ORDER,
            MessageType::PaymentResponse => PAYMENT_RESPONSE_ORDER,
            MessageType::AuthRequestV1 => AUTH_REQUEST_V1_ORDER,
            MessageType::AuthRequest => AUTH_REQUEST_ORDER,
            MessageType::AuthResponseV1 => AUTH_RESPONSE_V1_ORDER,
            MessageType::AuthResponse => AUTH_RESPONSE_ORDER,
        }
    }

    /// Picks the authentication response layout from `VK_SERVICE`.
    ///
    /// Unknown codes get the 3013 order; the handler then classifies the
    /// message as a failure.
    pub fn for_auth_response(service: &str) -> Self {
        if service == config::SERVICE_AUTH_RESPONSE_V1 {
            MessageType::AuthResponseV1
        } else {
            MessageType::AuthResponse
        }
    }

    /// Service code(s) this layout is used for.
    pub fn service_codes(&self) -> &'static [&'static str] {
        match self {
            MessageType::PaymentRequest => &[config::SERVICE_PAYMENT_REQUEST],
            MessageType::PaymentResponse => &[
                config::SERVICE_PAYMENT_SUCCESS,
                config::SERVICE_PAYMENT_FAILURE,
            ],
            MessageType::AuthRequestV1 => &[config::SERVICE_AUTH_REQUEST_V1],
            MessageType::AuthRequest => &[config::SERVICE_AUTH_REQUEST],
            MessageType::AuthResponseV1 => &[config::SERVICE_AUTH_RESPONSE_V1],
            MessageType::AuthResponse => &[config::SERVICE_AUTH_RESPONSE],
        }
    }
}
