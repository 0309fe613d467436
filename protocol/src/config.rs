//! # Protocol Configuration & Constants
//!
//! Every magic string the banks agreed on lives here. Service codes,
//! versions and fixed Nordea parameters are part of the published bank
//! specifications; changing one of them breaks signatures on the other side
//! of the redirect, usually without a useful error message.

// ---------------------------------------------------------------------------
// IPizza Service Codes
// ---------------------------------------------------------------------------

/// Payment request (merchant → bank), signed with the merchant key.
pub const SERVICE_PAYMENT_REQUEST: &str = "1012";

/// Payment response: the payment went through.
pub const SERVICE_PAYMENT_SUCCESS: &str = "1111";

/// Payment response: the payment was cancelled or rejected.
pub const SERVICE_PAYMENT_FAILURE: &str = "1911";

/// Legacy authentication request (no nonce, bank replies with 3012).
pub const SERVICE_AUTH_REQUEST_V1: &str = "4011";

/// Authentication request with a nonce. This is what we send.
pub const SERVICE_AUTH_REQUEST: &str = "4012";

/// Legacy authentication response to a 4011 request.
pub const SERVICE_AUTH_RESPONSE_V1: &str = "3012";

/// Authentication response to a 4012 request. The only success code.
pub const SERVICE_AUTH_RESPONSE: &str = "3013";

/// Message format version. Every current IPizza bank speaks 008.
pub const IPIZZA_VERSION: &str = "008";

/// `VK_AUTO` value marking a machine-to-machine pingback.
pub const AUTO_PINGBACK: &str = "Y";

/// Body returned to the bank for an automatic pingback.
pub const PINGBACK_ACKNOWLEDGEMENT: &str = "request handled";

/// strftime pattern for `VK_DATETIME`.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

// ---------------------------------------------------------------------------
// Digest & Signature Parameters
// ---------------------------------------------------------------------------

/// Width of the zero-padded length prefix in front of every digest field.
pub const LENGTH_PREFIX_WIDTH: usize = 3;

/// Longest value a 3-digit prefix can describe.
pub const MAX_FIELD_LENGTH: usize = 999;

/// RSA modulus size the banks issue. Anything else is a misconfiguration.
pub const RSA_KEY_BITS: usize = 2048;

/// PKCS#1 v1.5 signature length for a 2048-bit key.
pub const EXPECTED_SIGNATURE_LENGTH: usize = RSA_KEY_BITS / 8;

// ---------------------------------------------------------------------------
// Nordea (Solo/TUPAS) Authentication
// ---------------------------------------------------------------------------

/// `A01Y_ACTION_ID` for an identification request.
pub const NORDEA_ACTION_ID: &str = "701";

/// Message version, sent in `A01Y_VERS` and expected back in `B02K_VERS`.
pub const NORDEA_VERSION: &str = "0002";

/// `A01Y_LANGCODE`. Nordea's Estonian service only answers in ET.
pub const NORDEA_LANGUAGE: &str = "ET";

/// `A01Y_IDTYPE`: personal identification code requested.
pub const NORDEA_ID_TYPE: &str = "02";

/// `A01Y_KEYVERS`: which shared MAC key generation is in use.
pub const NORDEA_KEY_VERSION: &str = "0001";

/// `A01Y_ALG`: 01 is MD5. Nordea LIVE rejects the SHA-1 variant.
pub const NORDEA_ALGORITHM: &str = "01";

// ---------------------------------------------------------------------------
// Records & Registry
// ---------------------------------------------------------------------------

/// Bank keys double as record column values, hence the limit.
pub const MAX_BANK_NAME_LENGTH: usize = 16;

/// Upper bound the banks accept for `VK_NONCE`.
pub const MAX_NONCE_LENGTH: usize = 50;

/// Display order for banks that do not specify one.
pub const DEFAULT_BANK_ORDER: i64 = 99;

/// Link type reported for banks that do not specify one.
pub const DEFAULT_LINK_TYPE: &str = "banklink";

// ---------------------------------------------------------------------------
// Callback Paths
// ---------------------------------------------------------------------------

/// Path the host serves payment callbacks on.
pub const PAYMENT_CALLBACK_PATH: &str = "/banks/response/";

/// Path the host serves authentication callbacks on.
pub const AUTH_CALLBACK_PATH: &str = "/banks/auth/";

/// Builds the absolute payment callback URL (`VK_RETURN`/`VK_CANCEL`) for a
/// site base URL such as `https://shop.example`.
pub fn callback_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), PAYMENT_CALLBACK_PATH)
}

/// Builds the absolute authentication callback URL for a site base URL.
pub fn auth_callback_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), AUTH_CALLBACK_PATH)
}
