//! Payment requests (IPizza service 1012).

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, info};

use super::{check_rsa_mac, require_fields, require_input, Language, RedirectForm};
use crate::checksum;
use crate::codec::fields::*;
use crate::codec::{self, digest::measure_field, format_amount, FieldMap, MessageType};
use crate::config::{DATETIME_FORMAT, IPIZZA_VERSION, SERVICE_PAYMENT_REQUEST};
use crate::crypto::sign_base64;
use crate::error::{BanklinkError, Result};
use crate::gateway::Gateway;
use crate::notify::BanklinkEvent;
use crate::record::{NewTransaction, Transaction};
use crate::registry::{BankConfig, Protocol};

/// Fields that must be non-empty in a finished payment request. `VK_REF`
/// is legitimately empty for banks without reference numbers.
const REQUIRED_FIELDS: &[&str] = &[
    VK_SERVICE,
    VK_VERSION,
    VK_SND_ID,
    VK_STAMP,
    VK_AMOUNT,
    VK_CURR,
    VK_MSG,
    VK_RETURN,
    VK_CANCEL,
    VK_DATETIME,
    VK_MAC,
    VK_LANG,
    VK_ENCODING,
];

/// A signed payment redirect and the transaction it created.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub transaction: Transaction,
    pub form: RedirectForm,
}

/// Fluent builder for payment requests.
///
/// ```rust,no_run
/// use banklink::{Gateway, PaymentRequestBuilder};
/// use rust_decimal::Decimal;
///
/// # fn demo(gateway: &Gateway) -> banklink::Result<()> {
/// let request = PaymentRequestBuilder::new("swedbank")
///     .amount(Decimal::new(1399, 2))
///     .message("Order 1042")
///     .return_url("https://shop.example/banks/response/")
///     .redirect_to("https://shop.example/thanks")
///     .redirect_on_failure("https://shop.example/cart")
///     .build(gateway)?;
/// let html = request.form.to_html();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PaymentRequestBuilder {
    bank: String,
    amount: Option<Decimal>,
    currency: String,
    message: Option<String>,
    return_url: Option<String>,
    cancel_url: Option<String>,
    redirect_after_success: Option<String>,
    redirect_on_failure: Option<String>,
    language: Language,
    created_at: Option<DateTime<Utc>>,
}

impl PaymentRequestBuilder {
    /// Starts a request for `bank`. Currency defaults to EUR, language to
    /// Estonian.
    pub fn new(bank: impl Into<String>) -> Self {
        Self {
            bank: bank.into(),
            amount: None,
            currency: "EUR".to_string(),
            message: None,
            return_url: None,
            cancel_url: None,
            redirect_after_success: None,
            redirect_on_failure: None,
            language: Language::default(),
            created_at: None,
        }
    }

    /// Amount to charge. Rounded to cents, half away from zero.
    pub fn amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Description shown by the bank (`VK_MSG`).
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Callback URL the bank answers on (`VK_RETURN`). Usually
    /// [`callback_url`](crate::config::callback_url).
    pub fn return_url(mut self, url: impl Into<String>) -> Self {
        self.return_url = Some(url.into());
        self
    }

    /// `VK_CANCEL`. Defaults to the return URL.
    pub fn cancel_url(mut self, url: impl Into<String>) -> Self {
        self.cancel_url = Some(url.into());
        self
    }

    /// Where to send the shopper after a successful payment.
    pub fn redirect_to(mut self, url: impl Into<String>) -> Self {
        self.redirect_after_success = Some(url.into());
        self
    }

    /// Where to send the shopper after a failed or cancelled payment.
    /// Defaults to the success redirect.
    pub fn redirect_on_failure(mut self, url: impl Into<String>) -> Self {
        self.redirect_on_failure = Some(url.into());
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Fixes `VK_DATETIME` instead of using the current time.
    pub fn created_at(mut self, created: DateTime<Utc>) -> Self {
        self.created_at = Some(created);
        self
    }

    /// Persists a `Pending` transaction and returns its signed redirect.
    pub fn build(self, gateway: &Gateway) -> Result<PaymentRequest> {
        let bank = gateway.bank(&self.bank)?;
        if bank.protocol != Protocol::IPizza {
            return Err(BanklinkError::Configuration(format!(
                "bank {} speaks {} and does not accept payments",
                bank.name, bank.protocol
            )));
        }

        let amount = require_input(self.amount, "amount")?
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        if amount <= Decimal::ZERO {
            return Err(BanklinkError::Protocol(format!(
                "amount must be positive, got {amount}"
            )));
        }
        check_currency(&self.currency)?;
        let message = require_input(self.message, "message")?;
        let return_url = require_input(self.return_url, "return URL")?;
        let cancel_url = self.cancel_url.unwrap_or_else(|| return_url.clone());
        let redirect_after_success = require_input(self.redirect_after_success, "success redirect")?;
        let redirect_on_failure = self
            .redirect_on_failure
            .unwrap_or_else(|| redirect_after_success.clone());

        let (mode, encoding) = (bank.length_mode(), bank.encoding);
        for (name, value) in [(VK_MSG, &message), (VK_RETURN, &return_url), (VK_CANCEL, &cancel_url)] {
            measure_field(name, value, mode, encoding)?;
        }
        let signing_key = gateway.keys().signing_key(bank)?;

        // Created
        let transaction = gateway.transactions().save(NewTransaction {
            bank_name: bank.name.clone(),
            description: message,
            amount,
            currency: self.currency,
            created: self.created_at.unwrap_or_else(Utc::now),
            redirect_after_success,
            redirect_on_failure,
        })?;
        debug!(bank = %bank.name, stamp = transaction.id, "payment request created");
        gateway
            .notifications()
            .publish(&BanklinkEvent::TransactionStarted(transaction.clone()));

        // Prepared
        let mut fields = prepare(bank, &transaction, &return_url, &cancel_url, self.language)?;
        debug!(bank = %bank.name, stamp = transaction.id, "payment request prepared");

        // Signed
        let digest = codec::digest(&fields, MessageType::PaymentRequest, mode, encoding)?;
        let mac = sign_base64(&digest, &signing_key)?;
        debug!(bank = %bank.name, stamp = transaction.id, "payment request signed");

        // Ready
        check_rsa_mac(&digest, &mac, &signing_key.to_public_key())?;
        fields.insert(VK_MAC.to_string(), mac);
        require_fields(&fields, REQUIRED_FIELDS)?;

        info!(
            bank = %bank.name,
            stamp = transaction.id,
            amount = %transaction.amount,
            currency = %transaction.currency,
            "payment request ready"
        );
        let form = RedirectForm::new(bank.request_url.clone(), encoding, fields, PAYMENT_FORM_ORDER);
        Ok(PaymentRequest { transaction, form })
    }
}

fn check_currency(currency: &str) -> Result<()> {
    if currency.len() == 3 && currency.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(BanklinkError::Protocol(format!(
            "currency must be a 3-letter ISO code, got {currency:?}"
        )))
    }
}

fn prepare(
    bank: &BankConfig,
    transaction: &Transaction,
    return_url: &str,
    cancel_url: &str,
    language: Language,
) -> Result<FieldMap> {
    let reference = if bank.send_ref {
        checksum::reference_number(transaction.id)
            .ok_or_else(|| {
                BanklinkError::InvariantViolation(format!(
                    "stamp {} is too large for a reference number",
                    transaction.id
                ))
            })?
            .to_string()
    } else {
        String::new()
    };

    let fields = [
        (VK_SERVICE, SERVICE_PAYMENT_REQUEST.to_string()),
        (VK_VERSION, IPIZZA_VERSION.to_string()),
        (VK_SND_ID, bank.client_id.clone()),
        (VK_STAMP, transaction.stamp()),
        (VK_AMOUNT, format_amount(transaction.amount)),
        (VK_CURR, transaction.currency.clone()),
        (VK_REF, reference),
        (VK_MSG, transaction.description.clone()),
        (VK_RETURN, return_url.to_string()),
        (VK_CANCEL, cancel_url.to_string()),
        (VK_DATETIME, transaction.created.format(DATETIME_FORMAT).to_string()),
        (VK_LANG, language.code().to_string()),
        (VK_ENCODING, bank.encoding.label().to_string()),
    ];
    Ok(fields
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::verify_base64;
    use crate::record::Status;
    use crate::test_support::{gateway, merchant_private_key};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn builder() -> PaymentRequestBuilder {
        PaymentRequestBuilder::new("swedbank")
            .amount(dec!(13.99))
            .message("My cool payment")
            .return_url("http://example.com/banks/response/")
            .redirect_to("http://example.com/thanks")
            .redirect_on_failure("http://example.com/cart")
            .created_at(Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap())
    }

    #[test]
    fn test_build_fills_every_field() {
        let gateway = gateway();
        let request = builder().build(&gateway).unwrap();
        let form = &request.form;

        assert_eq!(form.action(), "https://banklink.example/swedbank");
        assert_eq!(form.field(VK_SERVICE), Some("1012"));
        assert_eq!(form.field(VK_VERSION), Some("008"));
        assert_eq!(form.field(VK_SND_ID), Some("uid100052"));
        assert_eq!(form.field(VK_STAMP), Some("1"));
        assert_eq!(form.field(VK_AMOUNT), Some("13.99"));
        assert_eq!(form.field(VK_CURR), Some("EUR"));
        assert_eq!(form.field(VK_REF), Some("13"));
        assert_eq!(form.field(VK_CANCEL), Some("http://example.com/banks/response/"));
        assert_eq!(form.field(VK_DATETIME), Some("2024-01-15T10:30:00+0000"));
        assert_eq!(form.field(VK_LANG), Some("EST"));
        assert_eq!(form.field(VK_ENCODING), Some("UTF-8"));
        assert_eq!(form.fields().len(), 14);
        assert_eq!(form.fields()[0].0, VK_SERVICE);
    }

    #[test]
    fn test_mac_verifies_over_request_digest() {
        let gateway = gateway();
        let request = builder().build(&gateway).unwrap();
        let fields = request.form.to_field_map();
        let digest = codec::digest(
            &fields,
            MessageType::PaymentRequest,
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
    fn test_transaction_persisted_pending_and_announced() {
        let gateway = gateway();
        let started = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&started);
        gateway.notifications().subscribe(Arc::new(move |event: &BanklinkEvent| {
            if matches!(event, BanklinkEvent::TransactionStarted(_)) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        let request = builder().build(&gateway).unwrap();
        let stored = gateway.transactions().find_by_stamp(request.transaction.id).unwrap().unwrap();
        assert_eq!(stored.status, Status::Pending);
        assert_eq!(stored.amount, dec!(13.99));
        assert_eq!(stored.redirect_on_failure, "http://example.com/cart");
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_send_ref_disabled_leaves_reference_empty() {
        let mut bank = crate::test_support::swedbank();
        bank.send_ref = false;
        let gateway = crate::test_support::gateway_with(vec![bank]);
        let request = builder().build(&gateway).unwrap();
        assert_eq!(request.form.field(VK_REF), Some(""));
    }

    #[test]
    fn test_amount_is_rounded_to_cents() {
        let gateway = gateway();
        let request = builder().amount(dec!(10.005)).build(&gateway).unwrap();
        assert_eq!(request.form.field(VK_AMOUNT), Some("10.01"));
    }

    #[test]
    fn test_invalid_input_creates_no_record() {
        let gateway = gateway();
        for bad in [
            builder().amount(dec!(0)),
            builder().currency("eur"),
            builder().message("x".repeat(1000)),
            PaymentRequestBuilder::new("swedbank").amount(dec!(1)),
        ] {
            assert!(matches!(bad.build(&gateway), Err(BanklinkError::Protocol(_))));
        }
        assert!(gateway.transactions().find_by_stamp(1).unwrap().is_none());
    }

    #[test]
    fn test_unknown_or_nordea_bank_is_configuration_error() {
        let gateway = gateway();
        let unknown = PaymentRequestBuilder::new("lhv")
            .amount(dec!(1))
            .message("m")
            .return_url("r")
            .redirect_to("s")
            .build(&gateway);
        assert!(matches!(unknown, Err(BanklinkError::Configuration(_))));

        let nordea = PaymentRequestBuilder::new("nordea")
            .amount(dec!(1))
            .message("m")
            .return_url("r")
            .redirect_to("s")
            .build(&gateway);
        assert!(matches!(nordea, Err(BanklinkError::Configuration(_))));
    }

    #[test]
    fn test_unreadable_key_creates_no_record() {
        let mut bank = crate::test_support::swedbank();
        bank.private_key = Some(crate::test_support::fixture("bank_pub.pem"));
        let gateway = crate::test_support::gateway_with(vec![bank]);
        assert!(matches!(
            builder().build(&gateway),
            Err(BanklinkError::Configuration(_))
        ));
        assert!(gateway.transactions().find_by_stamp(1).unwrap().is_none());
    }
}
