//! Payment transactions.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Lifecycle, Status};
use crate::codec::format_amount;

/// A payment request we sent and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sequence number; sent as `VK_STAMP`.
    pub id: u64,
    pub bank_name: String,
    /// Payment description shown to the shopper (`VK_MSG`).
    pub description: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub currency: String,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub status: Status,
    pub redirect_after_success: String,
    pub redirect_on_failure: String,
}

impl Transaction {
    /// The stamp as it appears on the wire.
    pub fn stamp(&self) -> String {
        self.id.to_string()
    }

    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }

    pub fn is_completed(&self) -> bool {
        self.status == Status::Completed
    }

    /// Where to send the shopper for a given outcome.
    pub fn redirect_for(&self, status: Status) -> &str {
        match status {
            Status::Completed => &self.redirect_after_success,
            _ => &self.redirect_on_failure,
        }
    }
}

impl Lifecycle for Transaction {
    fn id(&self) -> u64 {
        self.id
    }

    fn status(&self) -> Status {
        self.status
    }

    fn set_status(&mut self, status: Status, at: DateTime<Utc>) {
        self.status = status;
        self.last_modified = at;
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transaction {} - {} {} from {} [{}]",
            self.id,
            self.currency,
            format_amount(self.amount),
            self.bank_name,
            self.status
        )
    }
}

/// A transaction before the store has assigned it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub bank_name: String,
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub created: DateTime<Utc>,
    pub redirect_after_success: String,
    pub redirect_on_failure: String,
}

impl NewTransaction {
    /// Every transaction starts `Pending`.
    pub fn into_transaction(self, id: u64) -> Transaction {
        Transaction {
            id,
            bank_name: self.bank_name,
            description: self.description,
            amount: self.amount,
            currency: self.currency,
            created: self.created,
            last_modified: self.created,
            status: Status::Pending,
            redirect_after_success: self.redirect_after_success,
            redirect_on_failure: self.redirect_on_failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> Transaction {
        NewTransaction {
            bank_name: "myBank".into(),
            description: "Order 17".into(),
            amount: dec!(15.67),
            currency: "EUR".into(),
            created: Utc::now(),
            redirect_after_success: "/thanks".into(),
            redirect_on_failure: "/sorry".into(),
        }
        .into_transaction(1)
    }

    #[test]
    fn test_display() {
        assert_eq!(
            sample().to_string(),
            "Transaction 1 - EUR 15.67 from myBank [pending]"
        );
    }

    #[test]
    fn test_new_transaction_is_pending() {
        let tx = sample();
        assert!(tx.is_pending());
        assert_eq!(tx.created, tx.last_modified);
        assert_eq!(tx.stamp(), "1");
    }

    #[test]
    fn test_redirect_for_outcome() {
        let tx = sample();
        assert_eq!(tx.redirect_for(Status::Completed), "/thanks");
        assert_eq!(tx.redirect_for(Status::Failed), "/sorry");
    }

    #[test]
    fn test_bincode_round_trip_keeps_amount() {
        let tx = sample();
        let bytes = bincode::serialize(&tx).unwrap();
        let back: Transaction = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, tx);
    }
}
