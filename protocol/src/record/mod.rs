//! # Records & Lifecycle
//!
//! Every redirect we send leaves a record behind: a [`Transaction`] for a
//! payment, an [`Authentication`] for an identification request. Its id is
//! what travels to the bank (`VK_STAMP`, `VK_NONCE`, `A01Y_STAMP`) and what
//! comes back, so the callback can find it again.
//!
//! ```text
//!              ┌──────────► Completed
//!   Pending ───┤
//!              └──────────► Failed
//! ```
//!
//! Both terminal states are final. The transition itself is performed by
//! the store's compare-and-set, so two deliveries of the same callback
//! (browser redirect plus server pingback, or a bank retry) cannot both win.

pub mod authentication;
pub mod transaction;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use authentication::{Authentication, NewAuthentication};
pub use transaction::{NewTransaction, Transaction};

/// Lifecycle state shared by both record families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Pending,
    Completed,
    Failed,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::Pending)
    }

    /// Only `Pending → Completed` and `Pending → Failed` exist.
    pub fn can_transition_to(&self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Pending, Status::Completed) | (Status::Pending, Status::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Completed => "completed",
            Status::Failed => "failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which record family an id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Transaction,
    Authentication,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordKind::Transaction => "transaction",
            RecordKind::Authentication => "authentication",
        })
    }
}

/// What a store needs to know about a record to run the state machine.
pub trait Lifecycle {
    fn id(&self) -> u64;
    fn status(&self) -> Status;
    /// Applies an already-checked transition.
    fn set_status(&mut self, status: Status, at: DateTime<Utc>);
}
