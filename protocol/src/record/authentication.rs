//! Bank identification attempts.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Lifecycle, Status};
use crate::codec::FieldMap;

/// An identification request and, once answered, the bank's raw reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authentication {
    /// Sequence number; sent as `VK_NONCE` or `A01Y_STAMP`.
    pub id: u64,
    pub bank_name: String,
    pub status: Status,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub redirect_after_success: String,
    pub redirect_on_failure: String,
    /// The verified callback fields, kept verbatim for audit.
    pub raw_response: FieldMap,
}

impl Authentication {
    pub fn nonce(&self) -> String {
        self.id.to_string()
    }

    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }

    pub fn redirect_for(&self, status: Status) -> &str {
        match status {
            Status::Completed => &self.redirect_after_success,
            _ => &self.redirect_on_failure,
        }
    }
}

impl Lifecycle for Authentication {
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

impl fmt::Display for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Authentication {} - {} [{}]",
            self.id, self.bank_name, self.status
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAuthentication {
    pub bank_name: String,
    pub created: DateTime<Utc>,
    pub redirect_after_success: String,
    pub redirect_on_failure: String,
}

impl NewAuthentication {
    pub fn into_authentication(self, id: u64) -> Authentication {
        Authentication {
            id,
            bank_name: self.bank_name,
            status: Status::Pending,
            created: self.created,
            last_modified: self.created,
            redirect_after_success: self.redirect_after_success,
            redirect_on_failure: self.redirect_on_failure,
            raw_response: FieldMap::new(),
        }
    }
}
