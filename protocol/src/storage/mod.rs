//! # Record Storage
//!
//! The engine does not care where records live, only that the store can do
//! three things: save a new record and hand back its id, find a record by
//! id, and move a record from one status to another *atomically*.
//!
//! | Store          | Backing                 | Use                        |
//! |----------------|-------------------------|----------------------------|
//! | [`MemoryStore`]| `BTreeMap` + `RwLock`   | tests, demos, `--in-memory`|
//! | [`SledStore`]  | sled trees, bincode     | the node's default         |
//!
//! `compare_and_set_status` is the at-most-once guarantee for callbacks. It
//! returns `Ok(false)` when the record is no longer in the expected state
//! (someone else got there first) and only errors for illegal transitions
//! or backend failures.

pub mod db;
pub mod memory;

use thiserror::Error;

pub use db::SledStore;
pub use memory::MemoryStore;

use crate::codec::FieldMap;
use crate::record::{Authentication, NewAuthentication, NewTransaction, Status, Transaction};

/// Errors from a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("illegal status transition {from} -> {to}")]
    IllegalTransition { from: Status, to: Status },

    #[error("record {0} does not exist")]
    Missing(u64),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for payment transactions.
pub trait TransactionStore: Send + Sync {
    /// Persists a new `Pending` transaction under a fresh id.
    fn save(&self, new: NewTransaction) -> StoreResult<Transaction>;

    fn find_by_stamp(&self, id: u64) -> StoreResult<Option<Transaction>>;

    /// Sets `new` if the current status is `expected`. `Ok(false)` when it
    /// is not.
    fn compare_and_set_status(&self, id: u64, expected: Status, new: Status) -> StoreResult<bool>;
}

/// Persistence for identification attempts.
pub trait AuthStore: Send + Sync {
    fn save(&self, new: NewAuthentication) -> StoreResult<Authentication>;

    fn find_by_nonce(&self, id: u64) -> StoreResult<Option<Authentication>>;

    /// Like [`TransactionStore::compare_and_set_status`], also recording the
    /// bank's verified reply in the same atomic step.
    fn compare_and_set_status(
        &self,
        id: u64,
        expected: Status,
        new: Status,
        raw_response: &FieldMap,
    ) -> StoreResult<bool>;
}

pub(crate) fn check_transition(current: Status, new: Status) -> StoreResult<()> {
    if current.can_transition_to(new) {
        Ok(())
    } else {
        Err(StoreError::IllegalTransition {
            from: current,
            to: new,
        })
    }
}
