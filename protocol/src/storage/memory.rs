//! In-process store. Transitions happen under one write guard, which is
//! all the atomicity compare-and-set needs here.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::RwLock;

use super::{check_transition, AuthStore, StoreError, StoreResult, TransactionStore};
use crate::codec::FieldMap;
use crate::record::{
    Authentication, Lifecycle, NewAuthentication, NewTransaction, Status, Transaction,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    transactions: RwLock<BTreeMap<u64, Transaction>>,
    authentications: RwLock<BTreeMap<u64, Authentication>>,
    last_transaction_id: AtomicU64,
    last_authentication_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.read().len()
    }

    pub fn authentication_count(&self) -> usize {
        self.authentications.read().len()
    }
}

fn transition<T: Lifecycle>(
    records: &RwLock<BTreeMap<u64, T>>,
    id: u64,
    expected: Status,
    new: Status,
    apply: impl FnOnce(&mut T),
) -> StoreResult<bool> {
    let mut records = records.write();
    let record = records.get_mut(&id).ok_or(StoreError::Missing(id))?;
    if record.status() != expected {
        return Ok(false);
    }
    check_transition(expected, new)?;
    apply(&mut *record);
    record.set_status(new, Utc::now());
    Ok(true)
}

impl TransactionStore for MemoryStore {
    fn save(&self, new: NewTransaction) -> StoreResult<Transaction> {
        let id = self.last_transaction_id.fetch_add(1, Ordering::SeqCst) + 1;
        let transaction = new.into_transaction(id);
        self.transactions.write().insert(id, transaction.clone());
        Ok(transaction)
    }

    fn find_by_stamp(&self, id: u64) -> StoreResult<Option<Transaction>> {
        Ok(self.transactions.read().get(&id).cloned())
    }

    fn compare_and_set_status(&self, id: u64, expected: Status, new: Status) -> StoreResult<bool> {
        transition(&self.transactions, id, expected, new, |_| {})
    }
}

impl AuthStore for MemoryStore {
    fn save(&self, new: NewAuthentication) -> StoreResult<Authentication> {
        let id = self.last_authentication_id.fetch_add(1, Ordering::SeqCst) + 1;
        let authentication = new.into_authentication(id);
        self.authentications
            .write()
            .insert(id, authentication.clone());
        Ok(authentication)
    }

    fn find_by_nonce(&self, id: u64) -> StoreResult<Option<Authentication>> {
        Ok(self.authentications.read().get(&id).cloned())
    }

    fn compare_and_set_status(
        &self,
        id: u64,
        expected: Status,
        new: Status,
        raw_response: &FieldMap,
    ) -> StoreResult<bool> {
        transition(&self.authentications, id, expected, new, |auth| {
            auth.raw_response = raw_response.clone();
        })
    }
}
