//! # Sled Store
//!
//! Durable record storage on sled's embedded key-value engine.
//!
//! | Tree              | Key              | Value                     |
//! |-------------------|------------------|---------------------------|
//! | `transactions`    | `id` (8B BE)     | `bincode(Transaction)`    |
//! | `authentications` | `id` (8B BE)     | `bincode(Authentication)` |
//!
//! Ids come from sled's monotonic `generate_id`, shifted by one so the
//! first stamp is 1 like everywhere else. Big-endian keys keep sled's
//! lexicographic order equal to id order.
//!
//! Status transitions use `compare_and_swap` on the serialized record: read,
//! check the status, write back only if the bytes are still the ones we
//! read. If another writer changed the record in between, we re-read and
//! decide again, which usually means returning `false` because the status
//! is no longer `Pending`.

use std::path::Path;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Db, Tree};
use tracing::debug;

use super::{check_transition, AuthStore, StoreError, StoreResult, TransactionStore};
use crate::codec::FieldMap;
use crate::record::{
    Authentication, Lifecycle, NewAuthentication, NewTransaction, Status, Transaction,
};

/// Record store backed by sled. Cheap to clone; clones share the database.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    transactions: Tree,
    authentications: Tree,
}

impl SledStore {
    /// Opens or creates a database directory.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A database that is deleted when the store is dropped.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let transactions = db.open_tree("transactions")?;
        let authentications = db.open_tree("authentications")?;
        Ok(Self {
            db,
            transactions,
            authentications,
        })
    }

    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn next_id(&self) -> StoreResult<u64> {
        Ok(self.db.generate_id()? + 1)
    }
}

fn encode<T: Serialize>(record: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(record).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn insert<T: Serialize + Lifecycle>(db: &Db, tree: &Tree, record: &T) -> StoreResult<()> {
    tree.insert(record.id().to_be_bytes(), encode(record)?)?;
    // A redirect form must never reference a record that is not on disk.
    db.flush()?;
    Ok(())
}

fn find<T: DeserializeOwned>(tree: &Tree, id: u64) -> StoreResult<Option<T>> {
    tree.get(id.to_be_bytes())?
        .map(|bytes| decode(&bytes))
        .transpose()
}

fn transition<T>(
    db: &Db,
    tree: &Tree,
    id: u64,
    expected: Status,
    new: Status,
    apply: impl Fn(&mut T),
) -> StoreResult<bool>
where
    T: Serialize + DeserializeOwned + Lifecycle,
{
    let key = id.to_be_bytes();
    loop {
        let current = tree.get(key)?.ok_or(StoreError::Missing(id))?;
        let mut record: T = decode(&current)?;
        if record.status() != expected {
            return Ok(false);
        }
        check_transition(expected, new)?;

        apply(&mut record);
        record.set_status(new, Utc::now());
        let updated = encode(&record)?;

        match tree.compare_and_swap(key, Some(&current), Some(updated))? {
            Ok(()) => {
                db.flush()?;
                return Ok(true);
            }
            Err(_) => {
                debug!(id, "record changed during transition, retrying");
            }
        }
    }
}

impl TransactionStore for SledStore {
    fn save(&self, new: NewTransaction) -> StoreResult<Transaction> {
        let transaction = new.into_transaction(self.next_id()?);
        insert(&self.db, &self.transactions, &transaction)?;
        Ok(transaction)
    }

    fn find_by_stamp(&self, id: u64) -> StoreResult<Option<Transaction>> {
        find(&self.transactions, id)
    }

    fn compare_and_set_status(&self, id: u64, expected: Status, new: Status) -> StoreResult<bool> {
        transition::<Transaction>(&self.db, &self.transactions, id, expected, new, |_| {})
    }
}

impl AuthStore for SledStore {
    fn save(&self, new: NewAuthentication) -> StoreResult<Authentication> {
        let authentication = new.into_authentication(self.next_id()?);
        insert(&self.db, &self.authentications, &authentication)?;
        Ok(authentication)
    }

    fn find_by_nonce(&self, id: u64) -> StoreResult<Option<Authentication>> {
        find(&self.authentications, id)
    }

    fn compare_and_set_status(
        &self,
        id: u64,
        expected: Status,
        new: Status,
        raw_response: &FieldMap,
    ) -> StoreResult<bool> {
        transition::<Authentication>(
            &self.db,
            &self.authentications,
            id,
            expected,
            new,
            |auth| auth.raw_response = raw_response.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::thread;

    fn new_transaction() -> NewTransaction {
        NewTransaction {
            bank_name: "seb".into(),
            description: "Invoice 2024-17".into(),
            amount: dec!(120.50),
            currency: "EUR".into(),
            created: Utc::now(),
            redirect_after_success: "/paid".into(),
            redirect_on_failure: "/unpaid".into(),
        }
    }

    fn new_authentication() -> NewAuthentication {
        NewAuthentication {
            bank_name: "seb".into(),
            created: Utc::now(),
            redirect_after_success: "/in".into(),
            redirect_on_failure: "/out".into(),
        }
    }

    #[test]
    fn test_save_and_find() {
        let store = SledStore::open_temporary().unwrap();
        let saved = TransactionStore::save(&store, new_transaction()).unwrap();
        assert!(saved.id >= 1);

        let found = store.find_by_stamp(saved.id).unwrap().unwrap();
        assert_eq!(found, saved);
        assert_eq!(found.amount, dec!(120.50));
        assert!(store.find_by_stamp(saved.id + 100).unwrap().is_none());
    }

    #[test]
    fn test_first_id_is_one() {
        let store = SledStore::open_temporary().unwrap();
        assert_eq!(TransactionStore::save(&store, new_transaction()).unwrap().id, 1);
    }

    #[test]
    fn test_ids_are_unique_across_record_kinds() {
        let store = SledStore::open_temporary().unwrap();
        let tx = TransactionStore::save(&store, new_transaction()).unwrap();
        let auth = AuthStore::save(&store, new_authentication()).unwrap();
        assert_ne!(tx.id, auth.id);
    }

    #[test]
    fn test_compare_and_set_semantics() {
        let store = SledStore::open_temporary().unwrap();
        let tx = TransactionStore::save(&store, new_transaction()).unwrap();

        assert!(TransactionStore::compare_and_set_status(&store, tx.id, Status::Pending, Status::Failed).unwrap());
        assert!(!TransactionStore::compare_and_set_status(&store, tx.id, Status::Pending, Status::Completed).unwrap());
        assert_eq!(
            store.find_by_stamp(tx.id).unwrap().unwrap().status,
            Status::Failed
        );

        let err = TransactionStore::compare_and_set_status(&store, tx.id, Status::Failed, Status::Completed).unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
    }

    #[test]
    fn test_missing_record() {
        let store = SledStore::open_temporary().unwrap();
        assert!(matches!(
            TransactionStore::compare_and_set_status(&store, 77, Status::Pending, Status::Completed),
            Err(StoreError::Missing(77))
        ));
    }

    #[test]
    fn test_auth_raw_response_persisted() {
        let store = SledStore::open_temporary().unwrap();
        let auth = AuthStore::save(&store, new_authentication()).unwrap();
        let raw = FieldMap::from([
            ("VK_USER_ID".to_string(), "37602294565".to_string()),
            ("VK_USER_NAME".to_string(), "TÕNISSON,TÕNU".to_string()),
        ]);

        assert!(AuthStore::compare_and_set_status(&store, auth.id, Status::Pending, Status::Completed, &raw).unwrap());
        let stored = store.find_by_nonce(auth.id).unwrap().unwrap();
        assert_eq!(stored.raw_response, raw);
    }

    #[test]
    fn test_reopen_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = SledStore::open(dir.path()).unwrap();
            let tx = TransactionStore::save(&store, new_transaction()).unwrap();
            TransactionStore::compare_and_set_status(&store, tx.id, Status::Pending, Status::Completed).unwrap();
            tx.id
        };

        let store = SledStore::open(dir.path()).unwrap();
        let tx = store.find_by_stamp(id).unwrap().unwrap();
        assert_eq!(tx.status, Status::Completed);
    }

    #[test]
    fn test_concurrent_transitions_have_one_winner() {
        let store = Arc::new(SledStore::open_temporary().unwrap());
        let id = TransactionStore::save(store.as_ref(), new_transaction()).unwrap().id;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                let target = if i % 2 == 0 { Status::Completed } else { Status::Failed };
                thread::spawn(move || {
                    TransactionStore::compare_and_set_status(store.as_ref(), id, Status::Pending, target).unwrap()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
