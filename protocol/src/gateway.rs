//! # Gateway
//!
//! The context object every builder and handler runs against. It owns the
//! bank registry, the key cache, both record stores and the notification
//! hub, all behind `Arc` so a host can share one gateway across request
//! handlers.
//!
//! ```text
//!   Gateway
//!   ├── registry       Arc<BankConfigRegistry>   immutable after load
//!   ├── keys           Arc<KeyStore>              filled lazily or by preload
//!   ├── transactions   Arc<dyn TransactionStore>
//!   ├── authentications Arc<dyn AuthStore>
//!   └── notifications  Arc<NotificationHub>
//! ```

use std::sync::Arc;

use tracing::info;

use crate::callback::{AuthOutcome, AuthResponseHandler, PaymentCallback, PaymentResponseHandler};
use crate::crypto::KeyStore;
use crate::error::Result;
use crate::notify::NotificationHub;
use crate::registry::{BankConfig, BankConfigRegistry};
use crate::storage::{AuthStore, MemoryStore, SledStore, TransactionStore};

/// Shared state for building requests and handling callbacks.
#[derive(Clone)]
pub struct Gateway {
    registry: Arc<BankConfigRegistry>,
    keys: Arc<KeyStore>,
    transactions: Arc<dyn TransactionStore>,
    authentications: Arc<dyn AuthStore>,
    notifications: Arc<NotificationHub>,
}

impl Gateway {
    pub fn new(
        registry: Arc<BankConfigRegistry>,
        transactions: Arc<dyn TransactionStore>,
        authentications: Arc<dyn AuthStore>,
    ) -> Self {
        Self {
            registry,
            keys: Arc::new(KeyStore::new()),
            transactions,
            authentications,
            notifications: Arc::new(NotificationHub::new()),
        }
    }

    /// Both record families in one [`MemoryStore`].
    pub fn in_memory(registry: Arc<BankConfigRegistry>) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(registry, store.clone(), store)
    }

    /// Both record families in one [`SledStore`].
    pub fn with_sled(registry: Arc<BankConfigRegistry>, store: SledStore) -> Self {
        let store = Arc::new(store);
        Self::new(registry, store.clone(), store)
    }

    pub fn with_key_store(mut self, keys: Arc<KeyStore>) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_notifications(mut self, hub: Arc<NotificationHub>) -> Self {
        self.notifications = hub;
        self
    }

    pub fn registry(&self) -> &BankConfigRegistry {
        &self.registry
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    pub fn transactions(&self) -> &dyn TransactionStore {
        self.transactions.as_ref()
    }

    pub fn authentications(&self) -> &dyn AuthStore {
        self.authentications.as_ref()
    }

    pub fn notifications(&self) -> &NotificationHub {
        &self.notifications
    }

    /// Looks up a bank, as a configuration error when it is unknown.
    pub fn bank(&self, name: &str) -> Result<&BankConfig> {
        Ok(self.registry.require(name)?)
    }

    /// Parses every configured RSA key now instead of on first use.
    pub fn preload_keys(&self) -> Result<usize> {
        let loaded = self.keys.preload(&self.registry)?;
        info!(keys = loaded, banks = self.registry.len(), "bank keys loaded");
        Ok(loaded)
    }

    /// Shorthand for [`PaymentResponseHandler::handle`].
    pub fn payment_callback(&self, raw: &[u8]) -> Result<PaymentCallback> {
        PaymentResponseHandler::new(self).handle(raw)
    }

    /// Shorthand for [`AuthResponseHandler::handle`].
    pub fn auth_callback(&self, raw: &[u8]) -> Result<AuthOutcome> {
        AuthResponseHandler::new(self).handle(raw)
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("banks", &self.registry.len())
            .field("keys", &self.keys.len())
            .field("notifications", &self.notifications)
            .finish_non_exhaustive()
    }
}
