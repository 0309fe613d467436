//! # Notifications
//!
//! Application code wants to know when a payment went through (ship the
//! order) or an identification succeeded (log the user in). Subscribers
//! register a [`Notifier`] with the [`NotificationHub`]; builders and
//! handlers publish a [`BanklinkEvent`] after each state change.
//!
//! Events fire once per transition. A duplicate callback that loses the
//! compare-and-set publishes nothing.
//!
//! Notifiers run synchronously on the caller's thread, in subscription
//! order. Anything slow belongs on a queue behind the notifier.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::record::{Authentication, Transaction};

/// Something that happened to a record.
#[derive(Debug, Clone, PartialEq)]
pub enum BanklinkEvent {
    TransactionStarted(Transaction),
    TransactionSucceeded(Transaction),
    TransactionFailed(Transaction),
    AuthStarted(Authentication),
    AuthSucceeded(Authentication),
    AuthFailed(Authentication),
}

impl BanklinkEvent {
    /// Stable event name for logs and metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            BanklinkEvent::TransactionStarted(_) => "transaction_started",
            BanklinkEvent::TransactionSucceeded(_) => "transaction_succeeded",
            BanklinkEvent::TransactionFailed(_) => "transaction_failed",
            BanklinkEvent::AuthStarted(_) => "auth_started",
            BanklinkEvent::AuthSucceeded(_) => "auth_succeeded",
            BanklinkEvent::AuthFailed(_) => "auth_failed",
        }
    }

    /// Bank and record id the event is about.
    pub fn subject(&self) -> (&str, u64) {
        match self {
            BanklinkEvent::TransactionStarted(t)
            | BanklinkEvent::TransactionSucceeded(t)
            | BanklinkEvent::TransactionFailed(t) => (&t.bank_name, t.id),
            BanklinkEvent::AuthStarted(a)
            | BanklinkEvent::AuthSucceeded(a)
            | BanklinkEvent::AuthFailed(a) => (&a.bank_name, a.id),
        }
    }
}

/// A subscriber.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &BanklinkEvent);
}

impl<F> Notifier for F
where
    F: Fn(&BanklinkEvent) + Send + Sync,
{
    fn notify(&self, event: &BanklinkEvent) {
        self(event)
    }
}

/// Fan-out to every subscriber.
#[derive(Default)]
pub struct NotificationHub {
    subscribers: RwLock<Vec<Arc<dyn Notifier>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, notifier: Arc<dyn Notifier>) {
        self.subscribers.write().push(notifier);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn publish(&self, event: &BanklinkEvent) {
        // Snapshot first so a notifier may subscribe without deadlocking.
        let subscribers: Vec<_> = self.subscribers.read().clone();
        for subscriber in subscribers {
            subscriber.notify(event);
        }
    }
}

impl std::fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHub")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Writes every event to the log at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &BanklinkEvent) {
        let (bank, id) = event.subject();
        info!(event = event.name(), bank, id, "banklink event");
    }
}
