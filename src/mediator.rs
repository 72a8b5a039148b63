//! Process-wide change-notification hub.
//!
//! Domain services publish here after every mutation (and on failures);
//! view layers subscribe to know when to re-fetch. Publishing is synchronous
//! and fire-and-forget: subscribers run in registration order on the
//! publishing thread, and a panicking subscriber is isolated so the
//! remaining subscribers still run and nothing propagates back to the
//! publishing service.
//!
//! Subscriptions are explicit handles: [`EventMediator::subscribe`] returns
//! a [`SubscriptionId`] that must be passed to
//! [`EventMediator::unsubscribe`] when the view is torn down, so the
//! mediator never retains handlers for dead views.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::db::{CaseRecord, CaseStatus, DocumentRecord, InvoiceRecord};

/// What happened to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Added,
    Updated,
    Deleted,
    StatusChanged,
}

impl ChangeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::StatusChanged => "status_changed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaseChange {
    pub case: CaseRecord,
    pub action: ChangeAction,
    /// Set when `action` is [`ChangeAction::StatusChanged`]; the new status
    /// is on the record itself.
    pub previous_status: Option<CaseStatus>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DocumentChange {
    pub document: DocumentRecord,
    pub action: ChangeAction,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct InvoiceChange {
    pub invoice: InvoiceRecord,
    pub action: ChangeAction,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum Notification {
    /// Generic "something changed" message. Failure notifications use this
    /// variant with the error text as the message.
    DataChanged {
        message: String,
        occurred_at: DateTime<Utc>,
    },
    Case(CaseChange),
    Document(DocumentChange),
    Invoice(InvoiceChange),
}

impl Notification {
    pub fn data_changed(message: impl Into<String>) -> Self {
        Self::DataChanged {
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }

    pub fn case(case: CaseRecord, action: ChangeAction) -> Self {
        Self::Case(CaseChange {
            case,
            action,
            previous_status: None,
            occurred_at: Utc::now(),
        })
    }

    pub fn case_status_changed(case: CaseRecord, previous_status: CaseStatus) -> Self {
        Self::Case(CaseChange {
            case,
            action: ChangeAction::StatusChanged,
            previous_status: Some(previous_status),
            occurred_at: Utc::now(),
        })
    }

    pub fn document(document: DocumentRecord, action: ChangeAction) -> Self {
        Self::Document(DocumentChange {
            document,
            action,
            occurred_at: Utc::now(),
        })
    }

    pub fn invoice(invoice: InvoiceRecord, action: ChangeAction) -> Self {
        Self::Invoice(InvoiceChange {
            invoice,
            action,
            occurred_at: Utc::now(),
        })
    }
}

/// Handle returned from [`EventMediator::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Notification) + Send + Sync>;

#[derive(Default)]
pub struct EventMediator {
    subscribers: Mutex<Vec<(SubscriptionId, Handler)>>,
    next_id: AtomicU64,
}

impl EventMediator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; it receives every notification published after
    /// this call until it is unsubscribed.
    pub fn subscribe(
        &self,
        handler: impl Fn(&Notification) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns false when the id was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(registered, _)| *registered != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Synchronously invoke every subscriber registered at the time of the
    /// call, in registration order. The registry lock is not held while
    /// handlers run, so handlers may subscribe or unsubscribe re-entrantly.
    pub fn publish(&self, notification: Notification) {
        let snapshot: Vec<(SubscriptionId, Handler)> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (id, handler) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(&notification))).is_err() {
                tracing::warn!(
                    "event subscriber {:?} panicked; remaining subscribers still run",
                    id
                );
            }
        }
    }
}
