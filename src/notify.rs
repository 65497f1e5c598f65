//! User-visible, non-fatal notifications.
//!
//! Every rollback and every commit refused for lack of an owning scope is
//! paired with exactly one notice. Notices never abort anything; retrying
//! the gesture may succeed.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

/// A change that was reverted or refused
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutation_id: Option<Uuid>,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
            mutation_id: None,
        }
    }

    pub fn for_mutation(mut self, id: Uuid) -> Self {
        self.mutation_id = Some(id);
        self
    }
}

/// Sink for notices shown to the user
pub trait Notifier {
    fn notify(&self, notice: Notice);
}

impl<N: Notifier + ?Sized> Notifier for Rc<N> {
    fn notify(&self, notice: Notice) {
        (**self).notify(notice)
    }
}

/// Notifier that logs and keeps every notice for later display
#[derive(Debug, Clone, Default)]
pub struct NoticeLog {
    notices: Rc<RefCell<Vec<Notice>>>,
}

impl NoticeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.notices.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.borrow().is_empty()
    }

    /// Remove and return everything recorded so far
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.borrow_mut())
    }
}

impl Notifier for NoticeLog {
    fn notify(&self, notice: Notice) {
        warn!(message = %notice.message, mutation = ?notice.mutation_id, "user notice");
        self.notices.borrow_mut().push(notice);
    }
}
