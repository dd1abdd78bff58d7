//! Single-slot outgoing draft mailbox, one per participant.

use std::sync::Mutex;

/// Snapshot of an in-progress draft, taken for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    /// Target participant name, if already fixed.
    pub receiver: Option<String>,
    pub content: String,
}

#[derive(Debug, Default)]
struct Slot {
    receiver: Option<String>,
    content: Option<String>,
}

/// A participant's outgoing draft slot.
///
/// Deliberately single-slot: `set_draft` is last-writer-wins, there is no
/// queue. The receiver and content fields live behind one mutex so the
/// presentation loop always observes them as a unit.
#[derive(Debug, Default)]
pub struct Mailbox {
    slot: Mutex<Slot>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a draft, overwriting any unsent one.
    pub fn set_draft(&self, receiver: &str, content: &str) {
        let mut slot = self.slot.lock().unwrap();
        slot.receiver = Some(receiver.to_string());
        slot.content = Some(content.to_string());
    }

    /// Synchronized snapshot of the in-progress draft, for display.
    /// Returns `None` when the slot is empty.
    pub fn peek_unsent(&self) -> Option<Draft> {
        let slot = self.slot.lock().unwrap();
        if slot.receiver.is_none() && slot.content.is_none() {
            return None;
        }
        Some(Draft {
            receiver: slot.receiver.clone(),
            content: slot.content.clone().unwrap_or_default(),
        })
    }

    /// Atomically capture `(receiver, content)` and clear the slot.
    ///
    /// Returns `None` without touching the slot when no receiver is set;
    /// the switchboard maps that to [`Error::NoReceiver`](crate::Error).
    pub fn take_ready(&self) -> Option<(String, String)> {
        let mut slot = self.slot.lock().unwrap();
        let receiver = slot.receiver.take()?;
        let content = slot.content.take().unwrap_or_default();
        Some((receiver, content))
    }

    pub fn clear(&self) {
        let mut slot = self.slot.lock().unwrap();
        slot.receiver = None;
        slot.content = None;
    }

    pub fn is_empty(&self) -> bool {
        let slot = self.slot.lock().unwrap();
        slot.receiver.is_none() && slot.content.is_none()
    }
}
