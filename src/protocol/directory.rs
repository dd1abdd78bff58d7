//! Participant registry.

use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

use super::mailbox::Mailbox;

/// A named endpoint in the exchange.
///
/// Participants are created at startup through
/// [`ClientDirectory::register`] and live for the process lifetime. Each
/// owns exactly one [`Mailbox`].
#[derive(Debug)]
pub struct Participant {
    name: String,
    mailbox: Mailbox,
}

impl Participant {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            mailbox: Mailbox::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }
}

/// Registry of participants, looked up by unique name.
///
/// One explicit instance is threaded through all components; there is no
/// ambient process-wide list.
#[derive(Debug, Default)]
pub struct ClientDirectory {
    // Vec keeps registration order, which the presenter uses for stable
    // display assignment.
    participants: Mutex<Vec<Arc<Participant>>>,
}

impl ClientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new participant. Fails if the name is already taken.
    pub fn register(&self, name: &str) -> Result<Arc<Participant>> {
        let mut participants = self.participants.lock().unwrap();
        if participants.iter().any(|p| p.name() == name) {
            return Err(Error::DuplicateName(name.to_string()));
        }
        let participant = Arc::new(Participant::new(name));
        participants.push(participant.clone());
        tracing::debug!("Registered participant '{}'", name);
        Ok(participant)
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Participant>> {
        let participants = self.participants.lock().unwrap();
        participants.iter().find(|p| p.name() == name).cloned()
    }

    /// Snapshot of all participants in registration order.
    pub fn participants(&self) -> Vec<Arc<Participant>> {
        self.participants.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.participants.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
