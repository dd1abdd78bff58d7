//! Append-only transcript of delivered messages, with explicit persistence.

use std::path::Path;
use std::sync::Mutex;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::codec;
use super::message::Message;

/// Store format version written into the root container.
const STORE_VERSION: &str = "1";

/// What `load` falls back to when the store is missing or unreadable.
///
/// The source material had two divergent policies here (seeded greeting vs
/// truly empty); it is a configuration choice, defaulting to `Empty`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SeedPolicy {
    #[default]
    Empty,
    Greeting {
        sender: Option<String>,
        receiver: Option<String>,
        content: String,
    },
}

/// Ordered, append-only log of delivered messages.
///
/// The sole source of truth for history. Appended to only at send time;
/// read concurrently by the presentation loop, so the sequence lives
/// behind a mutex and readers get atomic snapshots. Persistence is always
/// explicit and caller-triggered, never a side effect of `append`.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Mutex<Vec<Message>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            messages: Mutex::new(messages),
        }
    }

    /// Append a delivered message.
    pub fn append(&self, sender: Option<&str>, receiver: Option<&str>, content: &str) {
        self.push(Message::new(
            sender.map(str::to_string),
            receiver.map(str::to_string),
            Some(content.to_string()),
        ));
    }

    pub fn push(&self, message: Message) {
        self.messages.lock().unwrap().push(message);
    }

    /// Atomic copy of the full message sequence.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize the whole transcript as one `chat` document.
    pub fn serialize(&self) -> String {
        let messages = self.snapshot();
        let mut out = format!("<chat version=\"{STORE_VERSION}\">");
        for message in &messages {
            out.push_str(&codec::serialize(message));
        }
        out.push_str("</chat>");
        out
    }

    /// Rebuild a transcript from a `chat` document.
    ///
    /// The root container is excluded structurally: only its direct child
    /// elements named `message` contribute entries. Unknown attributes on
    /// the root (including `version`) are tolerated. Unlike the streaming
    /// codec this is a strict read: a store whose root or message element
    /// is still open at end of input is truncated, and an error, so `load`
    /// can fall back to the configured seed instead of keeping a partial
    /// history.
    pub fn deserialize(doc: &str) -> Result<Self> {
        let mut reader = Reader::from_str(doc);
        let mut messages = Vec::new();

        // Current message element being read, if any.
        let mut current: Option<Message> = None;
        let mut saw_root = false;
        // Count of open elements; 1 is the root, 2 a message entry.
        let mut depth = 0usize;

        loop {
            match reader.read_event() {
                Err(e) => {
                    return Err(Error::Persistence(format!("malformed transcript: {e}")));
                }
                Ok(Event::Eof) => {
                    if depth != 0 {
                        return Err(Error::Persistence(
                            "transcript store is truncated".to_string(),
                        ));
                    }
                    break;
                }
                Ok(Event::Start(start)) => {
                    depth += 1;
                    if !saw_root {
                        saw_root = true;
                        continue;
                    }
                    if current.is_none()
                        && depth == 2
                        && start.local_name().as_ref() == b"message"
                    {
                        let (sender, receiver) = codec::read_addressing(&start).ok_or_else(
                            || Error::Persistence("malformed message attributes".to_string()),
                        )?;
                        current = Some(Message::new(sender, receiver, None));
                    }
                }
                Ok(Event::Empty(start)) => {
                    if depth == 1
                        && current.is_none()
                        && start.local_name().as_ref() == b"message"
                    {
                        let (sender, receiver) = codec::read_addressing(&start).ok_or_else(
                            || Error::Persistence("malformed message attributes".to_string()),
                        )?;
                        messages.push(Message::new(sender, receiver, None));
                    }
                }
                Ok(Event::Text(text)) => {
                    if let Some(message) = current.as_mut() {
                        let chunk = text.unescape().map_err(|e| {
                            Error::Persistence(format!("malformed transcript text: {e}"))
                        })?;
                        message
                            .content
                            .get_or_insert_with(String::new)
                            .push_str(&chunk);
                    }
                }
                Ok(Event::End(_)) => {
                    depth = depth.saturating_sub(1);
                    // Only the message element's own end tag finishes the
                    // entry; elements nested inside its body do not.
                    if depth == 1 {
                        if let Some(message) = current.take() {
                            messages.push(message);
                        }
                    }
                }
                Ok(_) => {}
            }
        }

        if !saw_root {
            return Err(Error::Persistence(
                "transcript store has no root container".to_string(),
            ));
        }

        Ok(Self::from_messages(messages))
    }

    /// Write the transcript to disk. Explicit save point; errors propagate
    /// to the caller and never crash dispatch.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Persistence(format!("{}: {e}", parent.display())))?;
        }
        std::fs::write(path, self.serialize())
            .map_err(|e| Error::Persistence(format!("{}: {e}", path.display())))?;
        tracing::debug!("Saved transcript to {}", path.display());
        Ok(())
    }

    /// Load a transcript from disk, falling back to the configured seed on
    /// a missing or unreadable store. Never fails.
    pub fn load(path: &Path, seed: &SeedPolicy) -> Self {
        match std::fs::read_to_string(path) {
            Ok(doc) => match Self::deserialize(&doc) {
                Ok(transcript) => {
                    tracing::debug!(
                        "Loaded {} transcript messages from {}",
                        transcript.len(),
                        path.display()
                    );
                    return transcript;
                }
                Err(e) => {
                    tracing::warn!("Unreadable transcript at {}: {}", path.display(), e);
                }
            },
            Err(e) => {
                tracing::warn!("No transcript at {}: {}", path.display(), e);
            }
        }
        Self::seeded(seed)
    }

    fn seeded(seed: &SeedPolicy) -> Self {
        match seed {
            SeedPolicy::Empty => Self::new(),
            SeedPolicy::Greeting {
                sender,
                receiver,
                content,
            } => Self::from_messages(vec![Message::new(
                sender.clone(),
                receiver.clone(),
                Some(content.clone()),
            )]),
        }
    }
}
