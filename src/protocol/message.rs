//! The message record exchanged between participants.

/// A single message in the exchange.
///
/// Sender and receiver are participant names resolved through the
/// [`ClientDirectory`](super::directory::ClientDirectory). An absent sender
/// or receiver means "unknown/system" origin. An absent `content` is the
/// unresolved placeholder value, distinct from empty text: it tells a
/// streaming consumer to keep buffering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub content: Option<String>,
    pub sender: Option<String>,
    pub receiver: Option<String>,
}

impl Message {
    pub fn new(
        sender: Option<String>,
        receiver: Option<String>,
        content: Option<String>,
    ) -> Self {
        Self {
            content,
            sender,
            receiver,
        }
    }

    /// The "keep buffering" value returned by the codec when no parse tier
    /// succeeds. Not an error.
    pub fn placeholder() -> Self {
        Self {
            content: None,
            sender: None,
            receiver: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.content.is_none() && self.sender.is_none() && self.receiver.is_none()
    }

    /// A message is resolved once its content is present.
    pub fn is_resolved(&self) -> bool {
        self.content.is_some()
    }
}
