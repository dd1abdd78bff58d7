//! Message-exchange core for Palaver.
//!
//! - Participant directory and single-slot draft mailboxes
//! - Tolerant message codec (streamed text in, structured triples out)
//! - Append-only transcript with explicit persistence

pub mod codec;
pub mod directory;
pub mod mailbox;
pub mod message;
pub mod transcript;

pub use directory::{ClientDirectory, Participant};
pub use mailbox::{Draft, Mailbox};
pub use message::Message;
pub use transcript::{SeedPolicy, Transcript};
