//! Turn-taking dispatch: the switchboard trampoline.
//!
//! Exactly one logical floor exists at a time. Sending passes control to
//! the receiver's handler, whose own send continues the chain. There is no
//! scheduler, only a cooperative baton-pass, driven here as an iterative
//! loop so stack depth stays constant and shutdown can cut in between
//! hops.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::protocol::{ClientDirectory, Transcript};

use super::behavior::{Behavior, TurnContext};

/// Cooperative shutdown signal shared by the dispatch and presentation
/// contexts.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One hop of the chain: a delivered `(sender, receiver, content)` triple.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub sender: String,
    pub receiver: String,
    pub content: String,
}

/// Owner of the turn-taking protocol: participants' behaviors, the shared
/// transcript, and the trampoline that walks a chain of turns.
pub struct Switchboard {
    directory: Arc<ClientDirectory>,
    transcript: Arc<Transcript>,
    behaviors: HashMap<String, Behavior>,
    shutdown: ShutdownFlag,
}

impl Switchboard {
    pub fn new(
        directory: Arc<ClientDirectory>,
        transcript: Arc<Transcript>,
        shutdown: ShutdownFlag,
    ) -> Self {
        Self {
            directory,
            transcript,
            behaviors: HashMap::new(),
            shutdown,
        }
    }

    /// Attach a behavior to a registered participant.
    pub fn register_behavior(&mut self, name: &str, behavior: Behavior) -> Result<()> {
        if self.directory.lookup(name).is_none() {
            return Err(Error::UnknownParticipant(name.to_string()));
        }
        self.behaviors.insert(name.to_string(), behavior);
        Ok(())
    }

    /// Send the named participant's drafted message.
    ///
    /// Appends it to the transcript, then drives the resulting chain of
    /// turns; does not return until the chain has unwound. Fails with
    /// [`Error::NoReceiver`] when no draft receiver is set, leaving the
    /// transcript untouched.
    pub fn send(&mut self, sender: &str) -> Result<()> {
        let participant = self
            .directory
            .lookup(sender)
            .ok_or_else(|| Error::UnknownParticipant(sender.to_string()))?;
        let (receiver, content) = participant
            .mailbox()
            .take_ready()
            .ok_or_else(|| Error::NoReceiver(sender.to_string()))?;
        self.transcript
            .append(Some(sender), Some(&receiver), &content);
        self.drive(Delivery {
            sender: sender.to_string(),
            receiver,
            content,
        })
    }

    /// Keep re-handing the floor via `opener` until shutdown.
    ///
    /// The opener is delivered directly, without a transcript entry; it is
    /// the stimulus that primes a session, and a chain that ends (handler
    /// failure, or a handler bowing out) returns the floor the same way.
    pub fn run(&mut self, opener: Delivery) -> Result<()> {
        while !self.shutdown.is_set() {
            self.drive(opener.clone())?;
        }
        tracing::info!("Dispatch loop stopped");
        Ok(())
    }

    // The trampoline: one iteration per turn, constant stack depth no
    // matter how many hops the chain makes.
    fn drive(&mut self, first: Delivery) -> Result<()> {
        let mut next = Some(first);
        while let Some(hop) = next {
            if self.shutdown.is_set() {
                break;
            }
            next = self.deliver(hop)?;
        }
        Ok(())
    }

    fn deliver(&mut self, hop: Delivery) -> Result<Option<Delivery>> {
        tracing::debug!("Turn: {} => {}", hop.sender, hop.receiver);
        let Some(participant) = self.directory.lookup(&hop.receiver) else {
            self.transcript.append(
                None,
                Some(&hop.sender),
                &format!("Undeliverable: no participant named '{}'", hop.receiver),
            );
            return Ok(None);
        };
        let Some(behavior) = self.behaviors.get_mut(&hop.receiver) else {
            self.transcript.append(
                None,
                Some(&hop.sender),
                &format!("Undeliverable: '{}' has no handler", hop.receiver),
            );
            return Ok(None);
        };

        let ctx = TurnContext {
            participant: participant.as_ref(),
            directory: self.directory.as_ref(),
            transcript: self.transcript.as_ref(),
            shutdown: &self.shutdown,
        };
        match behavior.handle(&ctx, &hop.sender, &hop.content) {
            Ok(Some(outgoing)) => {
                // The receiver takes the floor: stage its reply and send
                // it through its own mailbox.
                participant
                    .mailbox()
                    .set_draft(&outgoing.receiver, &outgoing.content);
                let Some((receiver, content)) = participant.mailbox().take_ready() else {
                    return Ok(None);
                };
                self.transcript
                    .append(Some(&hop.receiver), Some(&receiver), &content);
                Ok(Some(Delivery {
                    sender: hop.receiver,
                    receiver,
                    content,
                }))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                let failure = Error::Handler {
                    participant: hop.receiver.clone(),
                    message: e.to_string(),
                };
                tracing::warn!("{}", failure);
                // Terminal for this chain, but visible: the failure is
                // delivered back to the sender through the transcript.
                self.transcript
                    .append(None, Some(&hop.sender), &failure.to_string());
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::behavior::{Outgoing, TurnHandler};
    use std::sync::Mutex;

    /// Handler that records every invocation and replays scripted replies.
    struct Recorder {
        calls: Arc<Mutex<Vec<(String, String)>>>,
        replies: Vec<Outgoing>,
    }

    impl Recorder {
        fn new(calls: Arc<Mutex<Vec<(String, String)>>>, replies: Vec<Outgoing>) -> Self {
            Self { calls, replies }
        }
    }

    impl TurnHandler for Recorder {
        fn on_receive(
            &mut self,
            _ctx: &TurnContext<'_>,
            sender: &str,
            content: &str,
        ) -> Result<Option<Outgoing>> {
            self.calls
                .lock()
                .unwrap()
                .push((sender.to_string(), content.to_string()));
            if self.replies.is_empty() {
                Ok(None)
            } else {
                Ok(Some(self.replies.remove(0)))
            }
        }
    }

    struct Exploder;

    impl TurnHandler for Exploder {
        fn on_receive(
            &mut self,
            _ctx: &TurnContext<'_>,
            _sender: &str,
            _content: &str,
        ) -> Result<Option<Outgoing>> {
            Err(Error::Other("boom".to_string()))
        }
    }

    fn fixture() -> (Arc<ClientDirectory>, Arc<Transcript>, Switchboard) {
        let directory = Arc::new(ClientDirectory::new());
        directory.register("a").unwrap();
        directory.register("b").unwrap();
        let transcript = Arc::new(Transcript::new());
        let board = Switchboard::new(directory.clone(), transcript.clone(), ShutdownFlag::new());
        (directory, transcript, board)
    }

    #[test]
    fn test_send_appends_and_invokes_receiver() {
        let (directory, transcript, mut board) = fixture();
        let calls = Arc::new(Mutex::new(Vec::new()));
        board
            .register_behavior("b", Behavior::Custom(Box::new(Recorder::new(calls.clone(), vec![]))))
            .unwrap();

        let a = directory.lookup("a").unwrap();
        a.mailbox().set_draft("b", "ping");
        board.send("a").unwrap();

        let messages = transcript.snapshot();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender.as_deref(), Some("a"));
        assert_eq!(messages[0].receiver.as_deref(), Some("b"));
        assert_eq!(messages[0].content.as_deref(), Some("ping"));

        assert_eq!(
            calls.lock().unwrap().as_slice(),
            &[("a".to_string(), "ping".to_string())]
        );
        assert!(a.mailbox().is_empty());
    }

    #[test]
    fn test_send_without_draft_fails_no_receiver() {
        let (_directory, transcript, mut board) = fixture();

        match board.send("a") {
            Err(Error::NoReceiver(name)) => assert_eq!(name, "a"),
            other => panic!("expected NoReceiver, got {:?}", other),
        }
        assert!(transcript.is_empty());
    }

    #[test]
    fn test_send_unknown_participant() {
        let (_directory, _transcript, mut board) = fixture();
        assert!(matches!(
            board.send("ghost"),
            Err(Error::UnknownParticipant(_))
        ));
    }

    #[test]
    fn test_chain_walks_multiple_hops() {
        let (directory, transcript, mut board) = fixture();
        let a_calls = Arc::new(Mutex::new(Vec::new()));
        let b_calls = Arc::new(Mutex::new(Vec::new()));
        board
            .register_behavior(
                "b",
                Behavior::Custom(Box::new(Recorder::new(
                    b_calls.clone(),
                    vec![Outgoing {
                        receiver: "a".to_string(),
                        content: "pong".to_string(),
                    }],
                ))),
            )
            .unwrap();
        board
            .register_behavior("a", Behavior::Custom(Box::new(Recorder::new(a_calls.clone(), vec![]))))
            .unwrap();

        let a = directory.lookup("a").unwrap();
        a.mailbox().set_draft("b", "ping");
        board.send("a").unwrap();

        let contents: Vec<_> = transcript
            .snapshot()
            .iter()
            .map(|m| m.content.clone().unwrap())
            .collect();
        assert_eq!(contents, vec!["ping", "pong"]);
        assert_eq!(
            a_calls.lock().unwrap().as_slice(),
            &[("b".to_string(), "pong".to_string())]
        );
    }

    #[test]
    fn test_handler_failure_becomes_terminal_message() {
        let (directory, transcript, mut board) = fixture();
        board
            .register_behavior("b", Behavior::Custom(Box::new(Exploder)))
            .unwrap();

        let a = directory.lookup("a").unwrap();
        a.mailbox().set_draft("b", "ping");
        board.send("a").unwrap();

        let messages = transcript.snapshot();
        assert_eq!(messages.len(), 2);
        // System-origin notice delivered back to the sender.
        assert_eq!(messages[1].sender, None);
        assert_eq!(messages[1].receiver.as_deref(), Some("a"));
        assert!(messages[1].content.as_deref().unwrap().contains("boom"));
    }

    #[test]
    fn test_unknown_receiver_is_undeliverable() {
        let (directory, transcript, mut board) = fixture();
        let a = directory.lookup("a").unwrap();
        a.mailbox().set_draft("nobody", "hello?");
        board.send("a").unwrap();

        let messages = transcript.snapshot();
        assert_eq!(messages.len(), 2);
        assert!(messages[1]
            .content
            .as_deref()
            .unwrap()
            .contains("no participant named 'nobody'"));
    }

    #[test]
    fn test_default_behavior_round_trip() {
        let (directory, transcript, mut board) = fixture();
        let a_calls = Arc::new(Mutex::new(Vec::new()));
        board
            .register_behavior("b", Behavior::Default(crate::core::DefaultHandler::new()))
            .unwrap();
        board
            .register_behavior("a", Behavior::Custom(Box::new(Recorder::new(a_calls.clone(), vec![]))))
            .unwrap();

        let a = directory.lookup("a").unwrap();
        a.mailbox().set_draft("b", "hello");
        board.send("a").unwrap();

        assert_eq!(transcript.len(), 2);
        assert_eq!(
            a_calls.lock().unwrap().as_slice(),
            &[("b".to_string(), "Hi, I'm b".to_string())]
        );
    }
}
