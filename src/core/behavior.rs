//! Handler contracts for the turn-taking protocol.
//!
//! Each participant is driven by one [`Behavior`]: a canned default, the
//! blocking interactive gate, the streaming generator consumer, or any
//! custom [`TurnHandler`].

use std::sync::{Arc, Condvar, Mutex};

use crate::error::{Error, Result};
use crate::protocol::{codec, ClientDirectory, Message, Participant, Transcript};
use crate::providers::{spawn_stream, Generator};

use super::dispatch::ShutdownFlag;
use super::prompt;

/// The handler's next hop: where the floor goes and with what content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub receiver: String,
    pub content: String,
}

/// What a handler can reach during its turn.
pub struct TurnContext<'a> {
    /// The participant whose turn it is.
    pub participant: &'a Participant,
    pub directory: &'a ClientDirectory,
    pub transcript: &'a Transcript,
    pub shutdown: &'a ShutdownFlag,
}

/// A participant's receive handler.
///
/// Invoked by the switchboard with the incoming `(sender, content)` pair.
/// Returning `Ok(Some(..))` passes the floor on; `Ok(None)` ends the chain;
/// an error is caught by the switchboard and surfaced in the transcript,
/// never allowed to crash the process.
pub trait TurnHandler: Send {
    fn on_receive(
        &mut self,
        ctx: &TurnContext<'_>,
        sender: &str,
        content: &str,
    ) -> Result<Option<Outgoing>>;
}

/// The behavior variants a participant can be registered with.
pub enum Behavior {
    Default(DefaultHandler),
    Interactive(InteractiveHandler),
    Streaming(StreamingHandler),
    Custom(Box<dyn TurnHandler>),
}

impl Behavior {
    pub(crate) fn handle(
        &mut self,
        ctx: &TurnContext<'_>,
        sender: &str,
        content: &str,
    ) -> Result<Option<Outgoing>> {
        match self {
            Behavior::Default(handler) => handler.on_receive(ctx, sender, content),
            Behavior::Interactive(handler) => handler.on_receive(ctx, sender, content),
            Behavior::Streaming(handler) => handler.on_receive(ctx, sender, content),
            Behavior::Custom(handler) => handler.on_receive(ctx, sender, content),
        }
    }
}

/// Terminating one-step handler: replies to the sender and yields the
/// floor back.
#[derive(Debug, Default)]
pub struct DefaultHandler {
    reply: Option<String>,
}

impl DefaultHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
        }
    }
}

impl TurnHandler for DefaultHandler {
    fn on_receive(
        &mut self,
        ctx: &TurnContext<'_>,
        sender: &str,
        _content: &str,
    ) -> Result<Option<Outgoing>> {
        let content = self
            .reply
            .clone()
            .unwrap_or_else(|| format!("Hi, I'm {}", ctx.participant.name()));
        Ok(Some(Outgoing {
            receiver: sender.to_string(),
            content,
        }))
    }
}

#[derive(Debug, Default)]
struct GateState {
    open: bool,
    submitted: Option<String>,
    shutdown: bool,
}

/// Cross-thread handoff point between the interactive handler and the
/// presentation collaborator.
///
/// The handler parks on the condvar; the presenter submits a line and
/// notifies. `shutdown` wakes a parked wait so the dispatch thread never
/// hangs on process exit.
#[derive(Debug, Default)]
pub struct InputGate {
    state: Mutex<GateState>,
    ready: Condvar,
}

impl InputGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Whether a handler is currently waiting for input.
    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }

    /// Supply the waiting handler with a line of input.
    pub fn submit(&self, text: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state.submitted = Some(text.into());
        self.ready.notify_all();
    }

    /// Wake any parked wait; it returns `None`.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        state.shutdown = true;
        self.ready.notify_all();
    }

    /// Park until input is submitted or shutdown is signalled.
    pub fn wait_for_input(&self) -> Option<String> {
        let mut state = self.state.lock().unwrap();
        state.open = true;
        state.submitted = None;
        loop {
            if state.shutdown {
                state.open = false;
                return None;
            }
            if let Some(text) = state.submitted.take() {
                state.open = false;
                return Some(text);
            }
            state = self.ready.wait(state).unwrap();
        }
    }
}

/// The human participant's handler. The only variant allowed to suspend
/// indefinitely: it blocks the dispatch chain on the [`InputGate`] until
/// the presentation collaborator supplies a line.
pub struct InteractiveHandler {
    gate: Arc<InputGate>,
}

impl InteractiveHandler {
    pub fn new(gate: Arc<InputGate>) -> Self {
        Self { gate }
    }
}

impl TurnHandler for InteractiveHandler {
    fn on_receive(
        &mut self,
        ctx: &TurnContext<'_>,
        sender: &str,
        _content: &str,
    ) -> Result<Option<Outgoing>> {
        // Fix the reply target before parking so the presenter can show
        // who holds the floor.
        ctx.participant.mailbox().set_draft(sender, "");
        let Some(text) = self.gate.wait_for_input() else {
            ctx.participant.mailbox().clear();
            return Ok(None);
        };
        Ok(Some(Outgoing {
            receiver: sender.to_string(),
            content: text,
        }))
    }
}

/// Peer names the streaming prompt refers to.
#[derive(Debug, Clone)]
pub struct StreamingPeers {
    pub user: String,
    pub shell: String,
}

/// The generative participant's handler.
///
/// Consumes a lazy chunk sequence from the [`Generator`], reparsing the
/// accumulated text after every increment. While the codec resolves no
/// content it keeps buffering; once resolved, the growing partial is
/// published into the mailbox draft for live rendering. Sends exactly
/// once, when the source completes.
pub struct StreamingHandler {
    generator: Arc<dyn Generator>,
    runtime: tokio::runtime::Handle,
    peers: StreamingPeers,
}

impl StreamingHandler {
    pub fn new(
        generator: Arc<dyn Generator>,
        runtime: tokio::runtime::Handle,
        peers: StreamingPeers,
    ) -> Self {
        Self {
            generator,
            runtime,
            peers,
        }
    }
}

impl TurnHandler for StreamingHandler {
    fn on_receive(
        &mut self,
        ctx: &TurnContext<'_>,
        sender: &str,
        content: &str,
    ) -> Result<Option<Outgoing>> {
        let incoming = Message::new(
            Some(sender.to_string()),
            Some(ctx.participant.name().to_string()),
            Some(content.to_string()),
        );
        let rendered = prompt::render(
            &prompt::PromptContext {
                assistant: ctx.participant.name(),
                user: &self.peers.user,
                shell: &self.peers.shell,
            },
            &ctx.transcript.serialize(),
            &codec::serialize(&incoming),
        );

        let chunks = spawn_stream(self.generator.clone(), &self.runtime, rendered);
        let mut buffer = String::new();
        for chunk in chunks {
            if ctx.shutdown.is_set() {
                return Ok(None);
            }
            // A mid-stream failure ends the turn; the buffered prefix must
            // never be sent as if the source had completed.
            buffer.push_str(&chunk?);
            let partial = codec::parse(&buffer);
            if let (Some(receiver), Some(partial_content)) = (&partial.receiver, &partial.content)
            {
                ctx.participant.mailbox().set_draft(receiver, partial_content);
            }
        }

        let response = codec::parse(&buffer);
        match (response.receiver, response.content) {
            (Some(receiver), Some(content)) => Ok(Some(Outgoing { receiver, content })),
            _ => Err(Error::Other(format!(
                "stream ended without a parseable message: {:?}",
                excerpt(&buffer)
            ))),
        }
    }
}

fn excerpt(text: &str) -> String {
    const LIMIT: usize = 120;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        let cut: String = text.chars().take(LIMIT).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::GeneratorError;
    use async_trait::async_trait;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    struct ScriptedGenerator {
        chunks: Vec<String>,
        failure: Option<String>,
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn generate(
            &self,
            _prompt: &str,
            tx: mpsc::Sender<String>,
        ) -> std::result::Result<(), GeneratorError> {
            for chunk in &self.chunks {
                if tx.send(chunk.clone()).is_err() {
                    break;
                }
            }
            match &self.failure {
                Some(message) => Err(GeneratorError::ApiError(message.clone())),
                None => Ok(()),
            }
        }
    }

    fn context_fixture() -> (Arc<ClientDirectory>, Arc<Transcript>, ShutdownFlag) {
        let directory = Arc::new(ClientDirectory::new());
        directory.register("user").unwrap();
        directory.register("chatbot").unwrap();
        (directory, Arc::new(Transcript::new()), ShutdownFlag::new())
    }

    #[test]
    fn test_default_handler_replies_to_sender() {
        let (directory, transcript, shutdown) = context_fixture();
        let participant = directory.lookup("chatbot").unwrap();
        let ctx = TurnContext {
            participant: &participant,
            directory: &directory,
            transcript: &transcript,
            shutdown: &shutdown,
        };

        let mut handler = DefaultHandler::new();
        let outgoing = handler.on_receive(&ctx, "user", "hello").unwrap().unwrap();
        assert_eq!(outgoing.receiver, "user");
        assert_eq!(outgoing.content, "Hi, I'm chatbot");
    }

    #[test]
    fn test_gate_submit_wakes_waiter() {
        let gate = InputGate::new();
        let waiter = {
            let gate = gate.clone();
            thread::spawn(move || gate.wait_for_input())
        };

        // Let the waiter park, then feed it.
        while !gate.is_open() {
            thread::sleep(Duration::from_millis(1));
        }
        gate.submit("install ripgrep");
        assert_eq!(waiter.join().unwrap().as_deref(), Some("install ripgrep"));
        assert!(!gate.is_open());
    }

    #[test]
    fn test_gate_shutdown_wakes_waiter() {
        let gate = InputGate::new();
        let waiter = {
            let gate = gate.clone();
            thread::spawn(move || gate.wait_for_input())
        };

        while !gate.is_open() {
            thread::sleep(Duration::from_millis(1));
        }
        gate.shutdown();
        assert_eq!(waiter.join().unwrap(), None);
    }

    #[test]
    fn test_interactive_handler_returns_submitted_text() {
        let (directory, transcript, shutdown) = context_fixture();
        let participant = directory.lookup("user").unwrap();
        let gate = InputGate::new();

        let submitter = {
            let gate = gate.clone();
            thread::spawn(move || {
                while !gate.is_open() {
                    thread::sleep(Duration::from_millis(1));
                }
                gate.submit("ping");
            })
        };

        let ctx = TurnContext {
            participant: &participant,
            directory: &directory,
            transcript: &transcript,
            shutdown: &shutdown,
        };
        let mut handler = InteractiveHandler::new(gate);
        let outgoing = handler.on_receive(&ctx, "chatbot", "").unwrap().unwrap();
        submitter.join().unwrap();

        assert_eq!(outgoing.receiver, "chatbot");
        assert_eq!(outgoing.content, "ping");
    }

    #[test]
    fn test_streaming_handler_buffers_then_sends_once() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (directory, transcript, shutdown) = context_fixture();
        let participant = directory.lookup("chatbot").unwrap();

        let generator = Arc::new(ScriptedGenerator {
            chunks: vec![
                "<message from='chatbot' to='".to_string(),
                "user'>Hel".to_string(),
                "lo</message>".to_string(),
            ],
            failure: None,
        });
        let mut handler = StreamingHandler::new(
            generator,
            runtime.handle().clone(),
            StreamingPeers {
                user: "user".to_string(),
                shell: "terminal".to_string(),
            },
        );

        let ctx = TurnContext {
            participant: &participant,
            directory: &directory,
            transcript: &transcript,
            shutdown: &shutdown,
        };
        let outgoing = handler.on_receive(&ctx, "user", "hi").unwrap().unwrap();
        assert_eq!(outgoing.receiver, "user");
        assert_eq!(outgoing.content, "Hello");

        // The last partial remains published for display until the
        // switchboard stages the final send.
        let draft = participant.mailbox().peek_unsent().unwrap();
        assert_eq!(draft.receiver.as_deref(), Some("user"));
        assert_eq!(draft.content, "Hello");
    }

    #[test]
    fn test_streaming_handler_midstream_failure_is_an_error() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (directory, transcript, shutdown) = context_fixture();
        let participant = directory.lookup("chatbot").unwrap();

        // The truncated prefix parses to a resolved message on its own; a
        // failing source must still surface as an error, never as a send
        // of the partial text.
        let generator = Arc::new(ScriptedGenerator {
            chunks: vec!["<message from='chatbot' to='user'>partial answer".to_string()],
            failure: Some("connection reset mid-stream".to_string()),
        });
        let mut handler = StreamingHandler::new(
            generator,
            runtime.handle().clone(),
            StreamingPeers {
                user: "user".to_string(),
                shell: "terminal".to_string(),
            },
        );

        let ctx = TurnContext {
            participant: &participant,
            directory: &directory,
            transcript: &transcript,
            shutdown: &shutdown,
        };
        match handler.on_receive(&ctx, "user", "hi") {
            Err(Error::Generator(GeneratorError::ApiError(message))) => {
                assert!(message.contains("connection reset"));
            }
            other => panic!("expected generator failure, got {:?}", other),
        }
    }

    #[test]
    fn test_streaming_handler_unresolved_stream_is_an_error() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (directory, transcript, shutdown) = context_fixture();
        let participant = directory.lookup("chatbot").unwrap();

        let generator = Arc::new(ScriptedGenerator {
            chunks: vec!["no markup at all".to_string()],
            failure: None,
        });
        let mut handler = StreamingHandler::new(
            generator,
            runtime.handle().clone(),
            StreamingPeers {
                user: "user".to_string(),
                shell: "terminal".to_string(),
            },
        );

        let ctx = TurnContext {
            participant: &participant,
            directory: &directory,
            transcript: &transcript,
            shutdown: &shutdown,
        };
        assert!(handler.on_receive(&ctx, "user", "hi").is_err());
    }
}
