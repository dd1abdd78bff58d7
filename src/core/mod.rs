//! Turn-taking core: behaviors, the dispatch switchboard, and the prompt
//! template the streaming behavior feeds its generator.

pub mod behavior;
pub mod dispatch;
pub mod prompt;

pub use behavior::{
    Behavior, DefaultHandler, InputGate, InteractiveHandler, Outgoing, StreamingHandler,
    StreamingPeers, TurnContext, TurnHandler,
};
pub use dispatch::{Delivery, ShutdownFlag, Switchboard};
