//! Palaver library root.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod presenter;
pub mod protocol;
pub mod providers;
pub mod shell;

pub use cli::Commands;
pub use config::{load_settings, Settings};
pub use core::{Behavior, Delivery, ShutdownFlag, Switchboard, TurnHandler};
pub use error::{Error, Result};
pub use protocol::{ClientDirectory, Mailbox, Message, SeedPolicy, Transcript};
pub use providers::{Generator, OllamaGenerator};
