//! CLI commands for Palaver using clap.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::{self, load_settings_or_default, Settings};
use crate::core::{
    Behavior, Delivery, InputGate, InteractiveHandler, ShutdownFlag, StreamingHandler,
    StreamingPeers, Switchboard,
};
use crate::presenter::{self, Presenter};
use crate::protocol::{ClientDirectory, Transcript};
use crate::providers::{Generator, OllamaGenerator};
use crate::shell::ShellHandler;

/// Palaver - turn-based chat between you, a shell, and a local model.
#[derive(Parser)]
#[command(name = "palaver")]
#[command(version = "0.1.0")]
#[command(about = "Palaver - turn-based chat between you, a shell, and a local model", long_about = None)]
pub struct Commands {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start an interactive session
    Run {
        /// Model to use (overrides settings)
        #[arg(long)]
        model: Option<String>,

        /// Transcript file path (overrides settings)
        #[arg(long)]
        transcript: Option<PathBuf>,
    },

    /// Print the saved transcript
    History {
        /// Transcript file path (overrides settings)
        #[arg(long)]
        transcript: Option<PathBuf>,
    },

    /// Write a default settings file
    Setup,
}

impl Commands {
    /// Run the command.
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Command::Run { model, transcript } => cmd_run(model, transcript).await,
            Command::History { transcript } => cmd_history(transcript).await,
            Command::Setup => cmd_setup().await,
        }
    }
}

// Command implementations

async fn cmd_run(model: &Option<String>, transcript: &Option<PathBuf>) -> Result<()> {
    let mut settings = load_settings_or_default();
    if let Some(model) = model {
        settings.ollama.model = model.clone();
    }
    if let Some(path) = transcript {
        settings.transcript.path = Some(path.clone());
    }
    let transcript_path = settings.transcript.resolve_path()?;

    let generator = OllamaGenerator::from_config(&settings.ollama);
    if !generator.is_available().await {
        tracing::warn!(
            "Ollama not reachable at {}; the assistant will fail until it is",
            settings.ollama.base_url
        );
        eprintln!(
            "Warning: Ollama not reachable at {}. Is it running?",
            settings.ollama.base_url
        );
    }

    let shutdown = ShutdownFlag::new();
    let gate = InputGate::new();
    let handle = tokio::runtime::Handle::current();

    presenter::spawn_input_thread(gate.clone(), shutdown.clone());

    let mut session = {
        let shutdown = shutdown.clone();
        let gate = gate.clone();
        tokio::task::spawn_blocking(move || {
            session_loop(
                settings,
                transcript_path,
                Arc::new(generator),
                handle,
                gate,
                shutdown,
            )
        })
    };

    tokio::select! {
        result = &mut session => result??,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupt received, shutting down");
            shutdown.set();
            gate.shutdown();
            session.await??;
        }
    }

    Ok(())
}

/// The synchronous session: directory, behaviors, presenter, and the
/// dispatch loop. Runs on a blocking thread; the async runtime stays free
/// for the generator's HTTP streaming.
fn session_loop(
    settings: Settings,
    transcript_path: PathBuf,
    generator: Arc<dyn Generator>,
    handle: tokio::runtime::Handle,
    gate: Arc<InputGate>,
    shutdown: ShutdownFlag,
) -> crate::error::Result<()> {
    let names = &settings.participants;

    let directory = Arc::new(ClientDirectory::new());
    directory.register(&names.user)?;
    directory.register(&names.shell)?;
    directory.register(&names.assistant)?;

    let transcript = Arc::new(Transcript::load(&transcript_path, &settings.transcript.seed));

    let mut board = Switchboard::new(directory.clone(), transcript.clone(), shutdown.clone());
    board.register_behavior(
        &names.user,
        Behavior::Interactive(InteractiveHandler::new(gate.clone())),
    )?;
    board.register_behavior(&names.shell, Behavior::Custom(Box::new(ShellHandler::new())))?;
    board.register_behavior(
        &names.assistant,
        Behavior::Streaming(StreamingHandler::new(
            generator,
            handle,
            StreamingPeers {
                user: names.user.clone(),
                shell: names.shell.clone(),
            },
        )),
    )?;

    let presenter = Presenter::new(
        directory.clone(),
        transcript.clone(),
        gate.clone(),
        shutdown.clone(),
        settings.presenter.refresh_ms,
        &names.user,
    );
    let presenter_handle = thread::spawn(move || presenter.run());

    // Prime the session by handing the floor to the user, as if the
    // assistant had just spoken.
    let opener = Delivery {
        sender: names.assistant.clone(),
        receiver: names.user.clone(),
        content: String::new(),
    };
    let result = board.run(opener);

    shutdown.set();
    gate.shutdown();
    if presenter_handle.join().is_err() {
        tracing::warn!("Presenter thread panicked");
    }

    transcript.save(&transcript_path)?;
    tracing::info!("Transcript saved to {}", transcript_path.display());
    result
}

async fn cmd_history(transcript: &Option<PathBuf>) -> Result<()> {
    let settings = load_settings_or_default();
    let path = match transcript {
        Some(path) => path.clone(),
        None => settings.transcript.resolve_path()?,
    };

    if !path.exists() {
        println!("No transcript found at {}", path.display());
        return Ok(());
    }

    let content = std::fs::read_to_string(&path)?;
    let transcript = Transcript::deserialize(&content)?;
    for message in transcript.snapshot() {
        println!("{}", presenter::format_message(&message, 0));
    }
    Ok(())
}

async fn cmd_setup() -> Result<()> {
    let path = config::write_default_settings()?;
    println!("Wrote default settings to {}", path.display());
    println!("Edit participant names, the transcript path, or the Ollama model there.");
    Ok(())
}
