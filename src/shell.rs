//! Shell participant: runs received message bodies as commands and replies
//! with their captured output.

use std::process::Command;

use crate::core::{Outgoing, TurnContext, TurnHandler};
use crate::error::{Error, Result};

/// Captured result of one command invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Seam for command execution, so the handler can be tested without
/// touching a real shell.
pub trait CommandRunner: Send {
    fn run(&self, command: &str) -> Result<CommandOutput>;
}

/// Runs commands through `sh -c`.
#[derive(Debug, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> Result<CommandOutput> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .map_err(|e| Error::Command(format!("failed to spawn shell: {e}")))?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Behavior that treats incoming message bodies as shell commands.
pub struct ShellHandler {
    runner: Box<dyn CommandRunner>,
}

impl ShellHandler {
    pub fn new() -> Self {
        Self::with_runner(Box::new(ShellRunner))
    }

    pub fn with_runner(runner: Box<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl Default for ShellHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnHandler for ShellHandler {
    fn on_receive(
        &mut self,
        _ctx: &TurnContext<'_>,
        sender: &str,
        content: &str,
    ) -> Result<Option<Outgoing>> {
        tracing::debug!("Running command from '{}': {}", sender, content);
        let output = self.runner.run(content)?;
        Ok(Some(Outgoing {
            receiver: sender.to_string(),
            content: format!("Output: '{}', Errors: '{}'", output.stdout, output.stderr),
        }))
    }
}
