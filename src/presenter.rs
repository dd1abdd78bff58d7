//! Terminal presentation loop.
//!
//! A plain-text renderer: polls the transcript and each participant's
//! unsent draft a few times a second and prints what changed. Drafts with
//! unresolved fields get a spinner glyph in place of the missing part.
//! Rendering never touches dispatch state beyond read-only peeks; the only
//! write path out of here is the interactive input gate.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::core::{InputGate, ShutdownFlag};
use crate::protocol::{ClientDirectory, Message, Transcript};

const SPINNER: [char; 4] = ['◴', '◷', '◶', '◵'];
const NAME_WIDTH: usize = 10;

/// Pad or truncate to exactly `length` characters.
fn pad(text: &str, length: usize) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    chars.truncate(length);
    while chars.len() < length {
        chars.push(' ');
    }
    chars.into_iter().collect()
}

/// Render one transcript entry. Absent addressing renders as `system`,
/// which only ever appears on dispatch-generated notices.
pub fn format_message(message: &Message, tick: usize) -> String {
    let spin = SPINNER[tick % SPINNER.len()].to_string();
    let sender = message.sender.as_deref().unwrap_or("system");
    let receiver = match &message.receiver {
        Some(name) => pad(name, NAME_WIDTH),
        None => pad(&spin, NAME_WIDTH),
    };
    let content = message.content.as_deref().unwrap_or(&spin);
    format!("[{} => {}]: {}", pad(sender, NAME_WIDTH), receiver, content)
}

/// Live view over the shared chat state, printed to stdout.
pub struct Presenter {
    directory: Arc<ClientDirectory>,
    transcript: Arc<Transcript>,
    gate: Arc<InputGate>,
    shutdown: ShutdownFlag,
    refresh: Duration,
    user_name: String,
}

impl Presenter {
    pub fn new(
        directory: Arc<ClientDirectory>,
        transcript: Arc<Transcript>,
        gate: Arc<InputGate>,
        shutdown: ShutdownFlag,
        refresh_ms: u64,
        user_name: &str,
    ) -> Self {
        Self {
            directory,
            transcript,
            gate,
            shutdown,
            refresh: Duration::from_millis(refresh_ms),
            user_name: user_name.to_string(),
        }
    }

    /// Poll until shutdown. Printed transcript lines are final; the line
    /// below them is rewritten in place each tick with the busiest live
    /// draft or the input prompt.
    pub fn run(&self) {
        let mut printed = 0usize;
        let mut tick = 0usize;
        let mut status_len = 0usize;
        let mut stdout = io::stdout();

        while !self.shutdown.is_set() {
            tick = tick.wrapping_add(1);

            let messages = self.transcript.snapshot();
            if messages.len() > printed {
                clear_status(&mut stdout, &mut status_len);
                for message in &messages[printed..] {
                    let _ = writeln!(stdout, "{}", format_message(message, tick));
                }
                printed = messages.len();
            }

            let status = if self.gate.is_open() {
                format!("You ({}): ", self.user_name)
            } else {
                self.live_draft(tick)
                    .unwrap_or_else(|| format!("{} waiting", SPINNER[tick % SPINNER.len()]))
            };
            rewrite_status(&mut stdout, &mut status_len, &status);

            thread::sleep(self.refresh);
        }
        clear_status(&mut stdout, &mut status_len);
        let _ = stdout.flush();
    }

    // The most recently staged unsent draft, skipping the user's own
    // (their typing is echoed by the input prompt instead).
    fn live_draft(&self, tick: usize) -> Option<String> {
        for participant in self.directory.participants() {
            if participant.name() == self.user_name {
                continue;
            }
            if let Some(draft) = participant.mailbox().peek_unsent() {
                let preview = Message {
                    sender: Some(participant.name().to_string()),
                    receiver: draft.receiver,
                    content: Some(draft.content),
                };
                return Some(format_message(&preview, tick));
            }
        }
        None
    }
}

fn rewrite_status(stdout: &mut io::Stdout, status_len: &mut usize, status: &str) {
    let width = status.chars().count();
    let erase = status_len.saturating_sub(width);
    let _ = write!(stdout, "\r{}{}\r{}", status, " ".repeat(erase), status);
    let _ = stdout.flush();
    *status_len = width;
}

fn clear_status(stdout: &mut io::Stdout, status_len: &mut usize) {
    if *status_len > 0 {
        let _ = write!(stdout, "\r{}\r", " ".repeat(*status_len));
        let _ = stdout.flush();
        *status_len = 0;
    }
}

/// Read stdin lines and feed them to the interactive gate.
///
/// `/quit` or end of input requests shutdown. Detached on purpose: a read
/// blocked on stdin cannot be joined, so the session lets it die with the
/// process.
pub fn spawn_input_thread(gate: Arc<InputGate>, shutdown: ShutdownFlag) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let text = line.trim_end_matches(|c| c == '\n' || c == '\r');
            if shutdown.is_set() {
                break;
            }
            if text == "/quit" {
                break;
            }
            if gate.is_open() {
                gate.submit(text.to_string());
            }
        }
        tracing::info!("Input closed, requesting shutdown");
        shutdown.set();
        gate.shutdown();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_truncates_and_fills() {
        assert_eq!(pad("chatbot", 10), "chatbot   ");
        assert_eq!(pad("a-very-long-name", 10), "a-very-lon");
        assert_eq!(pad("", 3), "   ");
    }

    #[test]
    fn test_format_resolved_message() {
        let message = Message::new(
            Some("user".to_string()),
            Some("chatbot".to_string()),
            Some("hello".to_string()),
        );
        assert_eq!(
            format_message(&message, 0),
            "[user       => chatbot   ]: hello"
        );
    }

    #[test]
    fn test_format_unresolved_fields_use_spinner() {
        let rendered = format_message(&Message::placeholder(), 1);
        assert!(rendered.starts_with("[system     => "));
        assert!(rendered.contains(SPINNER[1]));
    }
}
