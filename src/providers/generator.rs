//! Generative-text collaborator contract.

use std::sync::mpsc;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, GeneratorError>;

/// A source of lazily generated text increments.
///
/// Implementations push chunks into `tx` as they arrive and signal end of
/// stream by returning (the sender is dropped with the call frame). The
/// sequence is finite and non-restartable.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generator name, for logs.
    fn name(&self) -> &str;

    /// Check whether the backing service is reachable.
    async fn is_available(&self) -> bool;

    /// Stream completion chunks for `prompt` into `tx` until done.
    async fn generate(&self, prompt: &str, tx: mpsc::Sender<String>) -> Result<()>;
}

/// Blocking view of one in-flight generation, consumed chunk by chunk.
///
/// Yields `Ok` per chunk. A generation that fails mid-stream yields the
/// failure as the final `Err` item; consumers must not treat the chunks
/// before it as a complete sequence. A clean end of stream simply ends
/// iteration.
pub struct ChunkStream {
    rx: mpsc::Receiver<String>,
    outcome: mpsc::Receiver<GeneratorError>,
}

impl Iterator for ChunkStream {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Result<String>> {
        match self.rx.recv() {
            Ok(chunk) => Some(Ok(chunk)),
            // Chunk sender dropped: the generate call has returned (or is
            // about to); block for its verdict.
            Err(_) => self.outcome.recv().ok().map(Err),
        }
    }
}

/// Start a generation on the async runtime and hand back a blocking chunk
/// stream. This is the bridge between the synchronous dispatch chain and
/// the async generator collaborator.
pub fn spawn_stream(
    generator: Arc<dyn Generator>,
    handle: &tokio::runtime::Handle,
    prompt: String,
) -> ChunkStream {
    let (tx, rx) = mpsc::channel();
    let (outcome_tx, outcome_rx) = mpsc::channel();
    handle.spawn(async move {
        if let Err(e) = generator.generate(&prompt, tx).await {
            tracing::warn!("Generator '{}' stream failed: {}", generator.name(), e);
            let _ = outcome_tx.send(e);
        }
    });
    ChunkStream {
        rx,
        outcome: outcome_rx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Generator that replays a fixed chunk script, then optionally fails.
    pub(crate) struct ScriptedGenerator {
        pub chunks: Vec<String>,
        pub failure: Option<String>,
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn generate(&self, _prompt: &str, tx: mpsc::Sender<String>) -> Result<()> {
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

    #[test]
    fn test_chunk_stream_ends_on_completion() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let generator = Arc::new(ScriptedGenerator {
            chunks: vec!["a".to_string(), "b".to_string()],
            failure: None,
        });

        let stream = spawn_stream(generator, runtime.handle(), "prompt".to_string());
        let collected: Vec<String> = stream.map(|item| item.unwrap()).collect();
        assert_eq!(collected, vec!["a", "b"]);
    }

    #[test]
    fn test_chunk_stream_yields_midstream_failure_last() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let generator = Arc::new(ScriptedGenerator {
            chunks: vec!["partial".to_string()],
            failure: Some("connection reset".to_string()),
        });

        let mut stream = spawn_stream(generator, runtime.handle(), "prompt".to_string());
        assert_eq!(stream.next().unwrap().unwrap(), "partial");
        let failure = stream.next().unwrap();
        assert!(matches!(failure, Err(GeneratorError::ApiError(_))));
        assert!(stream.next().is_none());
    }
}
