//! External generative-text collaborators.

pub mod generator;
pub mod ollama;

pub use generator::{spawn_stream, ChunkStream, Generator, GeneratorError};
pub use ollama::OllamaGenerator;
