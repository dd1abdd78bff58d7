//! Configuration loading for Palaver.
#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Error;
use crate::protocol::SeedPolicy;

pub type Result<T> = std::result::Result<T, Error>;

/// Get the Palaver home directory (~/.palaver).
pub fn get_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".palaver"))
}

/// Get the settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

/// Load settings from ~/.palaver/settings.json
pub fn load_settings() -> Result<Settings> {
    let path = get_settings_path()?;

    if !path.exists() {
        return Err(Error::Config(format!(
            "Settings file not found at {}. Run 'palaver setup' first.",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(&path)?;
    let settings: Settings = serde_json::from_str(&content)?;
    validate_settings(&settings)?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Load settings or return default if not found.
pub fn load_settings_or_default() -> Settings {
    load_settings().unwrap_or_else(|e| {
        tracing::warn!("Failed to load settings: {}, using defaults", e);
        Settings::default()
    })
}

/// Write a default settings file, creating the home directory.
pub fn write_default_settings() -> Result<PathBuf> {
    let path = get_settings_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, serde_json::to_string_pretty(&Settings::default())?)?;
    Ok(path)
}

fn validate_settings(settings: &Settings) -> Result<()> {
    let names = &settings.participants;
    let all = [&names.user, &names.assistant, &names.shell];
    if all.iter().any(|name| name.is_empty()) {
        return Err(Error::Config(
            "participant names must not be empty".to_string(),
        ));
    }
    for (i, a) in all.iter().enumerate() {
        if all.iter().skip(i + 1).any(|b| b == a) {
            return Err(Error::Config(format!(
                "participant name '{a}' is used more than once"
            )));
        }
    }
    if settings.presenter.refresh_ms == 0 {
        return Err(Error::Config(
            "presenter.refresh_ms must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Participant naming.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ParticipantNames {
    #[serde(default = "default_user_name")]
    pub user: String,
    #[serde(default = "default_assistant_name")]
    pub assistant: String,
    #[serde(default = "default_shell_name")]
    pub shell: String,
}

fn default_user_name() -> String {
    "user".to_string()
}

fn default_assistant_name() -> String {
    "chatbot".to_string()
}

fn default_shell_name() -> String {
    "terminal".to_string()
}

impl Default for ParticipantNames {
    fn default() -> Self {
        Self {
            user: default_user_name(),
            assistant: default_assistant_name(),
            shell: default_shell_name(),
        }
    }
}

/// Transcript store configuration.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct TranscriptConfig {
    /// Store path; defaults to ~/.palaver/chat_log.xml.
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub seed: SeedPolicy,
}

impl TranscriptConfig {
    pub fn resolve_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => Ok(get_home_dir()?.join("chat_log.xml")),
        }
    }
}

/// Presentation loop configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PresenterConfig {
    /// Refresh cadence in milliseconds (~10 Hz by default).
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,
}

fn default_refresh_ms() -> u64 {
    100
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            refresh_ms: default_refresh_ms(),
        }
    }
}

/// Ollama endpoint configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

/// Palaver settings.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Settings {
    #[serde(default)]
    pub participants: ParticipantNames,

    #[serde(default)]
    pub transcript: TranscriptConfig,

    #[serde(default)]
    pub presenter: PresenterConfig,

    #[serde(default)]
    pub ollama: OllamaConfig,
}
