use agendum_provider::ProviderConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct MainConfig {
    pub telegram: TelegramConfig,
    pub provider: ProviderConfig,
    pub google: GoogleConfig,
    #[serde(default)]
    pub agent: AgentSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default = "default_max_conversations")]
    pub max_conversations: usize,
    #[serde(default = "default_max_turns")]
    pub max_turns_per_chat: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            max_conversations: default_max_conversations(),
            max_turns_per_chat: default_max_turns(),
        }
    }
}

fn default_callback_port() -> u16 {
    8060
}

fn default_token_file() -> PathBuf {
    PathBuf::from("token.json")
}

fn default_history_window() -> usize {
    10
}

fn default_max_conversations() -> usize {
    1024
}

fn default_max_turns() -> usize {
    256
}

pub fn load_config(path: &Path) -> Result<MainConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
}
