use anyhow::{bail, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Environment variables checked for the hosted model credential, in order.
pub const API_KEY_VARS: [&str; 3] = ["HUGGINGFACEHUB_API_TOKEN", "HF_TOKEN", "HF_API_TOKEN"];

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub marker: MarkerConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub mode: RunMode,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Development,
    Production,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub max_age_secs: u64,
    /// Agents untouched for this long are dropped by the sweeper
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MarkerBackend {
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MarkerConfig {
    pub backend: MarkerBackend,
    pub redis_url: String,
    pub key_prefix: String,
    pub ttl_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    pub timeout_seconds: u64,
    pub max_tokens: usize,
    pub temperature: f32,
    pub max_history_messages: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PromptsConfig {
    /// Overrides the built-in task classification prompt
    pub system_prompt: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct LoggingConfig {
    pub json: bool,
}

impl Settings {
    /// Load settings from `.env`, `config/settings.*` and `APP__*` variables.
    ///
    /// Fails when no model credential can be found; the server must not start
    /// without one.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 7860)?
            .set_default("server.mode", "development")?
            .set_default("session.cookie_name", "gm_session")?
            .set_default("session.max_age_secs", 60 * 60 * 24)?
            .set_default("session.idle_timeout_secs", 60 * 60 * 24)?
            .set_default("session.sweep_interval_secs", 60 * 10)?
            .set_default("marker.backend", "memory")?
            .set_default("marker.redis_url", "redis://127.0.0.1:6379")?
            .set_default("marker.key_prefix", "chat_session_")?
            .set_default("marker.ttl_secs", 60 * 60 * 24)?
            .set_default("llm.base_url", "https://router.huggingface.co/v1")?
            .set_default("llm.model", "openai/gpt-oss-safeguard-20b")?
            .set_default("llm.timeout_seconds", 120)?
            .set_default("llm.max_tokens", 512)?
            .set_default("llm.temperature", 0.0)?
            .set_default("llm.max_history_messages", 20)?
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.port", std::env::var("PORT").ok())?
            .build()?;

        let mut settings: Settings = config.try_deserialize()?;

        settings.llm.api_key = match resolve_api_key(|name| std::env::var(name).ok(), &settings.llm.api_key) {
            Some(key) => key,
            None => bail!(
                "model API token not found; set one of {} (or APP__LLM__API_KEY)",
                API_KEY_VARS.join(", ")
            ),
        };

        Ok(settings)
    }

    pub fn is_production(&self) -> bool {
        self.server.mode == RunMode::Production
    }
}

/// First non-blank credential among [`API_KEY_VARS`], then the configured value.
pub fn resolve_api_key<F>(lookup: F, configured: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    API_KEY_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .chain(std::iter::once(configured.to_string()))
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
}
