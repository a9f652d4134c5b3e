use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_PERSONA: &str =
    "אתה נציג שירות של חברת המשלוחים 'A.B Deliveries'. דבר בעברית בלבד, בנימוס ובמקצועיות.";

pub const DEFAULT_FALLBACK_REPLY: &str = "נראה שהמערכת עמוסה כרגע. נציג יחזור אליך בהקדם 💬";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub user_service: UserServiceConfig,
    pub log: LogConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_ms: u64,
    pub persona: String,
    pub fallback_reply: String,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 512,
            temperature: 0.7,
            timeout_ms: 30_000,
            persona: DEFAULT_PERSONA.to_string(),
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserServiceConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for UserServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    /// Resolve settings from built-in defaults, `config/{CONFIG_ENV}` and
    /// `APP__*` environment variables, in increasing priority.
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());
        let llm = LLMConfig::default();
        let user_service = UserServiceConfig::default();

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 4000)?
            .set_default("llm.base_url", llm.base_url)?
            .set_default("llm.model", llm.model)?
            .set_default("llm.max_tokens", llm.max_tokens)?
            .set_default("llm.temperature", f64::from(llm.temperature))?
            .set_default("llm.timeout_ms", llm.timeout_ms)?
            .set_default("llm.persona", llm.persona)?
            .set_default("llm.fallback_reply", llm.fallback_reply)?
            .set_default("user_service.base_url", user_service.base_url)?
            .set_default("user_service.timeout_ms", user_service.timeout_ms)?
            .set_default("log.path", "server-node/conversations.csv")?
            .set_default("logging.level", "info")?
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Completion provider credential. A missing or blank key is reported
    /// by the completion client when it is first used.
    pub fn api_key() -> Option<String> {
        env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}
