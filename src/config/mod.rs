mod settings;

pub use settings::{
    LLMConfig, LogConfig, LoggingConfig, ServerConfig, Settings, UserServiceConfig,
    DEFAULT_FALLBACK_REPLY, DEFAULT_PERSONA,
};
