pub mod settings;

pub use settings::{
    LlmConfig, LoggingConfig, MarkerBackend, MarkerConfig, RunMode, ServerConfig, SessionConfig,
    Settings,
};
