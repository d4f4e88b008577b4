// Configuration management module
// TOML settings file in the application config directory, env override for secrets

pub mod settings;


pub use settings::{
    ChunkingConfig, Config, ConfigError, ContentConfig, OpenAiConfig, ServerConfig, SessionConfig,
    VectorConfig,
};

/// Get the default configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_config_dir()
}
