use super::*;
use tempfile::TempDir;

#[test]
fn defaults_are_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.chunking.max_tokens, 500);
    assert_eq!(config.chunking.overlap_tokens, 50);
    assert_eq!(config.openai.embedding_dimensions, 1536);
}

#[test]
fn load_missing_file_yields_defaults() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let config = Config::load(temp_dir.path()).expect("load succeeds without a config file");

    assert_eq!(config, Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    });
}

#[test]
fn save_and_reload_round_trip() {
    let temp_dir = TempDir::new().expect("can create temp dir");

    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.server.port = 9001;
    config.vector.collection_name = "physics_book".to_string();
    config.save().expect("can save config");

    let reloaded = Config::load(temp_dir.path()).expect("can reload config");
    assert_eq!(reloaded.server.port, 9001);
    assert_eq!(reloaded.vector.collection_name, "physics_book");
}

#[test]
fn partial_toml_fills_defaults() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[server]\nport = 8080\n",
    )
    .expect("can write config file");

    let config = Config::load(temp_dir.path()).expect("partial config loads");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.chunking.max_tokens, 500);
}

#[test]
fn rejects_zero_port() {
    let mut config = Config::default();
    config.server.port = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidPort(0))
    ));
}

#[test]
fn rejects_bad_embedding_dimension() {
    let mut config = Config::default();
    config.openai.embedding_dimensions = 10;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidEmbeddingDimension(10))
    ));
}

#[test]
fn rejects_bad_collection_name() {
    let mut config = Config::default();
    config.vector.collection_name = "My Book".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidCollectionName(_))
    ));
}

#[test]
fn rejects_overlap_at_or_above_max_tokens() {
    let mut config = Config::default();
    config.chunking.max_tokens = 100;
    config.chunking.overlap_tokens = 100;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OverlapTooLarge(100, 100))
    ));
}

#[test]
fn rejects_invalid_api_base() {
    let mut config = Config::default();
    config.openai.api_base = "not a url".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidUrl(_))
    ));
}

#[test]
fn config_file_key_falls_back_when_env_unset() {
    if std::env::var("OPENAI_API_KEY").is_ok() {
        return;
    }

    let config = Config {
        openai: OpenAiConfig {
            api_key: Some("file-key".to_string()),
            ..OpenAiConfig::default()
        },
        ..Config::default()
    };
    assert_eq!(config.resolved_api_key().as_deref(), Some("file-key"));
}
