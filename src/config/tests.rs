use super::*;
use tempfile::TempDir;

#[test]
fn defaults_when_file_missing() {
    let dir = TempDir::new().expect("can create temp dir");
    let config = Config::load(dir.path()).expect("can load default config");

    assert_eq!(config.embedding, EmbeddingConfig::default());
    assert_eq!(config.sources, SourceHttpConfig::default());
    assert_eq!(config.base_dir, dir.path());
}

#[test]
fn save_and_reload_round_trip() {
    let dir = TempDir::new().expect("can create temp dir");
    let mut config = Config::load(dir.path()).expect("can load default config");
    config.embedding.host = "embeddings.internal".to_string();
    config.embedding.dimension = 512;
    config.sources.rate_limit_ms = 500;
    config.save().expect("can save config");

    let reloaded = Config::load(dir.path()).expect("can reload config");
    assert_eq!(reloaded.embedding.host, "embeddings.internal");
    assert_eq!(reloaded.embedding.dimension, 512);
    assert_eq!(reloaded.sources.rate_limit_ms, 500);
}

#[test]
fn rejects_invalid_protocol() {
    let config = EmbeddingConfig {
        protocol: "ftp".to_string(),
        ..EmbeddingConfig::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));
}

#[test]
fn rejects_out_of_range_dimension() {
    let config = EmbeddingConfig {
        dimension: 10,
        ..EmbeddingConfig::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidDimension(10))
    ));
}

#[test]
fn rejects_zero_retry_budget() {
    let dir = TempDir::new().expect("can create temp dir");
    let mut config = Config::load(dir.path()).expect("can load default config");
    config.sources.max_retries = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidRetryBudget(0))
    ));
}

#[test]
fn derived_paths_live_under_base_dir() {
    let dir = TempDir::new().expect("can create temp dir");
    let config = Config::load(dir.path()).expect("can load default config");
    assert!(config.database_path().starts_with(dir.path()));
    assert!(config.vector_database_path().starts_with(dir.path()));
}
