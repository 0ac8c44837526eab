//! Configuration file integration tests

mod common;

use common::mocks::{MockEmbeddings, MockLLMClient, MockLLMFactory};
use common::{collect_answer, session_with, sky_files};
use freestream::utils::toml_config::{ConfigError, FreestreamConfig, SearchKind};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const CONFIG: &str = r#"
[rag]
chunk_size = 40
chunk_overlap = 10
top_k = 2
search = "mmr"
fetch_k = 6
mmr_lambda = 0.7
cache_enabled = false

[embedding]
type = "ollama"
model = "nomic-embed-text"
dimensions = 768

[providers.anthropic]
type = "anthropic"
api_key_env = "ANTHROPIC_API_KEY"

[[models]]
id = "Claude: Haiku"
provider = "anthropic"
model = "claude-3-haiku-20240307"

[[models]]
id = "Claude: Sonnet"
provider = "anthropic"
model = "claude-3-sonnet-20240229"
streaming = false

[session]
default_model = "Claude: Sonnet"
temperature = 0.2
"#;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("freestream.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_config_file() {
    let dir = TempDir::new().unwrap();
    let config = FreestreamConfig::load(write_config(&dir, CONFIG)).unwrap();

    assert_eq!(config.rag.chunk_size, 40);
    assert_eq!(config.rag.search, SearchKind::Mmr);
    assert!(!config.rag.cache_enabled);
    assert_eq!(config.models.len(), 2);
    assert!(!config.models[1].streaming);
    assert_eq!(config.session.default_model.as_deref(), Some("Claude: Sonnet"));
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    assert!(matches!(
        FreestreamConfig::load(&path),
        Err(ConfigError::FileNotFound(_))
    ));
    let config = FreestreamConfig::load_or_default(&path).unwrap();
    assert_eq!(config.models[0].id, "GPT-3.5 Turbo");
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let broken = CONFIG.replace("chunk_overlap = 10", "chunk_overlap = 40");
    let err = FreestreamConfig::load(write_config(&dir, &broken)).unwrap_err();
    assert!(err.to_string().contains("chunk_overlap"));

    let unknown_default = CONFIG.replace(
        "default_model = \"Claude: Sonnet\"",
        "default_model = \"GPT-4\"",
    );
    assert!(matches!(
        FreestreamConfig::from_toml(&unknown_default),
        Err(ConfigError::MissingModel(_))
    ));
}

#[test]
fn test_printed_config_parses_back() {
    let config = FreestreamConfig::from_toml(CONFIG).unwrap();
    let printed = toml::to_string_pretty(&config).unwrap();
    let reparsed = FreestreamConfig::from_toml(&printed).unwrap();

    assert_eq!(reparsed.models, config.models);
    assert_eq!(reparsed.rag.fetch_k, 6);
}

#[tokio::test]
async fn test_session_follows_config_file() {
    let config = FreestreamConfig::from_toml(CONFIG).unwrap();
    let factory = Arc::new(MockLLMFactory::new(MockLLMClient::non_streaming("Blue.")));
    let mut session = session_with(config, Arc::new(MockEmbeddings::new()), factory.clone()).await;

    assert_eq!(session.active_model().id, "Claude: Sonnet");
    assert!((session.temperature() - 0.2).abs() < f32::EPSILON);

    let report = session.upload_documents(sky_files()).await.unwrap();
    // 40-char windows with 10 overlap over two ~65-char texts
    assert!(report.chunks >= 4);
    assert_eq!(session.cache_stats().entry_count, 0);

    let events = collect_answer(&mut session, "What color is the sky?").await;
    match &events[0] {
        Ok(freestream::AskEvent::Citations(citations)) => assert_eq!(citations.len(), 2),
        other => panic!("expected citations, got {:?}", other),
    }
    assert_eq!(factory.requests()[0].0, "Claude: Sonnet");
}
