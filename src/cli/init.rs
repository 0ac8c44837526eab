//! Init command implementation
//!
//! Writes a commented `freestream.toml`, a `.env.example` listing the API key
//! variables, and a `.gitignore` entry for the embedding cache.

use super::output::Output;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug)]
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// freestream.toml already exists
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// Embedding backend to configure (openai, ollama or local)
    pub embedding: String,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing FreeStream");

    let base_path = &config.path;
    if !base_path.exists() {
        if let Err(e) = fs::create_dir_all(base_path) {
            output.error(&format!("Failed to create {}: {}", base_path.display(), e));
            return InitResult::Error(e.to_string());
        }
    }

    let config_path = base_path.join("freestream.toml");
    if config_path.exists() && !config.force {
        output.warning("freestream.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    let toml_content = generate_freestream_toml(&config.embedding);
    if let Err(e) = write_file(&config_path, &toml_content, config.force) {
        output.error(&format!("Failed to create freestream.toml: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", "freestream.toml");

    let env_example_path = base_path.join(".env.example");
    if env_example_path.exists() && !config.force {
        output.skipped(".env.example", "already exists");
    } else if let Err(e) = write_file(&env_example_path, generate_env_example(), config.force) {
        output.error(&format!("Failed to create .env.example: {}", e));
        return InitResult::Error(e.to_string());
    } else {
        output.created("env", ".env.example");
    }

    let gitignore_path = base_path.join(".gitignore");
    if gitignore_path.exists() {
        output.skipped(".gitignore", "already exists");
    } else if let Err(e) = write_file(&gitignore_path, generate_gitignore(), false) {
        output.warning(&format!("Failed to create .gitignore: {}", e));
    } else {
        output.created("file", ".gitignore");
    }

    output.header("Next Steps");
    output.info("1. Set your API keys:");
    output.command("cp .env.example .env");
    output.info("2. Chat with your documents:");
    output.command("freestream chat report.pdf notes.txt");
    output.hint("Run `freestream models` to list the available models");

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(());
    }
    fs::write(path, content)
}

fn embedding_section(embedding: &str) -> &'static str {
    match embedding {
        "ollama" => {
            r#"# Ollama embeddings (no API key required)
[embedding]
type = "ollama"
base_url = "http://localhost:11434"
model = "nomic-embed-text"
dimensions = 768
"#
        }
        "local" => {
            r#"# Local all-MiniLM-L6-v2 (build with --features local-embeddings)
[embedding]
type = "local"
"#
        }
        _ => {
            r#"# OpenAI embeddings (set OPENAI_API_KEY in .env)
[embedding]
type = "openai"
model = "text-embedding-3-small"
dimensions = 1536
api_key_env = "OPENAI_API_KEY"
max_retries = 3
timeout_secs = 30
"#
        }
    }
}

fn generate_freestream_toml(embedding: &str) -> String {
    format!(
        r#"# FreeStream configuration
# ========================

[log]
level = "info"        # overridden by RUST_LOG
format = "pretty"     # or "json"

[rag]
chunk_size = 1500     # characters per chunk
chunk_overlap = 200   # characters shared by neighbouring chunks
top_k = 4             # passages retrieved per question
search = "similarity" # or "mmr" for more diverse passages
fetch_k = 20          # mmr candidate pool
mmr_lambda = 0.5      # 1.0 = pure relevance, 0.0 = pure diversity
condense_question = false
embedding_concurrency = 4
embedding_batch_size = 32
cache_enabled = true
cache_path = ".freestream/embeddings.json"

{embedding}
# Chat providers. API keys are read from the named environment variables.
[providers.openai]
type = "openai"
api_key_env = "OPENAI_API_KEY"
api_base = "https://api.openai.com/v1"

[providers.anthropic]
type = "anthropic"
api_key_env = "ANTHROPIC_API_KEY"
api_base = "https://api.anthropic.com"

[providers.gemini]
type = "gemini"
api_key_env = "GOOGLE_API_KEY"
api_base = "https://generativelanguage.googleapis.com"

# Models, in the order they are listed
[[models]]
id = "GPT-3.5 Turbo"
provider = "openai"
model = "gpt-3.5-turbo-0125"
max_tokens = 4096
max_retries = 1

[[models]]
id = "Claude: Haiku"
provider = "anthropic"
model = "claude-3-haiku-20240307"

[[models]]
id = "Claude: Sonnet"
provider = "anthropic"
model = "claude-3-sonnet-20240229"

[[models]]
id = "Gemini-Pro"
provider = "gemini"
model = "gemini-pro"
streaming = false
top_k = 50
top_p = 0.7

[session]
default_model = "GPT-3.5 Turbo"
temperature = 0.0
"#,
        embedding = embedding_section(embedding)
    )
}

fn generate_env_example() -> &'static str {
    r#"# FreeStream environment variables
# Copy this file to .env and fill in the keys for the models you use.

OPENAI_API_KEY=sk-...
ANTHROPIC_API_KEY=sk-ant-...
GOOGLE_API_KEY=...

# Optional: logging level (trace, debug, info, warn, error)
RUST_LOG=info,freestream=debug
"#
}

fn generate_gitignore() -> &'static str {
    r#"# FreeStream
/.freestream/
.env
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use freestream::utils::toml_config::{EmbeddingConfig, FreestreamConfig};
    use rstest::rstest;
    use tempfile::TempDir;

    fn init_config(temp_dir: &TempDir, force: bool) -> InitConfig {
        InitConfig {
            path: temp_dir.path().to_path_buf(),
            force,
            embedding: "openai".to_string(),
        }
    }

    #[rstest]
    #[case("openai")]
    #[case("ollama")]
    #[case("local")]
    fn test_generated_config_is_valid(#[case] embedding: &str) {
        let config = FreestreamConfig::from_toml(&generate_freestream_toml(embedding)).unwrap();
        assert_eq!(config.models.len(), 4);
        assert_eq!(config.rag.chunk_size, 1500);
        let kind = match config.embedding {
            EmbeddingConfig::OpenAI { .. } => "openai",
            EmbeddingConfig::Ollama { .. } => "ollama",
            EmbeddingConfig::Local => "local",
        };
        assert_eq!(kind, embedding);
    }

    #[test]
    fn test_write_file_skips_existing_without_force() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let file_path = temp_dir.path().join("test.txt");
        fs::write(&file_path, "original").expect("Failed to write");

        write_file(&file_path, "new content", false).unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "original");

        write_file(&file_path, "new content", true).unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "new content");
    }

    #[test]
    fn test_run_creates_all_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let result = run(init_config(&temp_dir, false), &Output::no_color());

        assert!(matches!(result, InitResult::Success));
        assert!(temp_dir.path().join("freestream.toml").exists());
        assert!(temp_dir.path().join(".env.example").exists());
        let gitignore = fs::read_to_string(temp_dir.path().join(".gitignore")).unwrap();
        assert!(gitignore.contains(".freestream"));
    }

    #[test]
    fn test_run_already_exists_without_force() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("freestream.toml"), "existing").expect("Failed to write");

        let result = run(init_config(&temp_dir, false), &Output::no_color());
        assert!(matches!(result, InitResult::AlreadyExists));
    }

    #[test]
    fn test_run_force_overwrites() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("freestream.toml"), "existing").expect("Failed to write");

        let result = run(init_config(&temp_dir, true), &Output::no_color());
        assert!(matches!(result, InitResult::Success));

        let content = fs::read_to_string(temp_dir.path().join("freestream.toml")).unwrap();
        assert!(content.contains("[rag]"));
        assert!(!content.contains("existing"));
    }
}
