//! `chat`, `ask`, `models` and `config` commands

use anyhow::{Context, Result};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;

use freestream::chat::{AskEvent, ChatSession};
use freestream::loader::{FileKind, UploadedFile};
use freestream::rag::retriever::Citation;
use freestream::types::{AppError, Role};
use freestream::utils::toml_config::{FreestreamConfig, ModelConfig};

use super::output::Output;
use super::ModelArgs;

const REPL_HELP: &str = "/model ID, /models, /temperature T, /clear, /history, /help, /quit";

/// A parsed REPL input line
#[derive(Debug, PartialEq)]
enum ReplCommand<'a> {
    Ask(&'a str),
    Model(&'a str),
    Models,
    Temperature(&'a str),
    Clear,
    History,
    Help,
    Quit,
    Empty,
    Unknown(&'a str),
}

fn parse_line(line: &str) -> ReplCommand<'_> {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    if !line.starts_with('/') {
        return ReplCommand::Ask(line);
    }

    let (command, arg) = match line.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (line, ""),
    };
    match command {
        "/model" if !arg.is_empty() => ReplCommand::Model(arg),
        "/model" | "/models" => ReplCommand::Models,
        "/temperature" | "/temp" => ReplCommand::Temperature(arg),
        "/clear" => ReplCommand::Clear,
        "/history" => ReplCommand::History,
        "/help" => ReplCommand::Help,
        "/quit" | "/exit" => ReplCommand::Quit,
        other => ReplCommand::Unknown(other),
    }
}

pub fn load_config(path: &Path, output: &Output) -> Result<FreestreamConfig> {
    if !path.exists() {
        output.warning(&format!(
            "{} not found, using built-in defaults",
            path.display()
        ));
    }
    FreestreamConfig::load_or_default(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Build a session, apply model flags and upload `files`.
async fn open_session(
    config: FreestreamConfig,
    files: &[PathBuf],
    model: &ModelArgs,
    output: &Output,
) -> Result<ChatSession> {
    let mut uploads = Vec::with_capacity(files.len());
    for path in files {
        let name = path.display().to_string();
        if let Err(e) = FileKind::from_filename(&name) {
            output.skipped(&name, &e.to_string());
            continue;
        }
        match UploadedFile::from_path(path) {
            Ok(file) => uploads.push(file),
            Err(e) => output.skipped(&name, &e.to_string()),
        }
    }
    if uploads.is_empty() {
        anyhow::bail!(
            "No readable documents. Supported types: {}",
            FileKind::SUPPORTED.join(", ")
        );
    }

    let mut session = ChatSession::new(config)
        .await
        .context("Failed to start chat session")?;

    if let Some(ref id) = model.model {
        session.select_model(id)?;
    }
    if let Some(temperature) = model.temperature {
        session.set_temperature(temperature)?;
    }

    let report = session.upload_documents(uploads).await?;
    for failure in &report.failures {
        output.app_error(failure);
    }
    for document in &report.documents {
        output.success(&format!(
            "{} ({}, {} chars)",
            document.filename, document.kind, document.chars
        ));
    }
    output.info(&format!(
        "Indexed {} chunks ({} cached embeddings reused)",
        report.chunks, report.cache.hits
    ));

    if let Err(e) = session.persist_cache().await {
        output.warning(&format!("Could not save embedding cache: {}", e));
    }

    Ok(session)
}

/// Stream one answer to stdout. Sources are listed after the answer.
async fn answer(
    session: &mut ChatSession,
    question: &str,
    output: &Output,
) -> std::result::Result<(), AppError> {
    let model = session.active_model().id.clone();
    let mut citations: Vec<Citation> = Vec::new();
    let mut started = false;

    let stream = session.ask(question);
    futures::pin_mut!(stream);
    while let Some(event) = stream.next().await {
        match event {
            Ok(AskEvent::Citations(sources)) => citations = sources,
            Ok(AskEvent::Token(text)) => {
                if !started {
                    output.answer_label(&model);
                    started = true;
                }
                output.token(&text);
            }
            Err(e) => {
                if started {
                    output.newline();
                }
                error!(kind = e.kind(), component = e.component(), error = %e, "Turn failed");
                return Err(e);
            }
        }
    }

    output.newline();
    output.citations(&citations);
    Ok(())
}

pub async fn run_ask(
    config: FreestreamConfig,
    files: &[PathBuf],
    question: &str,
    model: &ModelArgs,
    output: &Output,
) -> Result<()> {
    let mut session = open_session(config, files, model, output).await?;
    output.newline();
    if let Err(e) = answer(&mut session, question, output).await {
        output.app_error(&e);
        return Err(e.into());
    }
    Ok(())
}

pub async fn run_chat(
    config: FreestreamConfig,
    files: &[PathBuf],
    model: &ModelArgs,
    output: &Output,
) -> Result<()> {
    output.banner();
    let mut session = open_session(config, files, model, output).await?;
    output.info(&format!(
        "Model: {} (temperature {:.2})",
        session.active_model().id,
        session.temperature()
    ));
    output.hint(&format!("Commands: {}", REPL_HELP));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        output.prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_line(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => output.info(REPL_HELP),
            ReplCommand::Ask(question) => {
                if let Err(e) = answer(&mut session, question, output).await {
                    output.app_error(&e);
                }
            }
            ReplCommand::Model(id) => match session.select_model(id) {
                Ok(model) => output.success(&format!("Now using {}", model.id)),
                Err(e) => output.app_error(&e),
            },
            ReplCommand::Models => {
                print_models(session.models(), &session.active_model().id, output)
            }
            ReplCommand::Temperature(value) => match value.parse::<f32>() {
                Ok(t) => match session.set_temperature(t) {
                    Ok(()) => output.success(&format!("Temperature set to {:.2}", t)),
                    Err(e) => output.app_error(&e),
                },
                Err(_) if value.is_empty() => {
                    output.info(&format!("Temperature: {:.2}", session.temperature()))
                }
                Err(_) => output.warning(&format!("'{}' is not a number", value)),
            },
            ReplCommand::Clear => {
                session.clear_history();
                output.success("Chat history cleared");
            }
            ReplCommand::History => {
                if session.history().is_empty() {
                    output.info("No messages yet");
                }
                for turn in session.history() {
                    let who = match turn.role {
                        Role::User => "you",
                        Role::Assistant => "assistant",
                    };
                    output.kv(who, &turn.content);
                }
            }
            ReplCommand::Unknown(command) => {
                output.warning(&format!("Unknown command {}. Try /help", command))
            }
        }
    }

    session.persist_cache().await?;
    Ok(())
}

fn print_models(models: &[ModelConfig], active: &str, output: &Output) {
    output.header("Models");
    output.table_header(&["Model", "Provider", "Streaming"]);
    for model in models {
        let name = if model.id == active {
            format!("{} *", model.id)
        } else {
            model.id.clone()
        };
        let streaming = if model.streaming { "yes" } else { "no" };
        output.table_row(&[&name, &model.provider, streaming]);
    }
}

pub fn run_models(config: &FreestreamConfig, output: &Output) {
    let active = config
        .session
        .default_model
        .clone()
        .or_else(|| config.models.first().map(|m| m.id.clone()))
        .unwrap_or_default();
    print_models(&config.models, &active, output);
}

pub fn run_config(config_path: &Path, validate: bool, output: &Output) -> Result<()> {
    let config = FreestreamConfig::load(config_path)
        .with_context(|| format!("Invalid configuration: {}", config_path.display()))?;

    if validate {
        output.success(&format!("{} is valid", config_path.display()));
        return Ok(());
    }

    output.header("Configuration");
    output.kv("file", &config_path.display().to_string());
    output.kv("models", &config.models.len().to_string());
    for (name, provider) in &config.providers {
        let key_state = if FreestreamConfig::resolve_env(provider.api_key_env()).is_ok() {
            "set"
        } else {
            "missing"
        };
        output.kv(
            &format!("provider {}", name),
            &format!("{} ({} {})", provider.kind(), provider.api_key_env(), key_state),
        );
    }
    output.newline();
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("What color is the sky?", ReplCommand::Ask("What color is the sky?"))]
    #[case("   ", ReplCommand::Empty)]
    #[case("/model Claude: Haiku", ReplCommand::Model("Claude: Haiku"))]
    #[case("/model", ReplCommand::Models)]
    #[case("/models", ReplCommand::Models)]
    #[case("/temperature 0.4", ReplCommand::Temperature("0.4"))]
    #[case("/clear", ReplCommand::Clear)]
    #[case("/history", ReplCommand::History)]
    #[case("/exit", ReplCommand::Quit)]
    #[case("/bogus", ReplCommand::Unknown("/bogus"))]
    fn test_parse_line(#[case] line: &str, #[case] expected: ReplCommand<'static>) {
        assert_eq!(parse_line(line), expected);
    }

    #[test]
    fn test_load_missing_config_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = load_config(&dir.path().join("missing.toml"), &Output::no_color()).unwrap();
        assert_eq!(config.models.len(), 4);
    }
}
