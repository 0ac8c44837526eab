//! CLI module for FreeStream
//!
//! Provides command-line interface parsing and handling for the freestream binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod chat;
pub mod init;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// FreeStream RAGbot - ask your documents questions
///
/// Upload PDF, Word or text files, then chat with OpenAI, Anthropic or
/// Gemini models grounded in their contents.
#[derive(Parser, Debug)]
#[command(
    name = "freestream",
    version,
    about = "FreeStream RAGbot - ask your documents questions",
    long_about = "Upload PDF, Word or text files, then chat with OpenAI, Anthropic or Gemini\n\
                  models grounded in their contents. Answers stream as they are generated\n\
                  and cite the passages they were based on.",
    after_help = "EXAMPLES:\n    \
                  freestream init                                  # Write freestream.toml\n    \
                  freestream chat report.pdf notes.txt             # Interactive chat\n    \
                  freestream ask notes.txt -q \"What is the deadline?\"\n    \
                  freestream models                                # List models"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "freestream.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a commented freestream.toml and .env.example
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files without prompting
        #[arg(short, long)]
        force: bool,

        /// Embedding backend to configure (openai, ollama or local)
        #[arg(long, default_value = "openai", value_parser = ["openai", "ollama", "local"])]
        embedding: String,
    },

    /// Upload documents and start an interactive chat
    Chat {
        /// Documents to upload (pdf, doc, docx, txt)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Ask a single question about documents
    Ask {
        /// Documents to upload (pdf, doc, docx, txt)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// The question to answer
        #[arg(short, long)]
        question: String,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// List the configured models
    Models,

    /// Show configuration information
    Config {
        /// Only validate the configuration file
        #[arg(long)]
        validate: bool,
    },
}

/// Model selection shared by `chat` and `ask`
#[derive(clap::Args, Debug, Clone)]
pub struct ModelArgs {
    /// Model to use, by catalogue id (see `freestream models`)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Sampling temperature between 0 and 1
    #[arg(short, long)]
    pub temperature: Option<f32>,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
