//! FreeStream terminal front end

mod cli;

use anyhow::Result;
use cli::init::{InitConfig, InitResult};
use cli::output::Output;
use cli::{Cli, Commands};
use freestream::utils::toml_config::{FreestreamConfig, LogFormat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(config: &FreestreamConfig, verbose: bool) {
    let fallback = if verbose {
        "debug".to_string()
    } else {
        config.log.level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.log.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    if let Commands::Init {
        ref path,
        force,
        ref embedding,
    } = cli.command
    {
        return match cli::init::run(
            InitConfig {
                path: path.clone(),
                force,
                embedding: embedding.clone(),
            },
            &output,
        ) {
            InitResult::Success | InitResult::AlreadyExists => Ok(()),
            InitResult::Error(e) => Err(anyhow::anyhow!(e)),
        };
    }

    let config = cli::chat::load_config(&cli.config, &output)?;
    init_tracing(&config, cli.verbose);

    match cli.command {
        Commands::Chat { files, model } => cli::chat::run_chat(config, &files, &model, &output).await,
        Commands::Ask {
            files,
            question,
            model,
        } => cli::chat::run_ask(config, &files, &question, &model, &output).await,
        Commands::Models => {
            cli::chat::run_models(&config, &output);
            Ok(())
        }
        Commands::Config { validate } => cli::chat::run_config(&cli.config, validate, &output),
        Commands::Init { .. } => Ok(()),
    }
}
