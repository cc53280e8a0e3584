use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use maitri::Config;
use maitri::api::ApiServerBuilder;
use maitri::providers::OpenRouterClient;

/// MAITRI - Emotion-aware voice assistant for crew support
#[derive(Parser)]
#[command(name = "maitri", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the chat/report gateway (default)
    Serve {
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run an interactive assistant session in the terminal
    Console {
        /// Gateway base URL
        #[arg(long)]
        gateway: Option<String>,

        /// Recorded face detection log to replay as the camera
        #[arg(long)]
        face_log: Option<PathBuf>,

        /// Labeled reference descriptors (JSON)
        #[arg(long)]
        face_references: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,maitri=info",
        1 => "info,maitri=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
        Command::Console {
            gateway,
            face_log,
            face_references,
        } => {
            if let Some(gateway) = gateway {
                config.assistant.gateway_url = gateway.trim_end_matches('/').to_string();
            }
            if face_log.is_some() {
                config.assistant.face_log = face_log;
            }
            if face_references.is_some() {
                config.assistant.face_references = face_references;
            }
            maitri::console::run(&config.assistant).await?;
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let upstream = OpenRouterClient::new(&config.upstream)?;

    tracing::info!(
        port = config.server.port,
        model = upstream.model(),
        "starting MAITRI gateway"
    );

    let server = ApiServerBuilder::new(Arc::new(upstream), config.server.port)
        .rate_limit(config.server.rate_limit_rpm)
        .build();

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    Ok(())
}
