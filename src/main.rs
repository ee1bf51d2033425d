use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use relaymesh::broker::{Broker, MemoryMedium, Medium, RedisMedium};
use relaymesh::client::{run_client, run_stress};
use relaymesh::config::{MediumKind, Settings, load_config};
use relaymesh::transport::start_websocket_server;
use relaymesh::utils::error::ServerError;
use relaymesh::utils::logging;

#[derive(Parser)]
#[command(name = "relaymesh", version, about = "Distributed WebSocket message relay")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a relay node (the default).
    Server,
    /// Connect, send one message and print what comes back.
    Client {
        #[arg(long)]
        url: String,
        /// Recipient id; defaults to our own id.
        #[arg(long)]
        to: Option<Uuid>,
        #[arg(long, default_value = "hello")]
        text: String,
    },
    /// Open many connections that message each other until Ctrl-C.
    Stress {
        #[arg(long)]
        url: String,
        #[arg(long, default_value_t = 10)]
        connections: usize,
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&settings.log.level);

    let result = match cli.command.unwrap_or(Command::Server) {
        Command::Server => serve(settings).await,
        Command::Client { url, to, text } => run_client(&url, to, &text)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string()),
        Command::Stress {
            url,
            connections,
            interval_ms,
        } => {
            let shutdown = cancel_on_ctrl_c();
            run_stress(&url, connections, Duration::from_millis(interval_ms), shutdown)
                .await
                .map(|report| println!("{report:?}"))
                .map_err(|e| e.to_string())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(settings: Settings) -> Result<(), String> {
    let medium: Arc<dyn Medium> = match settings.broker.medium {
        MediumKind::Redis => Arc::new(
            RedisMedium::connect(&settings.broker.redis_url)
                .await
                .map_err(|e| ServerError::from(e).to_string())?,
        ),
        MediumKind::Memory => Arc::new(MemoryMedium::new()),
    };
    let broker = Arc::new(Broker::new(medium, settings.broker.channel_prefix.clone()));

    let shutdown = cancel_on_ctrl_c();
    start_websocket_server(settings, broker, shutdown)
        .await
        .map_err(|e| e.to_string())?;
    info!("server stopped");
    Ok(())
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
        }
        trigger.cancel();
    });
    token
}
