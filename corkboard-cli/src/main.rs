mod replay;
mod script;

use clap::{Parser, Subcommand};
use corkboard::MemoryBackend;
use corkboard_remote::{RemoteBackend, RemoteConfig};
use replay::ReplayBackend;
use script::Script;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "corkboard")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, env = "CORKBOARD_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a JSON script of canvas events through the sync engine
    Replay {
        script: PathBuf,
        /// Run against an in-memory board seeded from the script's cards
        #[arg(long)]
        offline: bool,
        /// Board API base URL; overrides remote.json
        #[arg(long, env = "CORKBOARD_API_URL")]
        api_url: Option<String>,
    },
}

fn init_tracing() {
    // stdout carries notices and the final board.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::Replay {
            script,
            offline,
            api_url,
        } => {
            let script = Script::load(&script)?;
            let backend = if offline {
                ReplayBackend::Offline(Arc::new(MemoryBackend::with_cards(script.cards.clone())))
            } else {
                let mut config = RemoteConfig::load_or_default(&cli.data_dir);
                if let Some(api_url) = api_url {
                    config.api_url = api_url;
                }
                ReplayBackend::Remote(Arc::new(RemoteBackend::new(&config)?))
            };

            let summary = replay::run(script, backend).await?;
            eprintln!(
                "Replayed {} events ({} rejected)",
                summary.events, summary.rejected
            );
            if let Some(cards) = summary.cards {
                println!("{}", serde_json::json!({ "cards": cards }));
            }
            Ok(())
        }
    }
}
