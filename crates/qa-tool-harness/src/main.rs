//! QA-Tool harness
//!
//! Serves the QA-Tool side of the platform protocol over TCP. Every accepted
//! connection gets its own channel and a fresh host state built from the
//! command line (or a JSON host config).

use anyhow::{Context, Result};
use clap::Parser;
use platform_bridge_broker::{LocalChannel, link_tcp};
use platform_bridge_core::{Feature, FeatureSet, Player};
use qa_tool_harness::{HostConfig, QaToolHost};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Origin the harness posts under on each connection channel
const HOST_ORIGIN: &str = "qa_tool";
/// Origin of the connected game
const PEER_ORIGIN: &str = "game";

#[derive(Parser, Debug)]
#[command(name = "qa-tool-harness", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:7460")]
    listen: String,

    /// Host config JSON file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Id of the account that authorization signs in
    #[arg(long)]
    player_id: Option<String>,

    #[arg(long)]
    player_name: Option<String>,

    /// Start with the player already signed in
    #[arg(long)]
    signed_in: bool,

    /// Comma separated features to offer (player,storage,advertising)
    #[arg(long, value_delimiter = ',')]
    features: Option<Vec<Feature>>,
}

fn host_config(args: &Args) -> Result<HostConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => HostConfig::default(),
    };

    if let Some(id) = &args.player_id {
        let mut player = Player::authorized(id.clone());
        if let Some(name) = &args.player_name {
            player = player.with_name(name.clone());
        }
        config = config.with_player(player, args.signed_in);
    } else if args.signed_in {
        config.signed_in = true;
    }
    if let Some(features) = &args.features {
        config = config.with_features(features.iter().copied().collect::<FeatureSet>());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = host_config(&args)?;

    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    info!(
        "QA-Tool harness listening on {} (features: {:?})",
        args.listen, config.features
    );

    loop {
        let (stream, peer) = listener.accept().await?;
        info!("Game connected from {}", peer);

        let channel = LocalChannel::new(HOST_ORIGIN);
        let host = QaToolHost::attach(channel.clone(), config.clone());
        let mut link = match link_tcp(&channel, PEER_ORIGIN, stream) {
            Ok(link) => link,
            Err(e) => {
                error!("Failed to link {}: {}", peer, e);
                continue;
            }
        };

        tokio::spawn(async move {
            link.closed().await;
            let initialized = host.with_state(|state| state.is_initialized());
            info!("Game {} disconnected (initialized: {})", peer, initialized);
        });
    }
}
