//! Platform bridge CLI
//!
//! Resolves the platform the same way an embedded bridge would, initializes
//! it and prints the resulting identity as JSON. With `--connect` the bridge
//! talks to a QA-Tool harness over TCP; `--check` exercises every supported
//! feature once.

use anyhow::{Context, Result};
use clap::Parser;
use platform_bridge::{
    BridgeError, BridgeOptions, Feature, PlatformBridge, PlatformContext, PlatformId,
};
use platform_bridge_broker::{LocalChannel, StreamLink, connect};
use serde_json::{Value, json};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Origin of this process on the channel
const GAME_ORIGIN: &str = "game";
/// Origin of the harness on the other end of `--connect`
const HARNESS_ORIGIN: &str = "qa_tool";
const CHECK_KEY: &str = "__platform_bridge_check";

#[derive(Parser, Debug)]
#[command(name = "platform-bridge", version, about)]
struct Args {
    /// Bridge options JSON file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Force a platform (mock, qa_tool, playgama, absolute_games)
    #[arg(long)]
    platform: Option<String>,

    /// Location URL to read `platform_id` from
    #[arg(long)]
    url: Option<String>,

    /// Remote resolution endpoint
    #[arg(long)]
    resolution_endpoint: Option<String>,

    /// Platform used when nothing else resolves
    #[arg(long)]
    default_platform: Option<PlatformId>,

    /// Per-request timeout for message-protocol platforms, 0 disables
    #[arg(long)]
    request_timeout_ms: Option<u64>,

    /// Address of a QA-Tool harness to link the channel to
    #[arg(long)]
    connect: Option<String>,

    /// Exercise every supported feature after initializing
    #[arg(long)]
    check: bool,
}

fn bridge_options(args: &Args) -> Result<BridgeOptions> {
    let mut options = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            BridgeOptions::from_json(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => BridgeOptions::default(),
    };

    if let Some(platform) = &args.platform {
        options = options.with_forced_platform(platform.clone());
    }
    if let Some(url) = &args.url {
        options = options.with_location(url.clone());
    }
    if let Some(endpoint) = &args.resolution_endpoint {
        options.resolution_endpoint = Some(endpoint.clone());
    }
    if let Some(platform) = args.default_platform {
        options.default_platform = platform;
    }
    if let Some(timeout) = args.request_timeout_ms {
        options.request_timeout_ms = (timeout > 0).then_some(timeout);
    }
    Ok(options)
}

async fn platform_context(args: &Args) -> Result<(PlatformContext, Option<StreamLink>)> {
    let Some(addr) = &args.connect else {
        return Ok((PlatformContext::new(), None));
    };
    let channel = LocalChannel::new(GAME_ORIGIN);
    let link = connect(&channel, HARNESS_ORIGIN, addr).await?;
    Ok((PlatformContext::new().with_channel(channel), Some(link)))
}

fn outcome<T: serde::Serialize>(result: platform_bridge::Result<T>) -> Value {
    match result {
        Ok(value) => json!({ "ok": value }),
        Err(e) => json!({ "error": { "code": e.code(), "message": e.to_string() } }),
    }
}

async fn check(bridge: &PlatformBridge) -> Result<Value> {
    let identity = bridge.platform()?;
    let mut report = serde_json::Map::new();

    if identity.supports(Feature::Player) {
        report.insert("player".into(), outcome(bridge.player().get_user().await));
    }

    if identity.supports(Feature::Storage) {
        let storage = bridge.storage();
        let round_trip = async {
            storage.set_value(CHECK_KEY, true).await?;
            let value = storage.get(CHECK_KEY).await?;
            storage.delete(&[CHECK_KEY.to_string()]).await?;
            Ok::<_, BridgeError>(value == Some(Value::Bool(true)))
        };
        report.insert("storage".into(), outcome(round_trip.await));
    }

    if identity.supports(Feature::Advertising) {
        let subscribed = bridge
            .advertising()
            .subscribe_to_state_changes()
            .map(|_| true);
        report.insert("advertising".into(), outcome(subscribed));
    }

    Ok(Value::Object(report))
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
    let options = bridge_options(&args)?;
    let (context, _link) = platform_context(&args).await?;

    let bridge = PlatformBridge::new(context);
    bridge.initialize(options).await?;

    let identity = bridge.platform()?;
    let resolution = bridge.resolution()?;
    if resolution.platform != identity.id {
        warn!(
            "Resolved {} but running on {} (SDK unavailable here)",
            resolution.platform, identity.id
        );
    }

    let mut output = json!({
        "platform": identity,
        "resolvedPlatform": resolution.platform,
        "resolvedVia": resolution.source,
    });
    if args.check {
        info!("Probing {}", identity.id);
        output["check"] = check(&bridge).await?;
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
