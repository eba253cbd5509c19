//! pushmask relay server binary.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pushmask_relay::dispatch::MessageDispatcher;
use pushmask_relay::push::{FcmClient, HttpPushTransport, UnifiedPushClient};
use pushmask_relay::server::{AppState, build_router};
use pushmask_relay::storage::RelayDatabase;
use pushmask_relay::sweeper::{ExpirySweeper, SweeperConfig};

#[derive(Parser, Debug)]
#[command(name = "pushmask-relay")]
#[command(version, about = "Privacy-preserving push notification relay")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8080", env = "PUSHMASK_ADDR")]
    addr: SocketAddr,

    /// Path to SQLite database file.
    #[arg(long, env = "PUSHMASK_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Path to the FCM service account JSON file. Without it, relays to
    /// FCM destinations fail as transient errors.
    #[arg(long, env = "PUSHMASK_FCM_CREDENTIALS")]
    fcm_credentials: Option<PathBuf>,

    /// Outbound push request timeout in seconds.
    #[arg(long, default_value_t = 20)]
    push_timeout_secs: u64,

    /// Delay between expiry sweep passes in seconds.
    #[arg(long, default_value_t = 300)]
    sweep_interval_secs: u64,

    /// Evict registrations unused for this many days.
    #[arg(long, default_value_t = 30)]
    usage_ttl_days: u64,

    /// Reclaim offloaded messages older than this many days.
    #[arg(long, default_value_t = 30)]
    large_message_ttl_days: u64,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "pushmask_relay=info".into()),
    );
    if args.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %args.addr,
        "Starting pushmask-relay"
    );

    let db = match &args.db_path {
        Some(path) => {
            info!(path = %path.display(), "Opening relay database");
            RelayDatabase::open(path).await?
        }
        None => {
            let default_path = default_db_path()?;
            info!(path = %default_path.display(), "Opening relay database (default path)");
            RelayDatabase::open(&default_path).await?
        }
    };

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.push_timeout_secs))
        .connect_timeout(Duration::from_secs(args.push_timeout_secs))
        .build()?;

    let fcm = match &args.fcm_credentials {
        Some(path) => Some(FcmClient::from_credentials_file(path, http.clone())?),
        None => {
            warn!("No FCM credentials configured; FCM deliveries will fail");
            None
        }
    };
    let transport = Arc::new(HttpPushTransport::new(UnifiedPushClient::new(http), fcm));
    let dispatcher = Arc::new(MessageDispatcher::new(db.clone(), transport));

    let cancel = CancellationToken::new();
    let sweeper = ExpirySweeper::new(
        db.clone(),
        SweeperConfig {
            interval: Duration::from_secs(args.sweep_interval_secs),
            usage_ttl: Duration::from_secs(args.usage_ttl_days * 24 * 3600),
            large_message_ttl: Duration::from_secs(args.large_message_ttl_days * 24 * 3600),
        },
    )
    .spawn(cancel.clone());

    let app = build_router(AppState { db, dispatcher });
    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    info!(addr = %args.addr, "Relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Stopping expiry sweeper");
    cancel.cancel();
    if tokio::time::timeout(Duration::from_secs(10), sweeper)
        .await
        .is_err()
    {
        warn!("Expiry sweeper did not stop within the grace period");
    }

    info!("Relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Received shutdown signal");
}

fn default_db_path() -> anyhow::Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".pushmask").join("relay.db"))
}
