//! Wisp licensing server entrypoint.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wisp_api::{create_router, AppState};
use wisp_core::ports::{AuthorityApi, Clock, LicenseRepository, SystemClock, UsageProvider};
use wisp_db::{Database, PgLicenseRepository, PgUsageProvider};
use wisp_licensing::{
    CommandChannel, HeartbeatService, HttpAuthorityClient, LicenseScheduler, LicenseService,
    LicensingConfig, MasterOverride, SuspensionCache, SuspensionGate, TamperGuard,
};

#[derive(Parser)]
#[command(name = "wisp-server")]
#[command(author, version, about = "Wisp licensing server", long_about = None)]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Path to a licensing configuration file (YAML).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => LicensingConfig::from_file(path)?,
        None => LicensingConfig::default(),
    };

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let db = Database::connect(&database_url).await?;
    db.migrate().await?;

    let repo: Arc<dyn LicenseRepository> = Arc::new(PgLicenseRepository::new(db.pool().clone()));
    let usage: Arc<dyn UsageProvider> = Arc::new(PgUsageProvider::new(db.pool().clone()));
    let authority: Arc<dyn AuthorityApi> = Arc::new(HttpAuthorityClient::new(&config)?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let guard = TamperGuard::new(config.offline_grace_days);
    let cache = Arc::new(SuspensionCache::new(config.gate_ttl_secs));

    let heartbeat = Arc::new(HeartbeatService::new(
        repo.clone(),
        authority.clone(),
        usage,
        clock.clone(),
        guard,
        cache.clone(),
    ));
    let commands = Arc::new(CommandChannel::new(
        repo.clone(),
        authority.clone(),
        heartbeat.clone(),
        cache.clone(),
    ));
    let service = Arc::new(LicenseService::new(
        repo.clone(),
        authority,
        clock.clone(),
        guard,
        Arc::new(MasterOverride::new()),
        cache.clone(),
        heartbeat.clone(),
    ));
    let gate = Arc::new(SuspensionGate::new(
        repo,
        guard,
        clock,
        cache,
        config.exempt_path_prefixes.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = LicenseScheduler::new(heartbeat, commands, config);
    let tasks = scheduler.spawn(shutdown_rx);

    let state = Arc::new(AppState::new(service, gate));
    let app = create_router(state);

    let listener = TcpListener::bind(&cli.listen).await?;
    info!(listen = %cli.listen, "Wisp licensing server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    for task in tasks {
        task.abort();
    }
    Ok(())
}
