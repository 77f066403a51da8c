//! Job Board Daemon - Main Entry Point
//!
//! Composition root: loads settings, wires SQLite, the payment adapter and
//! the orchestrator, then runs the expiration sweeper, the JSON-RPC server
//! and the webhook receiver until Ctrl+C.

mod settings;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use jobboard_api_rpc::{RpcServer, RpcServerConfig};
use jobboard_core::application::{
    shutdown_channel, ExpirationSweeper, LifecycleOrchestrator, RecoveryService, RetryPolicy,
};
use jobboard_core::port::id_provider::UuidProvider;
use jobboard_core::port::time_provider::SystemTimeProvider;
use jobboard_core::port::{PaymentGateway, TimeProvider};
use jobboard_infra_payment::{
    router, serve, SandboxCheckoutGateway, StripeCheckoutGateway, StripeConfig, WebhookState,
};
use jobboard_infra_sqlite::{
    create_pool, run_migrations, SqliteExpirationScheduler, SqliteListingStore,
};
use settings::DaemonConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging (guard flushes the file writer on exit)
    let _log_guard = telemetry::init_logging()?;
    info!("Job Board daemon v{} starting...", VERSION);

    // 2. Settings
    let config = DaemonConfig::load()?;

    // 3. Database
    if config.database_path != ":memory:" {
        if let Some(parent) = std::path::Path::new(&config.expanded_database_path()).parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }
    }
    let database_url = config.database_url();
    info!(database_url = %database_url, "Initializing database...");
    let pool = create_pool(&database_url)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 4. Adapters (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let store = Arc::new(SqliteListingStore::new(pool.clone()));
    let scheduler = Arc::new(SqliteExpirationScheduler::new(
        pool.clone(),
        time_provider.clone(),
    ));

    let gateway: Arc<dyn PaymentGateway> = match config.stripe_secret_key() {
        Some(secret_key) => {
            let stripe = StripeConfig::new(secret_key, &config.public_url, &config.currency)
                .with_api_base(config.stripe.api_base.clone());
            info!(api_base = %stripe.api_base, "Using Stripe checkout gateway");
            Arc::new(StripeCheckoutGateway::new(reqwest::Client::new(), stripe))
        }
        None => {
            warn!(
                public_url = %config.public_url,
                "No stripe.secret_key configured; using the sandbox gateway (no real payments)"
            );
            Arc::new(SandboxCheckoutGateway::new(config.public_url.clone()))
        }
    };

    let orchestrator = Arc::new(LifecycleOrchestrator::new(
        store.clone(),
        gateway,
        scheduler.clone(),
        config.pricing_table()?,
        Arc::new(UuidProvider),
        time_provider.clone(),
    ));

    // 5. Re-arm timers lost between insert and arm
    info!("Running timer recovery...");
    let recovery = RecoveryService::new(store, scheduler.clone(), time_provider.clone());
    match recovery.rearm_missing_timers().await {
        Ok(count) => info!(rearmed_timers = count, "Timer recovery completed"),
        Err(e) => error!(error = %e, "Timer recovery failed"),
    }

    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    // 6. Expiration sweeper
    let sweeper = ExpirationSweeper::new(
        orchestrator.clone(),
        scheduler.clone(),
        RetryPolicy::default(),
        time_provider.clone(),
        config.sweeper_config(),
    );
    let sweeper_shutdown = shutdown_rx.clone();
    let sweeper_handle = tokio::spawn(async move {
        if let Err(e) = sweeper.run(sweeper_shutdown).await {
            error!(error = %e, "Expiration sweeper failed");
        }
    });

    // 7. JSON-RPC server
    let rpc_config = RpcServerConfig {
        host: config.rpc.host.clone(),
        port: config.rpc.port,
        rate_limit_burst: config.rpc.rate_limit_burst,
        rate_limit_per_sec: config.rpc.rate_limit_per_sec,
        allow_manual_completion: config.stripe_secret_key().is_none(),
    };
    let (rpc_handle, rpc_addr) = RpcServer::new(rpc_config, orchestrator.clone(), scheduler)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    // 8. Webhook receiver
    let webhook_secret = match config.webhook_secret() {
        Some(secret) => secret.to_string(),
        None => {
            warn!("No stripe.webhook_secret configured; signed webhook deliveries will be rejected");
            uuid::Uuid::new_v4().to_string()
        }
    };
    let webhook_state = WebhookState::new(orchestrator, webhook_secret, time_provider);
    let webhook_addr = format!("{}:{}", config.webhook.host, config.webhook.port);
    let listener = tokio::net::TcpListener::bind(&webhook_addr)
        .await
        .with_context(|| format!("Failed to bind webhook listener on {}", webhook_addr))?;
    let webhook_shutdown = shutdown_rx.clone();
    let webhook_handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, router(webhook_state), webhook_shutdown).await {
            error!(error = %e, "Webhook server failed");
        }
    });

    info!(rpc_addr = %rpc_addr, webhook_addr = %webhook_addr, "System ready");
    info!("Press Ctrl+C to shutdown");

    // 9. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 10. Graceful shutdown
    shutdown_tx.shutdown();
    if let Err(e) = rpc_handle.stop() {
        warn!(error = %e, "RPC server already stopped");
    }
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, sweeper_handle).await;
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, webhook_handle).await;
    pool.close().await;

    info!("Shutdown complete.");
    Ok(())
}
