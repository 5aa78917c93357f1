use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sea_orm::{Database, DatabaseConnection};

use storefront::config::StorefrontConfig;
use storefront::domain::notification::ChannelPolicy;
use storefront::infra::cache::RedisStore;
use storefront::infra::notify::HttpNotificationSender;
use storefront::infra::outbox::DbOutboxRepository;
use storefront::router::build_router;
use storefront::state::AppState;
use storefront::usecase::dispatch::DispatchWorker;
use storefront::usecase::token::TokenIssuer;
use storefront_auth_types::session::SessionSecret;
use storefront_core::config::Config;
use storefront_core::tracing::init_tracing;

#[derive(Parser)]
#[command(about = "Storefront order backend")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API
    Serve,
    /// Run the notification outbox worker
    Dispatch,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info");
    let args = Args::parse();

    let config = StorefrontConfig::from_env().context("failed to load configuration")?;
    let db = Database::connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    match args.command {
        Command::Serve => serve(config, db).await,
        Command::Dispatch => dispatch(config, db).await,
    }
}

fn redis_pool(config: &StorefrontConfig) -> Result<deadpool_redis::Pool> {
    deadpool_redis::Config::from_url(&config.redis_url)
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .context("failed to create Redis pool")
}

async fn serve(config: StorefrontConfig, db: DatabaseConnection) -> Result<()> {
    let redis = redis_pool(&config)?;

    let state = AppState {
        db,
        redis,
        session_secret: SessionSecret::new(config.jwt_secret.as_str()),
        tokens: TokenIssuer {
            secret: config.jwt_secret.clone(),
            expires_in_secs: config.jwt_expires_in_secs,
        },
        channels: ChannelPolicy {
            phone_prefers_whatsapp: config.otp_phone_prefer_whatsapp,
        },
    };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.storefront_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(%addr, "storefront listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn dispatch(config: StorefrontConfig, db: DatabaseConnection) -> Result<()> {
    let worker = DispatchWorker {
        outbox: DbOutboxRepository { db },
        sender: HttpNotificationSender::from_config(&config)?,
        codes: RedisStore {
            pool: redis_pool(&config)?,
        },
        app_name: config.app_name.clone(),
        batch_size: config.dispatch_batch_size,
    };

    tracing::info!(
        poll_interval_ms = config.dispatch_poll_interval_ms,
        batch_size = config.dispatch_batch_size,
        "dispatch worker started"
    );
    worker
        .run(
            Duration::from_millis(config.dispatch_poll_interval_ms),
            shutdown_signal(),
        )
        .await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
