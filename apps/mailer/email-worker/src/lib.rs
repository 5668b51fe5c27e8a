//! Mail Worker Service
//!
//! Consumes mail jobs from a Redis stream, sends localized mails over SMTP and
//! records confirmation and password-reset tokens in Redis.
//!
//! ## Architecture
//!
//! ```text
//! Redis Stream (q_mail)
//!   ↓ (Consumer Group: mail_workers)
//! StreamWorker<MailJob, JobRouter>
//!   ↓ lookup (PostgreSQL) → render → send (SMTP) → token (Redis)
//! ack | retry | q_mail:dlq
//! ```

pub mod config;

use axum::Router;
use core_config::{app_info, Environment, FromEnv};
use database::{postgres::PostgresConfig, redis::RedisConfig};
use domain_mailer::{
    Catalog, JobRouter, Localizer, MailDispatcher, MailJob, PgUserDirectory, RedisTokenStore,
    SmtpTransport, TemplateEngine, TokenRecorder,
};
use eyre::{Result, WrapErr};
use std::sync::Arc;
use stream_worker::{
    health_router, metrics, HealthState, StreamConsumer, StreamWorker, WorkerConfig,
};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

pub use config::MailerConfig;

/// Serve health, metrics and DLQ endpoints until the process exits.
async fn start_health_server(health_state: HealthState, port: u16) -> Result<()> {
    let app: Router = health_router(health_state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind health server to {}", addr))?;

    info!(port = %port, "Health server listening");

    axum::serve(listener, app)
        .await
        .wrap_err("Health server failed")?;

    Ok(())
}

/// Load the bundled catalogs plus any from `MAILER_CATALOG_DIR`.
fn build_localizer(config: &MailerConfig) -> Result<Localizer> {
    let mut catalog = Catalog::bundled().wrap_err("Failed to load bundled catalogs")?;
    if let Some(dir) = &config.catalog_dir {
        catalog
            .merge_dir(dir)
            .wrap_err_with(|| format!("Failed to load catalogs from {}", dir.display()))?;
    }
    Localizer::new(catalog, config.fallback_language.clone()).wrap_err("Failed to build localizer")
}

/// Run the mail worker.
///
/// Every dependency is set up before the first message is read; any startup
/// failure is returned and the process exits non-zero.
pub async fn run() -> Result<()> {
    core_config::tracing::install_color_eyre();
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    metrics::init_metrics().wrap_err("Failed to install Prometheus recorder")?;

    let app_info = app_info!();
    info!(name = %app_info.name, version = %app_info.version, "Starting mail worker service");
    info!("Environment: {:?}", environment);

    let config = MailerConfig::from_env().wrap_err("Failed to load mailer configuration")?;

    let localizer = build_localizer(&config)?;
    let templates = TemplateEngine::new().wrap_err("Failed to register templates")?;
    let transport = SmtpTransport::new(&config.smtp).wrap_err("Failed to build SMTP transport")?;

    let pg_config = PostgresConfig::from_env().wrap_err("Failed to load PostgreSQL configuration")?;
    info!("Connecting to PostgreSQL...");
    let db = database::postgres::connect_with_retry(&pg_config, None)
        .await
        .wrap_err("Failed to connect to PostgreSQL")?;

    let redis_config = RedisConfig::from_env().wrap_err("Failed to load Redis configuration")?;
    info!("Connecting to Redis...");
    let redis = database::redis::connect_with_retry(&redis_config, None)
        .await
        .wrap_err("Failed to connect to Redis")?;

    let users = PgUserDirectory::new(db, &config.users_table).wrap_err("Invalid USERS_TABLE")?;
    let router = JobRouter::new(
        Arc::new(users),
        Arc::new(localizer),
        Arc::new(templates),
        MailDispatcher::new(Arc::new(transport), config.sender.clone()),
        TokenRecorder::new(Arc::new(RedisTokenStore::new(redis.clone(), config.token_ttl))),
        config.company_name.clone(),
    );

    let worker_config = WorkerConfig::new(&config.queue_name, &config.consumer_group)
        .with_failure_policy(config.failure_policy);
    info!(
        stream = %worker_config.stream_name,
        consumer_group = %worker_config.consumer_group,
        consumer_id = %worker_config.consumer_id,
        dlq_stream = %worker_config.dlq_stream,
        failure_policy = %worker_config.failure_policy,
        "Worker configuration loaded"
    );

    let queue = Arc::new(StreamConsumer::new(redis, worker_config.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let health_state = HealthState::new(queue.clone(), app_info.name, app_info.version);
    let health_port = config.health_port;
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_state, health_port).await {
            error!(error = %e, "Health server failed");
        }
    });

    let worker = StreamWorker::<MailJob, _, _>::new(
        queue,
        Arc::new(router),
        worker_config.failure_policy,
        &worker_config.stream_name,
    );
    worker
        .run(shutdown_rx)
        .await
        .wrap_err("Mail worker failed")?;

    info!("Mail worker service stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal, shutting down gracefully"),
        _ = terminate => info!("Received SIGTERM signal, shutting down gracefully"),
    }
}
