//! Ticket desk HTTP server.
//!
//! Receives Telegram updates over a webhook and runs the buyer and admin
//! conversations against `PostgreSQL`.

use boxoffice_bot::config::Config;
use boxoffice_bot::dispatcher::{Collaborators, DeskSettings, Dispatcher};
use boxoffice_bot::qr::ImageQrCodec;
use boxoffice_bot::server::{AppState, build_router};
use boxoffice_bot::telegram::TelegramClient;
use boxoffice_core::ports::{RandomIds, RecordStore};
use boxoffice_postgres::PostgresRecordStore;
use boxoffice_runtime::RuntimeConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,boxoffice_bot=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ticket desk");

    let config = Config::from_env()?;
    info!(
        operator = %config.operator.chat,
        address = %config.server.address(),
        webhook_secret = config.telegram.webhook_secret.is_some(),
        "Configuration loaded"
    );

    let metrics = match boxoffice_runtime::metrics::install_prometheus() {
        Ok(handle) => {
            boxoffice_bot::metrics::register_business_metrics();
            Some(handle)
        },
        Err(error) => {
            warn!(%error, "Metrics disabled");
            None
        },
    };

    let records = Arc::new(PostgresRecordStore::new(
        &config.database.url,
        Duration::from_secs(config.database.connect_timeout),
    ));
    records.ensure_schema().await?;
    info!("Database schema ready");

    let telegram = Arc::new(TelegramClient::new(
        config.telegram.token.clone(),
        config.telegram.api_url.clone(),
    )?);
    if let Err(error) = telegram.set_my_commands().await {
        warn!(%error, "Could not register the command menu");
    }

    let qr = Arc::new(ImageQrCodec);
    let dispatcher = Arc::new(Dispatcher::new(
        Collaborators {
            records,
            notifier: telegram.clone(),
            qr: qr.clone(),
            ids: Arc::new(RandomIds),
        },
        DeskSettings {
            operator: config.operator.chat,
            password: config.operator.password.clone(),
            payment_link: config.payment_link.clone(),
            runtime: RuntimeConfig::default().with_effect_timeout(config.effect_timeout),
        },
    ));

    let app = build_router(AppState {
        dispatcher: Arc::clone(&dispatcher),
        bot: telegram,
        qr,
        webhook_secret: config.telegram.webhook_secret.as_deref().map(Arc::from),
        metrics,
    });

    let listener = tokio::net::TcpListener::bind(config.server.address()).await?;
    info!(address = %config.server.address(), "Listening for webhook calls");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dispatcher.shutdown();
    info!("Ticket desk shut down");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            warn!(%error, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(error) => {
                warn!(%error, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
