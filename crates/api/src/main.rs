//! API server entry point.

use std::sync::Arc;

use api::{AppState, Collaborators, Config, LogFormat};
use checkout::{
    CheckoutStore, HttpPaymentGateway, InMemoryCartService, InMemoryPaymentGateway,
    InMemoryShippingRates, PaymentGateway,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryStore, PostgresStore};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn collaborators(config: &Config) -> Collaborators {
    let gateway: Arc<dyn PaymentGateway> = match &config.gateway {
        Some(gateway) => {
            tracing::info!(base_url = %gateway.base_url, "using HTTP payment gateway");
            Arc::new(HttpPaymentGateway::new(
                gateway.base_url.clone(),
                gateway.key_id.clone(),
                gateway.key_secret.clone(),
            ))
        }
        None => {
            tracing::warn!("GATEWAY_* not set, using in-memory payment gateway");
            Arc::new(InMemoryPaymentGateway::new())
        }
    };

    Collaborators {
        gateway,
        shipping: Arc::new(InMemoryShippingRates::default()),
        carts: Arc::new(InMemoryCartService::new()),
    }
}

/// Serves the API over `store` until a shutdown signal arrives.
async fn serve<S: CheckoutStore>(store: Arc<S>, config: Config, metrics_handle: PrometheusHandle) {
    if config.webhook_secret.is_none() {
        tracing::warn!("WEBHOOK_SECRET not set, payment webhooks will be rejected");
    }
    if config.reaper_secret.is_none() {
        tracing::warn!("REAPER_SECRET not set, manual reaper trigger is disabled");
    }

    let state = Arc::new(AppState::new(store, collaborators(&config), &config));

    // Scheduled reaper, stopped after the server drains
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let reaper = state.reaper.clone();
    tracing::info!(
        interval_secs = reaper.interval().as_secs(),
        "starting expiry reaper"
    );
    let reaper_task = reaper.spawn(async move {
        let _ = stop_rx.changed().await;
    });

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    let _ = stop_tx.send(true);
    if let Err(e) = reaper_task.await {
        tracing::error!(error = %e, "expiry reaper task panicked");
    }
    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the store and serve
    match config.database_url.clone() {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(20)
                .connect(&url)
                .await
                .expect("failed to connect to PostgreSQL");
            let store = PostgresStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL store");
            serve(Arc::new(store), config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            serve(Arc::new(InMemoryStore::new()), config, metrics_handle).await;
        }
    }
}
