mod config;
mod routes;

use services::{AppServices, Clock};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{AppConfig, StoreConfig, prepare_sqlite_file, print_usage};
use crate::routes::{AppState, router};

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_process().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let clock = Clock::default_clock();

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    let services = match &config.store {
        StoreConfig::Memory => AppServices::in_memory(clock, config.merge_policy),
        StoreConfig::Sqlite { url } => {
            prepare_sqlite_file(url)?;
            AppServices::new_sqlite(url, clock, config.merge_policy).await?
        }
    };

    let app = router(
        AppState::new(
            services.clone(),
            clock,
            config.environment.as_str(),
            config.bind.port(),
        ),
        &config.allowed_origins,
    );

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(
        addr = %listener.local_addr()?,
        store = services.storage_kind().as_str(),
        environment = %config.environment,
        merge_gap = config.merge_policy.max_gap(),
        origins = ?config.allowed_origins,
        "watch progress server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
