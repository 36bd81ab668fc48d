//! Application entry point: wires the Ledger Client Adapter, Postgres
//! repository, and Notifier fan-out into shared state, then runs the
//! Monitor Loop's background tickers until shutdown.

use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use payment_monitor::app::state::AppState;
use payment_monitor::app::worker::{WorkerConfig, spawn_worker};
use payment_monitor::config::MonitorConfig;
use payment_monitor::infra::blockchain::RpcClientConfig;
use payment_monitor::infra::database::PostgresConfig;
use payment_monitor::infra::{CompositeNotifier, PostgresPaymentRepository, SolanaLedgerClient};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C"),
        () = terminate => info!("received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    info!("payment monitor v{}", env!("CARGO_PKG_VERSION"));

    let config = MonitorConfig::from_env()?;

    let repository = PostgresPaymentRepository::new(&config.database_url, PostgresConfig::default()).await?;
    repository.run_migrations().await?;
    info!("database connected and migrations applied");

    let ledger = SolanaLedgerClient::new(
        config.solana_rpc_url.clone(),
        RpcClientConfig {
            timeout: std::time::Duration::from_secs(config.rpc_timeout_secs),
        },
    )?;
    info!("ledger client ready against {}", config.solana_rpc_url);

    let notification_room = Arc::new(payment_monitor::app::state::NotificationRoom::new());
    let notifier = CompositeNotifier::new(config.webhook_url.clone(), Arc::clone(&notification_room));

    let state = Arc::new(
        AppState::new(Arc::new(ledger), Arc::new(repository), Arc::new(notifier), config.clone())
            .with_notification_room(notification_room),
    );

    let (worker_handles, worker_shutdown_tx) = spawn_worker(Arc::clone(&state), WorkerConfig::from_state(&state));
    info!("monitor worker started");

    shutdown_signal().await;

    let _ = worker_shutdown_tx.send(true);
    for handle in worker_handles {
        let _ = handle.await;
    }

    info!("shutdown complete");
    Ok(())
}
