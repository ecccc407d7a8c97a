use std::sync::Arc;

use danci_srs::config::{env_bool, Config};
use danci_srs::logging;
use danci_srs::workers::WorkerManager;
use danci_srs::{build_notifier, build_state, create_app, open_store};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = logging::init_tracing(&config.log_level);

    let store = match open_store(&config).await {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(error = %err, "review store not initialized");
            std::process::exit(1);
        }
    };
    let notifier = build_notifier(&config.reminders);
    let state = build_state(&config, store, notifier);

    let worker_manager = match WorkerManager::new(state.scheduler(), env_bool("WORKER_LEADER", false)).await {
        Ok(manager) => {
            if let Err(e) = manager.start().await {
                tracing::error!(error = %e, "failed to start workers");
            }
            Some(Arc::new(manager))
        }
        Err(e) => {
            tracing::warn!(error = %e, "worker manager not initialized");
            None
        }
    };

    let app = create_app(state);

    let addr = config.bind_addr();
    tracing::info!(%addr, "srs service listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind listener failed");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
    }

    tracing::info!("HTTP server stopped, initiating graceful shutdown sequence");

    if let Some(ref manager) = worker_manager {
        manager.stop().await;
    }

    tracing::info!("Graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
