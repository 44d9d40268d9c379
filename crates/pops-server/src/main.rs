//! pOps sentiment service.
//!
//! - Config: `POPS_CONFIG` (default `pops.yaml`, optional) + env overrides
//! - Model loaded once, before the listener binds; failure => degraded mode
//! - Span + counter + latency histogram per predict request
//! - Graceful shutdown on Ctrl-C / SIGTERM

use std::process::ExitCode;
use std::sync::Arc;

use pops_server::{app_state, config, model, obs, router};

#[tokio::main]
async fn main() -> ExitCode {
    let cfg = match config::load_from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("config load failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _tracing = match obs::trace::init(&cfg.telemetry) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("telemetry init failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Listen address was validated with the config.
    let listen = match cfg.server.listen_addr() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(error = %e, "invalid listen address");
            return ExitCode::FAILURE;
        }
    };

    // Load before accepting traffic; never aborts startup.
    let guard = Arc::new(model::ModelGuard::new());
    guard.initialize(&model::BuiltinLoader, &cfg.model).await;

    let telemetry = Arc::new(obs::Telemetry::new());
    let state = app_state::AppState::new(guard, telemetry);
    let app = router::build_router(state.clone());

    let listener = match tokio::net::TcpListener::bind(listen).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%listen, error = %e, "failed to bind");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(%listen, model_status = state.model().status(), "pops-server starting");

    let shutdown_state = state.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_state.set_draining();
            tracing::info!("shutdown signal received, draining");
        })
        .await;

    if let Err(e) = served {
        tracing::error!(error = %e, "server failed");
        return ExitCode::FAILURE;
    }
    tracing::info!("pops-server stopped");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
