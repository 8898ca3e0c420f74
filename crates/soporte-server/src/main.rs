mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use soporte_api::auth::ensure_staff_account;
use soporte_api::{AppState, AppStateInner};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "soporte=debug,soporte_api=debug,soporte_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;
    if config.uses_placeholder_secret() {
        warn!("SOPORTE_SESSION_SECRET is unset or a placeholder; sessions can be forged");
    }

    // Init database
    let db = soporte_db::Database::open(&PathBuf::from(&config.db_path))?;

    // Staff bootstrap
    let seed = &config.staff;
    if ensure_staff_account(&db, &seed.name, &seed.email, &seed.password)?
        && config.uses_default_staff_password()
    {
        warn!("Staff account {} uses the default password; change SOPORTE_STAFF_PASSWORD", seed.email);
    }

    let state: AppState = Arc::new(AppStateInner::new(
        db,
        config.session_secret.clone(),
        chrono::Duration::hours(config.session_ttl_hours),
    ));

    let app = soporte_api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Soporte listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let Ok(mut sigterm) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        else {
            warn!("Failed to install SIGTERM handler; waiting for Ctrl+C only");
            ctrl_c.await.ok();
            return;
        };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
