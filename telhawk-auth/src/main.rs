//! TelHawk auth service - main entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal;
use tower_http::timeout::TimeoutLayer;

use telhawk_auth::config::AuthConfig;
use telhawk_auth::services::{
    AuditLogger, AuthService, ContainmentIndex, Database, HecService, OcsfForwarder, TokenService,
    UserService,
};
use telhawk_auth::{build_router, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration first (before tracing init)
    let config = AuthConfig::from_env()?;

    telhawk_core::observability::init_tracing(&config.service_name, &config.common.log_level);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        "Starting telhawk-auth"
    );

    // Create PostgreSQL connection pool
    let pool = db::create_pool(&config.database).await?;

    // Run migrations
    db::run_migrations(&pool).await?;

    // Create the repository wrapper
    let database = Database::new(pool);

    // Token codec
    let tokens = TokenService::new(&config.jwt);
    tracing::info!("token service initialized");

    // Optional OCSF forwarder
    let forwarder = if config.forward.enabled {
        let forwarder = OcsfForwarder::new(&config.forward)
            .map_err(|e| anyhow::anyhow!("failed to build forwarder: {}", e))?;
        tracing::info!(url = %config.forward.url, "audit forwarding enabled");
        Some(Arc::new(forwarder))
    } else {
        tracing::info!("audit forwarding disabled");
        None
    };

    // Audit pipeline
    let audit = AuditLogger::new(database.clone(), &config.audit.secret, forwarder);

    // Memoized client->organization containment
    let containment = Arc::new(ContainmentIndex::new(database.clone()));

    // Service layer
    let auth = AuthService::new(
        database.clone(),
        tokens.clone(),
        audit.clone(),
        config.jwt.refresh_token_ttl_days,
    );
    let users = UserService::new(
        database.clone(),
        audit.clone(),
        Arc::clone(&containment),
        config.security.bcrypt_cost,
    );
    let hec = HecService::new(database.clone(), tokens, audit.clone());

    let state = AppState {
        config: config.clone(),
        db: database,
        auth,
        users,
        hec,
        audit,
        containment,
    };

    let app = build_router(state)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.read_timeout_seconds + config.server.write_timeout_seconds,
        )));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("shut down cleanly");
    Ok(())
}

/// Resolve when SIGTERM or ctrl-c arrives so in-flight requests can drain.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
