use hersync::config::AppConfig;
use hersync::db::{init_pool, run_migrations};
use hersync::error::AppError;
use hersync::routes::create_router;
use hersync::state::AppState;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;
    let db = init_pool(&config.database_url).await?;

    if let Err(err) = run_migrations(&db).await {
        error!("migration failed: {err:?}");
        return Err(err);
    }

    let state = AppState::new(config.clone(), db)?;

    match state.session.restore().await {
        Ok(Some(user)) => info!(user = %user.username, "resuming stored session"),
        Ok(None) => info!("no stored session, starting logged out"),
        Err(err) => warn!("could not read stored session: {err}"),
    }
    let follower = state.poller.follow_session(state.session.subscribe());

    let app = create_router(state.clone());

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(api = %config.api_base, "listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    follower.abort();
    state.poller.stop().await;
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,hersync=debug".into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
