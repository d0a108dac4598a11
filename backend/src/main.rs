use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sessionkeeper_backend::{
    config::Config,
    repositories::{
        memory::InMemoryPrincipalStore, postgres::PgPrincipalStore, principal::PrincipalStore,
    },
    routes::build_router,
    state::AppState,
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

fn mask_database_url(url: &str) -> String {
    match url.split_once('@') {
        Some((_, host)) => format!("***@{}", host),
        None => url.to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sessionkeeper_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    let database_target = config
        .database_url
        .as_deref()
        .map(mask_database_url)
        .unwrap_or_else(|| "<in-memory>".into());
    tracing::info!(
        database_url = %database_target,
        jwt_secret = %mask_secret(&config.jwt_secret),
        access_token_ttl_minutes = config.access_token_ttl_minutes,
        refresh_token_ttl_days = config.refresh_token_ttl_days,
        max_sessions_per_user = config.max_sessions_per_user,
        cookie_secure = config.cookie_secure,
        production_mode = config.production_mode,
        "Loaded configuration from environment/.env"
    );

    // Initialize principal store
    let store: Arc<dyn PrincipalStore> = match config.database_url.as_deref() {
        Some(url) => {
            let store = PgPrincipalStore::connect(url).await?;
            store.migrate().await?;
            tracing::info!("Using PostgreSQL principal store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; principals are kept in memory only");
            Arc::new(InMemoryPrincipalStore::new())
        }
    };

    let bind_addr = config.bind_addr;
    let app = build_router(AppState::from_config(config, store)?);

    // Start server
    tracing::info!("Server listening on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
