use std::net::SocketAddr;
use std::sync::Arc;

use recruiting_pipeline::{
    config::{Config, LogFormat, StoreBackend},
    database::{
        memory::MemoryPipelineRepository,
        pool::{create_pool, run_migrations},
        postgres::PgPipelineRepository,
        repository::PipelineRepository,
    },
    routes, AppState,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let repo: Arc<dyn PipelineRepository> = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = create_pool(&config).await?;
            run_migrations(&pool).await?;
            info!("Database migrations applied");
            Arc::new(PgPipelineRepository::new(pool, config.lock_timeout_ms))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; all pipeline data is lost on restart");
            Arc::new(MemoryPipelineRepository::new())
        }
    };

    if config.notification_webhook_url.is_none() {
        info!("NOTIFICATION_WEBHOOK_URL not set, stage change notifications are disabled");
    }

    let app_state = AppState::new(repo, &config)?;
    let app = routes::router(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
