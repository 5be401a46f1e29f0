use std::sync::Arc;

use salon_automations::{
    auth::{CronSecret, TokenService},
    automations::{
        scheduler, AutomationEngine, HttpDispatcher, LogDispatcher, MessageDispatcher,
        PgAutomationStore,
    },
    config::Config,
    create_router, db,
    finance::{FinanceService, PgFinanceStore},
    metrics::ServiceMetrics,
    AppState,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Salon back office - Starting...");

    let config = Config::from_env().expect("Invalid configuration");

    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("Failed to create database pool");

    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let dispatcher: Arc<dyn MessageDispatcher> = match config.notify_api_url.as_deref() {
        Some(url) => {
            tracing::info!("Dispatching automation messages to {}", url);
            Arc::new(
                HttpDispatcher::new(url, config.notify_api_key.clone(), config.dispatch_timeout)
                    .expect("Failed to build notification client"),
            )
        }
        None => {
            tracing::warn!("NOTIFY_API_URL not set; automation messages will only be logged");
            Arc::new(LogDispatcher::new())
        }
    };

    let metrics = ServiceMetrics::new();
    let automation_store = Arc::new(PgAutomationStore::new(db_pool.clone()));

    let engine = Arc::new(
        AutomationEngine::new(automation_store.clone(), automation_store, dispatcher)
            .with_metrics(metrics.clone())
            .with_dispatch_timeout(config.dispatch_timeout)
            .with_concurrency(config.automation_concurrency),
    );

    let finance = Arc::new(
        FinanceService::new(Arc::new(PgFinanceStore::new(db_pool))).with_metrics(metrics.clone()),
    );

    if config.cron_secret.is_none() {
        tracing::warn!("CRON_SECRET not set; POST /api/automations/execute accepts any caller");
    }

    if let Some(period) = config.automation_interval {
        scheduler::spawn(engine.clone(), period);
    }

    let state = AppState {
        engine,
        finance,
        tokens: Arc::new(TokenService::new(&config.jwt_secret)),
        cron_secret: config.cron_secret.as_deref().map(CronSecret::new),
        metrics,
    };

    let app = create_router(state);

    let addr = config.bind_address();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Back office API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
