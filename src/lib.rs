// Salon marketplace back office: marketing automation engine and finance ledger summaries

pub mod auth;
pub mod automations;
pub mod config;
pub mod db;
pub mod error;
pub mod finance;
pub mod metrics;

use std::sync::Arc;

use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi, ToSchema,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{AdminUser, CronSecret, TokenService};
use crate::automations::AutomationEngine;
use crate::error::{ok, Envelope};
use crate::finance::FinanceService;
use crate::metrics::{MetricsSnapshot, ServiceMetrics};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        automations::handlers::execute_automations,
        automations::handlers::list_executions,
        automations::handlers::preview_automation,
        finance::handlers::finance_summary,
        get_metrics,
        health,
    ),
    components(
        schemas(
            automations::PassReport,
            automations::PassError,
            automations::AutomationPreview,
            automations::engine::PreviewMessage,
            automations::template::RenderedMessage,
            automations::ExecutionRecord,
            automations::TriggerType,
            automations::ActionType,
            automations::ContactChannel,
            automations::TriggerWindow,
            automations::handlers::ExecutionsQuery,
            finance::FinanceSummary,
            finance::TypeBreakdown,
            finance::PeriodEcho,
            finance::TransactionType,
            finance::SummaryQuery,
            MetricsSnapshot,
            HealthStatus,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "automations", description = "Marketing automation passes and inspection"),
        (name = "finance", description = "Ledger revenue summaries"),
        (name = "operations", description = "Health and service metrics")
    ),
    info(
        title = "Salon Marketplace Back Office API",
        version = "0.1.0",
        description = "Automation trigger engine and finance ledger aggregator"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "cron_secret",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AutomationEngine>,
    pub finance: Arc<FinanceService>,
    pub tokens: Arc<TokenService>,
    /// `None` leaves the execution endpoint open
    pub cron_secret: Option<CronSecret>,
    pub metrics: ServiceMetrics,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: &'static str,
}

/// Handler for GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthStatus)),
    tag = "operations"
)]
async fn health() -> Json<Envelope<HealthStatus>> {
    ok(HealthStatus { status: "ok" })
}

/// Handler for GET /api/admin/metrics
/// Process-local counters for passes, dispatches and summaries (Admin only)
#[utoipa::path(
    get,
    path = "/api/admin/metrics",
    responses(
        (status = 200, description = "Metrics snapshot", body = MetricsSnapshot),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an administrator")
    ),
    security(("bearer_auth" = [])),
    tag = "operations"
)]
async fn get_metrics(
    axum::extract::State(state): axum::extract::State<AppState>,
    _admin: AdminUser,
) -> Json<Envelope<MetricsSnapshot>> {
    ok(state.metrics.snapshot())
}

/// Creates and configures the application router
/// Maps all API endpoints to their handlers and adds CORS and request tracing
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health))
        .route(
            "/api/automations/execute",
            post(automations::handlers::execute_automations),
        )
        .route(
            "/api/admin/automations/:id/executions",
            get(automations::handlers::list_executions),
        )
        .route(
            "/api/admin/automations/:id/preview",
            post(automations::handlers::preview_automation),
        )
        .route(
            "/api/admin/finance/summary",
            get(finance::handlers::finance_summary),
        )
        .route("/api/admin/metrics", get(get_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
