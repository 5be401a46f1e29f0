// HTTP handlers for automation execution and inspection

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminUser, CronCaller};
use crate::automations::{
    engine::{AutomationPreview, PassReport},
    models::ExecutionRecord,
};
use crate::error::{ok, ApiError, Envelope};
use crate::AppState;

const DEFAULT_EXECUTION_LIMIT: i64 = 50;

/// Query parameters for listing executions
#[derive(Debug, Deserialize, Validate, IntoParams, ToSchema)]
pub struct ExecutionsQuery {
    /// Maximum records to return (1-500, default 50)
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<i64>,
}

/// Handler for POST /api/automations/execute
/// Runs one pass over all active automations (scheduler only)
#[utoipa::path(
    post,
    path = "/api/automations/execute",
    responses(
        (status = 200, description = "Pass completed; per-automation errors are listed in the report", body = PassReport),
        (status = 401, description = "Missing or wrong scheduler secret"),
        (status = 500, description = "Active automations could not be loaded")
    ),
    security(("cron_secret" = [])),
    tag = "automations"
)]
pub async fn execute_automations(
    State(state): State<AppState>,
    _caller: CronCaller,
) -> Result<Json<Envelope<PassReport>>, ApiError> {
    tracing::debug!("Automation pass requested");
    let report = state.engine.run_pass(Utc::now()).await?;
    Ok(ok(report))
}

/// Handler for GET /api/admin/automations/{id}/executions
/// Lists recent execution records, newest first (Admin only)
#[utoipa::path(
    get,
    path = "/api/admin/automations/{id}/executions",
    params(
        ("id" = Uuid, Path, description = "Automation id"),
        ExecutionsQuery
    ),
    responses(
        (status = 200, description = "Recent executions", body = Vec<ExecutionRecord>),
        (status = 400, description = "Invalid limit"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an administrator")
    ),
    security(("bearer_auth" = [])),
    tag = "automations"
)]
pub async fn list_executions(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(automation_id): Path<Uuid>,
    Query(query): Query<ExecutionsQuery>,
) -> Result<Json<Envelope<Vec<ExecutionRecord>>>, ApiError> {
    query.validate()?;
    let limit = query.limit.unwrap_or(DEFAULT_EXECUTION_LIMIT);

    tracing::debug!(
        "Admin {} listing executions for automation {} (limit {})",
        admin.user_id,
        automation_id,
        limit
    );

    let records = state
        .engine
        .executions()
        .recent_executions(automation_id, limit)
        .await?;

    Ok(ok(records))
}

/// Handler for POST /api/admin/automations/{id}/preview
/// Evaluates an automation now and renders its messages without sending (Admin only)
#[utoipa::path(
    post,
    path = "/api/admin/automations/{id}/preview",
    params(("id" = Uuid, Path, description = "Automation id")),
    responses(
        (status = 200, description = "Dry-run result", body = AutomationPreview),
        (status = 400, description = "Automation has an unknown trigger type or an invalid trigger configuration"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Automation not found")
    ),
    security(("bearer_auth" = [])),
    tag = "automations"
)]
pub async fn preview_automation(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(automation_id): Path<Uuid>,
) -> Result<Json<Envelope<AutomationPreview>>, ApiError> {
    tracing::debug!("Admin {} previewing automation {}", admin.user_id, automation_id);
    let preview = state.engine.preview(automation_id, Utc::now()).await?;
    Ok(ok(preview))
}
