// HTTP handler for the finance summary

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;

use crate::auth::AdminUser;
use crate::error::{ok, ApiError, Envelope};
use crate::finance::{models::FinanceSummary, period::SummaryQuery};
use crate::AppState;

/// Handler for GET /api/admin/finance/summary
/// Revenue summary for a period, or all time when no dates are given (Admin only)
#[utoipa::path(
    get,
    path = "/api/admin/finance/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Finance summary", body = FinanceSummary),
        (status = 400, description = "Invalid date or range"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an administrator"),
        (status = 500, description = "Ledger could not be read")
    ),
    security(("bearer_auth" = [])),
    tag = "finance"
)]
pub async fn finance_summary(
    State(state): State<AppState>,
    admin: AdminUser,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<Envelope<FinanceSummary>>, ApiError> {
    tracing::debug!(
        "Admin {} requested finance summary ({:?} to {:?})",
        admin.user_id,
        query.start_date,
        query.end_date
    );

    let summary = state.finance.summary(&query, Utc::now()).await?;
    Ok(ok(summary))
}
