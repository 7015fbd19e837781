use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct RunRequest {
    pub organization_id: Option<Uuid>,
    pub days_back: Option<i64>,
}

/// Wire shape of a successful run, kept compatible with the callers of the
/// original serverless function.
#[derive(Debug, Serialize)]
pub(super) struct RunResponse {
    pub success: bool,
    pub message: String,
    pub attributed: usize,
    pub orders_processed: usize,
}

#[derive(Debug, Serialize)]
pub(super) struct RunErrorBody {
    pub error: String,
}

/// `POST /api/v1/attribution/run` — one synchronous attribution pass.
///
/// Missing `organization_id` and invalid `days_back` are rejected with 400;
/// data-access failures surface as 500 with an opaque `error` string. Early
/// exits (no links / no orders) are 200 with `attributed: 0`.
pub(super) async fn trigger_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<RunRequest>,
) -> Response {
    let Some(organization_id) = request.organization_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(RunErrorBody {
                error: "organization_id is required".to_string(),
            }),
        )
            .into_response();
    };

    let days_back = match attrib_engine::validate_days_back(request.days_back) {
        Ok(days) => days,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(RunErrorBody {
                    error: e.to_string(),
                }),
            )
                .into_response();
        }
    };

    match attrib_engine::run_attribution(&state.pool, organization_id, days_back, "api").await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(RunResponse {
                success: true,
                message: outcome.message,
                attributed: outcome.attributed,
                orders_processed: outcome.orders_processed,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(request_id = %req_id.0, error = %e, "attribution run failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RunErrorBody {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct RunsQuery {
    pub organization_id: Option<Uuid>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct AttributionRunItem {
    pub attribution_run_id: Uuid,
    pub trigger_source: String,
    pub status: String,
    pub days_back: i32,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub conversions_generated: i32,
    pub orders_processed: i32,
    pub total_attributed_spend: Decimal,
    pub total_attributed_revenue: Decimal,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// `GET /api/v1/attribution/runs` — run history, newest first.
pub(super) async fn list_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<ApiResponse<Vec<AttributionRunItem>>>, ApiError> {
    let Some(organization_id) = query.organization_id else {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "organization_id is required",
        ));
    };

    let rows = attrib_db::list_attribution_runs(
        &state.pool,
        organization_id,
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| AttributionRunItem {
            attribution_run_id: row.public_id,
            trigger_source: row.trigger_source,
            status: row.status,
            days_back: row.days_back,
            window_start: row.window_start,
            window_end: row.window_end,
            conversions_generated: row.conversions_generated,
            orders_processed: row.orders_processed,
            total_attributed_spend: row.total_attributed_spend,
            total_attributed_revenue: row.total_attributed_revenue,
            started_at: row.started_at,
            completed_at: row.completed_at,
            error_message: row.error_message,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
