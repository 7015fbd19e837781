use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct ConversionsQuery {
    pub organization_id: Option<Uuid>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct ConversionItem {
    pub order_id: i64,
    pub campaign_id: String,
    pub campaign_name: String,
    pub platform: String,
    pub product_sku: String,
    pub attributed_spend: Decimal,
    pub order_value: Decimal,
    pub quantity: i32,
    pub attribution_method: String,
    pub attribution_weight: Decimal,
    pub conversion_date: NaiveDate,
}

/// `GET /api/v1/conversions` — most recent attributed conversions.
pub(super) async fn list_conversions(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ConversionsQuery>,
) -> Result<Json<ApiResponse<Vec<ConversionItem>>>, ApiError> {
    let Some(organization_id) = query.organization_id else {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "organization_id is required",
        ));
    };

    let rows = attrib_db::list_recent_conversions(
        &state.pool,
        organization_id,
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| ConversionItem {
            order_id: row.order_id,
            campaign_id: row.campaign_id,
            campaign_name: row.campaign_name,
            platform: row.platform,
            product_sku: row.product_sku,
            attributed_spend: row.attributed_spend,
            order_value: row.order_value,
            quantity: row.quantity,
            attribution_method: row.attribution_method,
            attribution_weight: row.attribution_weight,
            conversion_date: row.conversion_date,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
