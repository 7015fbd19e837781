use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct RoasQuery {
    pub organization_id: Option<Uuid>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductRoasItem {
    pub sku: String,
    pub name: String,
    pub total_attributed_spend: Decimal,
    pub total_attributed_revenue: Decimal,
    pub attributed_roas: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// `GET /api/v1/products/roas` — per-product aggregates from the latest run,
/// highest spend first.
pub(super) async fn list_product_roas(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RoasQuery>,
) -> Result<Json<ApiResponse<Vec<ProductRoasItem>>>, ApiError> {
    let Some(organization_id) = query.organization_id else {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "organization_id is required",
        ));
    };

    let rows =
        attrib_db::list_product_roas(&state.pool, organization_id, normalize_limit(query.limit))
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| ProductRoasItem {
            sku: row.sku,
            name: row.name,
            total_attributed_spend: row.total_attributed_spend,
            total_attributed_revenue: row.total_attributed_revenue,
            attributed_roas: row.attributed_roas,
            updated_at: row.updated_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_roas_item_is_serializable() {
        let item = ProductRoasItem {
            sku: "KIT-CHAVEIRO-10".to_string(),
            name: "Kit Chaveiro 10un".to_string(),
            total_attributed_spend: Decimal::new(3000, 2),
            total_attributed_revenue: Decimal::new(4000, 2),
            attributed_roas: Decimal::new(13333, 4),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&item).expect("serialize roas item");
        assert!(json.contains("\"sku\":\"KIT-CHAVEIRO-10\""));
        // serde-with-str renders Decimal as a string.
        assert!(json.contains("\"attributed_roas\":\"1.3333\""));
    }
}
