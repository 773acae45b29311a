//! Compatibility lookup endpoint.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::{error::ApiError, state::AppState};

#[utoipa::path(
    get,
    path = "/compatible/{sku}",
    params(("sku" = String, Path, description = "Product SKU, case-insensitive")),
    responses(
        (status = 200, description = "Product with categorized compatible partners", body = Object),
        (status = 404, description = "Unknown SKU", body = Object),
        (status = 400, description = "Malformed SKU", body = Object),
    ),
    tag = "compatibility"
)]
pub async fn compatible_products(
    State(state): State<AppState>,
    Path(sku): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.lookup.lookup(&sku).await?;

    if result.product.is_none() {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("No product found for SKU {}", sku.trim().to_uppercase()) })),
        ));
    }

    Ok((StatusCode::OK, Json(json!(&*result))))
}
