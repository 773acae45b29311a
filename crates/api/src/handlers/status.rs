//! Sync status endpoint: one record by id, or the most recent N.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use compat_catalog::product::CatalogStore;
use serde::Deserialize;
use serde_json::json;

use crate::{error::ApiError, state::AppState};

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub sync_id: Option<i64>,
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/status",
    params(
        ("sync_id" = Option<i64>, Query, description = "Return a single sync record"),
        ("limit" = Option<i64>, Query, description = "Return the most recent N records"),
    ),
    responses(
        (status = 200, description = "Sync record(s)", body = Object),
        (status = 404, description = "Unknown sync id", body = Object),
    ),
    tag = "ingestion"
)]
pub async fn sync_status(
    State(state): State<AppState>,
    Query(params): Query<StatusParams>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(sync_id) = params.sync_id {
        return match state.store.get_sync(sync_id).await? {
            Some(record) => Ok((StatusCode::OK, Json(json!(record)))),
            None => Ok((
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("No sync record with id {sync_id}") })),
            )),
        };
    }

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let records = state.store.recent_syncs(limit).await?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "total_returned": records.len(),
            "syncs": records,
        })),
    ))
}
