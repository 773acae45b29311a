//! Feed webhook endpoint.
//!
//! The vendor posts a JSON notification when a feed export completes. The
//! handler authenticates via the `key` query parameter (constant-time
//! compare), validates the payload, records a queued sync, and writes the
//! job file for the background worker. Everything after the enqueue is
//! the worker's problem; the HTTP status only ever reflects input
//! validity.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use compat_catalog::{product::CatalogStore, webhook::WebhookJob};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WebhookParams {
    pub key: Option<String>,
}

/// Recognized payload fields. `channel_id`, `channel_name`, `user_id`
/// and `digital_asset_export_url` are accepted but unused.
#[derive(Debug, Default)]
struct WebhookPayload {
    publication_status: Option<String>,
    product_feed_export_url: Option<String>,
}

impl WebhookPayload {
    fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let field = |name: &str| {
            object
                .get(name)
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        Some(Self {
            publication_status: field("publication_status"),
            product_feed_export_url: field("product_feed_export_url"),
        })
    }
}

#[utoipa::path(
    post,
    path = "/webhook",
    params(("key" = Option<String>, Query, description = "Shared webhook secret")),
    responses(
        (status = 202, description = "Sync queued", body = Object),
        (status = 200, description = "Ignored non-completed publication", body = Object),
        (status = 400, description = "Malformed payload", body = Object),
        (status = 401, description = "Invalid or missing key", body = Object),
    ),
    tag = "ingestion"
)]
pub async fn receive_webhook(
    State(state): State<AppState>,
    Query(params): Query<WebhookParams>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    // Authentication first; nothing is parsed for unauthenticated calls.
    let authorized = params
        .key
        .as_deref()
        .map(|key| constant_time_eq(key.as_bytes(), state.config.webhook.secret.as_bytes()))
        .unwrap_or(false);
    if !authorized {
        warn!("Webhook rejected: invalid or missing key");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid or missing API key" })),
        );
    }

    let Some(payload) = WebhookPayload::from_value(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Payload must be a JSON object" })),
        );
    };

    match payload.publication_status.as_deref() {
        Some("completed") => {}
        Some(other) => {
            info!("Ignoring webhook with publication_status '{}'", other);
            return (
                StatusCode::OK,
                Json(json!({
                    "status": "ignored",
                    "message": format!("publication_status '{}' is not actioned", other),
                })),
            );
        }
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Missing publication_status" })),
            );
        }
    }

    let Some(feed_url) = payload.product_feed_export_url else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing product_feed_export_url" })),
        );
    };

    let record = match state.store.create_sync("webhook", Some(&feed_url)).await {
        Ok(record) => record,
        Err(e) => {
            error!("Failed to create sync record: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to record sync" })),
            );
        }
    };

    // The job file must exist before we acknowledge; a crash after this
    // point retries the job, never loses it.
    let job = WebhookJob::new(record.id, feed_url);
    if let Err(e) = state.queue.enqueue(&job).await {
        error!("Failed to write webhook queue file: {}", e);
        let _ = state
            .store
            .fail_sync(record.id, "Failed to persist webhook job")
            .await;
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to queue sync" })),
        );
    }

    info!("Webhook accepted; sync #{} queued", record.id);
    (
        StatusCode::ACCEPTED,
        Json(json!({
            "sync_id": record.id,
            "status": "queued",
        })),
    )
}

/// Compare secrets without a data-dependent early exit.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secrez"));
        assert!(!constant_time_eq(b"secret", b"secre"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn payload_parses_recognized_fields() {
        let value = json!({
            "channel_id": "c-1",
            "publication_status": "completed",
            "product_feed_export_url": " https://feeds.example.com/export.xlsx ",
        });
        let payload = WebhookPayload::from_value(&value).unwrap();
        assert_eq!(payload.publication_status.as_deref(), Some("completed"));
        assert_eq!(
            payload.product_feed_export_url.as_deref(),
            Some("https://feeds.example.com/export.xlsx")
        );
    }

    #[test]
    fn payload_rejects_non_objects_and_blank_urls() {
        assert!(WebhookPayload::from_value(&json!([1, 2, 3])).is_none());
        let payload = WebhookPayload::from_value(&json!({
            "publication_status": "completed",
            "product_feed_export_url": "   ",
        }))
        .unwrap();
        assert!(payload.product_feed_export_url.is_none());
    }
}
