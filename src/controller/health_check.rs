use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::controller::AppState;
use crate::repositories::reservation_repo::ReservationStore;

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(get_health_check))
        .route_layer(Extension(app_state.store))
}

/// Probes the store with a cheap point read so a dead database shows up here
/// before it shows up in a customer submission.
async fn get_health_check(
    Extension(store): Extension<Arc<dyn ReservationStore>>,
) -> impl IntoResponse {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();

    return match store.get(Uuid::nil()).await {
        Ok(_) => {
            (
                StatusCode::OK,
                json!({
                    "status": "running",
                    "service": "Reservation System",
                    "timestamp": timestamp,
                    "database": "connected"
                }).to_string(),
            ).into_response()
        }
        Err(e) => {
            warn!("Database connection failed due to: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "status": "error",
                    "timestamp": timestamp,
                    "database": "disconnected"
                }).to_string(),
            ).into_response()
        }
    };
}
