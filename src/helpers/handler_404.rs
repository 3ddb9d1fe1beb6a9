use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

pub async fn page_not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        json!({
            "status": "error",
            "message": "Endpoint not found",
            "valid_endpoints": [
                "/api/reservations",
                "/api/reservations/<id>",
                "/telegram-callback",
                "/health"
            ]
        }).to_string(),
    )
}
