use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::controller::AppState;
use crate::models::reservation::{Reservation, ReservationInput};
use crate::repositories::reservation_repo::ReservationStore;
use crate::workflow::{ApprovalCoordinator, WorkflowError};

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/", post(create_reservation))
        .route("/", get(list_reservations))
        .route("/:reservation_id", get(get_reservation))
        .route_layer(Extension(app_state.coordinator))
        .route_layer(Extension(app_state.store))
}

pub async fn create_reservation(
    Extension(coordinator): Extension<Arc<ApprovalCoordinator>>,
    Json(body): Json<ReservationInput>,
) -> impl IntoResponse {
    let submit_res = coordinator.submit(body).await;

    return match submit_res {
        Ok(reservation) => {
            (
                StatusCode::CREATED,
                json!({
                    "status": "success",
                    "message": "Reservation created",
                    "reservation_id": reservation.id
                }).to_string(),
            ).into_response()
        }
        Err(WorkflowError::Validation(field)) => {
            (
                StatusCode::BAD_REQUEST,
                json!({
                    "status": "error",
                    "message": format!("Missing fields: {}", field)
                }).to_string(),
            ).into_response()
        }
        Err(e) => {
            warn!("Something went wrong creating the reservation due to: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"status": "error", "message": "Internal server error"}).to_string(),
            ).into_response()
        }
    };
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GetReservationQuery {
    pub token: Option<Uuid>,
}

pub async fn get_reservation(
    Extension(store): Extension<Arc<dyn ReservationStore>>,
    Path(reservation_id): Path<Uuid>,
    Query(query): Query<GetReservationQuery>,
) -> impl IntoResponse {
    let Some(token) = query.token else {
        return (
            StatusCode::UNAUTHORIZED,
            json!({"status": "error", "message": "Token is required"}).to_string(),
        ).into_response();
    };

    return match store.get(reservation_id).await {
        Ok(Some(reservation)) if reservation.token == token => {
            (
                StatusCode::OK,
                json!({"status": "success", "data": reservation_view(&reservation)}).to_string(),
            ).into_response()
        }
        Ok(_) => {
            (
                StatusCode::NOT_FOUND,
                json!({
                    "status": "error",
                    "message": "Reservation not found or invalid token"
                }).to_string(),
            ).into_response()
        }
        Err(e) => {
            warn!("Something went wrong retrieving reservation {} due to: {}", reservation_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"status": "error", "message": "Internal server error"}).to_string(),
            ).into_response()
        }
    };
}

pub async fn list_reservations(
    Extension(store): Extension<Arc<dyn ReservationStore>>,
) -> impl IntoResponse {
    return match store.list().await {
        Ok(reservations) => {
            let summaries: Vec<serde_json::Value> = reservations
                .iter()
                .map(|reservation| {
                    json!({
                        "id": reservation.id,
                        "name": reservation.name,
                        "date": reservation.date,
                        "time": reservation.time,
                        "diners": reservation.diners,
                        "status": reservation.status
                    })
                })
                .collect();

            (
                StatusCode::OK,
                json!({
                    "status": "success",
                    "count": summaries.len(),
                    "data": summaries
                }).to_string(),
            ).into_response()
        }
        Err(e) => {
            warn!("Something went wrong listing reservations due to: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"status": "error", "message": "Internal server error"}).to_string(),
            ).into_response()
        }
    };
}

fn reservation_view(reservation: &Reservation) -> serde_json::Value {
    json!({
        "name": reservation.name,
        "email": reservation.email,
        "phone": reservation.phone,
        "date": reservation.date,
        "time": reservation.time,
        "diners": reservation.diners,
        "seating": reservation.seating,
        "pickup": reservation.pickup,
        "status": reservation.status,
        "denial_reason": reservation.denial_reason
    })
}
