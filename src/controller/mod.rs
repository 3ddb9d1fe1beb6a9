use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use axum::Router;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::Config;
use crate::helpers::handler_404::page_not_found_handler;
use crate::notifier::telegram::TelegramConsole;
use crate::repositories::reservation_repo::ReservationStore;
use crate::workflow::ApprovalCoordinator;

pub mod health_check;
pub mod operator_callback_controller;
pub mod reservation_controller;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ApprovalCoordinator>,
    pub store: Arc<dyn ReservationStore>,
    pub console: Arc<TelegramConsole>,
}

pub async fn serve(
    app_state: AppState,
    config: &Config,
) -> anyhow::Result<()> {
    let origins: Vec<HeaderValue> = config
        .origin_urls
        .split(',')
        .map(|s| s.parse().context("Invalid origin URL"))
        .collect::<anyhow::Result<Vec<HeaderValue>>>()?;

    let application = router_endpoints(app_state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    CorsLayer::new()
                        .allow_methods([
                            Method::GET,
                            Method::POST,
                            Method::PUT,
                            Method::DELETE,
                            Method::OPTIONS
                        ])
                        .allow_origin(origins)
                        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                )
        )
        .fallback(page_not_found_handler);

    let port = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("API server listening on port: {}", port);
    axum::Server::bind(&port)
        .serve(application.into_make_service())
        .await
        .context("Error spinning up the API server")
}

pub fn router_endpoints(app_state: AppState) -> Router {
    health_check::router(app_state.clone())
        .nest(
            "/api/reservations",
            reservation_controller::router(app_state.clone()),
        )
        .merge(operator_callback_controller::router(app_state))
}
