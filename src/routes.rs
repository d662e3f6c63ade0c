use std::sync::Arc;

use axum::{routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    error::{ErrorMessage, HttpError},
    handler::appointments::appointment_handler,
    AppState,
};

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

async fn route_not_found() -> HttpError {
    HttpError::not_found(ErrorMessage::RouteNotFound.to_string())
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_route = Router::new()
        .route("/health", get(health_check))
        .nest("/appointments", appointment_handler())
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state));

    Router::new()
        .nest("/api", api_route)
        .fallback(route_not_found)
}
