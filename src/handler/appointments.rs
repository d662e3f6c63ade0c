use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query,
    },
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put, MethodRouter},
    Extension, Json, Router,
};

use crate::{
    dtos::appointmentdtos::{
        AppointmentQueryDto, AssignAgentDto, CleanupDto, CreateAppointmentDto, FeedbackDto,
        RescheduleAppointmentDto, UpdateStatusDto,
    },
    error::HttpError,
    middleware::{auth, role_check, JWTAuthMiddeware},
    models::usermodel::UserRole,
    service::appointment_service::parse_appointment_id,
    AppState,
};

/// Wraps a route so that only authenticated admins reach it.
fn admin_only(route: MethodRouter) -> MethodRouter {
    route
        .layer(middleware::from_fn(|state, req, next| {
            role_check(state, req, next, vec![UserRole::Admin])
        }))
        .layer(middleware::from_fn(auth))
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, HttpError> {
    body.map(|Json(body)| body)
        .map_err(|e| HttpError::bad_request(e.body_text()))
}

pub fn appointment_handler() -> Router {
    Router::new()
        .route("/", post(create_appointment))
        .route("/", admin_only(get(get_appointments)))
        .route("/stats/overview", admin_only(get(get_appointment_stats)))
        .route("/daily/:date", admin_only(get(get_daily_appointments)))
        .route("/maintenance/cleanup", admin_only(post(cleanup_appointments)))
        .route("/:appointment_id", admin_only(get(get_appointment)))
        .route("/:appointment_id", admin_only(delete(delete_appointment)))
        .route("/:appointment_id/status", admin_only(put(update_appointment_status)))
        .route("/:appointment_id/assign", admin_only(put(assign_appointment_agent)))
        .route("/:appointment_id/reschedule", admin_only(put(reschedule_appointment)))
        .route("/:appointment_id/feedback", post(submit_feedback))
}

pub async fn create_appointment(
    Extension(app_state): Extension<Arc<AppState>>,
    body: Result<Json<CreateAppointmentDto>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let body = json_body(body)?;

    let appointment = app_state.appointment_service.book(body).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "message": "Appointment booked successfully, we will contact you to confirm it",
            "data": {
                "appointment": appointment
            }
        })),
    ))
}

pub async fn get_appointments(
    Extension(app_state): Extension<Arc<AppState>>,
    query: Result<Query<AppointmentQueryDto>, QueryRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let Query(query) = query.map_err(|e| HttpError::bad_request(e.body_text()))?;

    let page = app_state.appointment_service.list(query).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": page
    })))
}

pub async fn get_appointment(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(appointment_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let appointment_id = parse_appointment_id(&appointment_id)?;

    let appointment = app_state.appointment_service.get(appointment_id).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "appointment": appointment
        }
    })))
}

pub async fn update_appointment_status(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(admin): Extension<JWTAuthMiddeware>,
    Path(appointment_id): Path<String>,
    body: Result<Json<UpdateStatusDto>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let appointment_id = parse_appointment_id(&appointment_id)?;
    let body = json_body(body)?;

    let appointment = app_state
        .appointment_service
        .update_status(appointment_id, body)
        .await?;

    tracing::debug!("status of {} changed by admin {}", appointment_id, admin.user.id);

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Appointment status updated successfully",
        "data": {
            "appointment": appointment
        }
    })))
}

pub async fn assign_appointment_agent(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(appointment_id): Path<String>,
    body: Result<Json<AssignAgentDto>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let appointment_id = parse_appointment_id(&appointment_id)?;
    let body = json_body(body)?;

    let appointment = app_state
        .appointment_service
        .assign_agent(appointment_id, body)
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Appointment assigned successfully",
        "data": {
            "appointment": appointment
        }
    })))
}

pub async fn reschedule_appointment(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(appointment_id): Path<String>,
    body: Result<Json<RescheduleAppointmentDto>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let appointment_id = parse_appointment_id(&appointment_id)?;
    let body = json_body(body)?;

    let appointment = app_state
        .appointment_service
        .reschedule(appointment_id, body)
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Appointment rescheduled successfully",
        "data": {
            "appointment": appointment
        }
    })))
}

pub async fn submit_feedback(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(appointment_id): Path<String>,
    body: Result<Json<FeedbackDto>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let appointment_id = parse_appointment_id(&appointment_id)?;
    let body = json_body(body)?;

    let appointment = app_state
        .appointment_service
        .submit_feedback(appointment_id, body)
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Feedback submitted successfully",
        "data": {
            "appointment": appointment
        }
    })))
}

pub async fn delete_appointment(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(appointment_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let appointment_id = parse_appointment_id(&appointment_id)?;

    app_state.appointment_service.delete(appointment_id).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Appointment deleted successfully"
    })))
}

pub async fn get_daily_appointments(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let day = app_state.appointment_service.daily(&date).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": day
    })))
}

pub async fn get_appointment_stats(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let stats = app_state.appointment_service.stats().await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": stats
    })))
}

pub async fn cleanup_appointments(
    Extension(app_state): Extension<Arc<AppState>>,
    body: Result<Json<CleanupDto>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let body = json_body(body)?;

    let result = app_state.appointment_service.cleanup_completed(body).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("Removed {} completed appointment(s)", result.deleted_count),
        "data": result
    })))
}
