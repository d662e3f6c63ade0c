use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    db::appointmentdb::SlotWriteError,
    error::{ErrorMessage, FieldViolation, HttpError},
    models::appointmentmodel::AppointmentStatus,
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Appointment {0} not found")]
    AppointmentNotFound(Uuid),

    #[error("Property {0} not found")]
    PropertyNotFound(Uuid),

    #[error("Agent {0} not found")]
    AgentNotFound(Uuid),

    #[error("{message}")]
    InvalidInput {
        message: String,
        errors: Vec<FieldViolation>,
    },

    #[error("Only completed appointments can be rated; appointment {0} is {1:?}")]
    AppointmentNotCompleted(Uuid, AppointmentStatus),

    #[error("Another appointment is already booked for this agent at the requested time")]
    SlotTaken { existing: Uuid },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ServiceError {
    pub fn invalid(message: impl Into<String>, errors: Vec<FieldViolation>) -> Self {
        ServiceError::InvalidInput {
            message: message.into(),
            errors,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::AppointmentNotFound(_)
            | ServiceError::PropertyNotFound(_)
            | ServiceError::AgentNotFound(_) => StatusCode::NOT_FOUND,

            ServiceError::InvalidInput { .. }
            | ServiceError::AppointmentNotCompleted(_, _) => StatusCode::BAD_REQUEST,

            ServiceError::SlotTaken { .. } => StatusCode::CONFLICT,

            ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SlotWriteError> for ServiceError {
    fn from(error: SlotWriteError) -> Self {
        match error {
            SlotWriteError::Taken(existing) => ServiceError::SlotTaken { existing },
            SlotWriteError::Missing(id) => ServiceError::AppointmentNotFound(id),
            SlotWriteError::Database(e) => ServiceError::Database(e),
        }
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        let status = error.status_code();
        match error {
            ServiceError::InvalidInput { message, errors } => HttpError::invalid_fields(message, errors),

            ServiceError::Database(e) => {
                tracing::error!("appointment store failure: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }

            other => HttpError::new(other.to_string(), status),
        }
    }
}
