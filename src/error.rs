use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::ValidationErrors;

/// A single rejected request field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldViolation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Flattens validator output into one entry per failed rule, ordered by field.
pub fn field_violations(errors: &ValidationErrors) -> Vec<FieldViolation> {
    let mut violations: Vec<FieldViolation> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            let field = camel_case(field);
            errs.iter().map(move |e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                FieldViolation::new(field.clone(), message)
            })
        })
        .collect();

    violations.sort_by(|a, b| a.field.cmp(&b.field));
    violations
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldViolation>>,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_json::to_string(&self).map_err(|_| fmt::Error)?)
    }
}

#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    ServerError,
    InvalidToken,
    TokenExpired,
    TokenNotProvided,
    UserNoLongerExist,
    UserNotAuthenticated,
    AccountInactive,
    PermissionDenied,
    InvalidAppointmentData,
    RouteNotFound,
}

impl ToString for ErrorMessage {
    fn to_string(&self) -> String {
        self.to_str().to_owned()
    }
}

impl ErrorMessage {
    fn to_str(&self) -> &'static str {
        match self {
            ErrorMessage::ServerError => "Server Error. Please try again later",
            ErrorMessage::InvalidToken => "Authentication token is invalid",
            ErrorMessage::TokenExpired => "Authentication token has expired",
            ErrorMessage::TokenNotProvided => "You are not logged in, please provide a token",
            ErrorMessage::UserNoLongerExist => "User belonging to this token no longer exists",
            ErrorMessage::UserNotAuthenticated => "Authentication required. Please log in.",
            ErrorMessage::AccountInactive => "Your account is inactive or banned",
            ErrorMessage::PermissionDenied => "You are not allowed to perform this action",
            ErrorMessage::InvalidAppointmentData => "Invalid appointment data",
            ErrorMessage::RouteNotFound => "Route not found",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpError {
    pub message: String,
    pub status: StatusCode,
    pub errors: Vec<FieldViolation>,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        HttpError {
            message: message.into(),
            status,
            errors: Vec::new(),
        }
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::BAD_REQUEST)
    }

    pub fn invalid_fields(message: impl Into<String>, errors: Vec<FieldViolation>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::BAD_REQUEST,
            errors,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::UNAUTHORIZED)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::FORBIDDEN)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::NOT_FOUND)
    }

    /// Taxonomy label carried in the `type` field of the failure body.
    pub fn kind(&self) -> &'static str {
        match self.status {
            StatusCode::BAD_REQUEST => "InvalidInput",
            StatusCode::UNAUTHORIZED => "Unauthorized",
            StatusCode::FORBIDDEN => "Forbidden",
            StatusCode::NOT_FOUND => "NotFound",
            StatusCode::CONFLICT => "Conflict",
            _ => "ServerError",
        }
    }

    pub fn into_http_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error_type: self.kind().to_string(),
            errors: if self.errors.is_empty() { None } else { Some(self.errors) },
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HttpError: message: {}, status: {}",
            self.message, self.status
        )
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 2, message = "too short"))]
        full_name: String,
        #[validate(email(message = "bad email"))]
        email: String,
    }

    #[test]
    fn collects_every_failed_field() {
        let probe = Probe {
            full_name: "a".to_string(),
            email: "nope".to_string(),
        };
        let errors = probe.validate().unwrap_err();
        let violations = field_violations(&errors);

        assert_eq!(
            violations,
            vec![
                FieldViolation::new("email", "bad email"),
                FieldViolation::new("fullName", "too short"),
            ]
        );
    }

    #[test]
    fn camel_cases_field_names() {
        assert_eq!(camel_case("appointment_date"), "appointmentDate");
        assert_eq!(camel_case("propertyId"), "propertyId");
        assert_eq!(camel_case("name"), "name");
    }

    #[test]
    fn status_codes_map_to_taxonomy() {
        assert_eq!(HttpError::bad_request("x").kind(), "InvalidInput");
        assert_eq!(HttpError::unauthorized("x").kind(), "Unauthorized");
        assert_eq!(HttpError::forbidden("x").kind(), "Forbidden");
        assert_eq!(HttpError::not_found("x").kind(), "NotFound");
        assert_eq!(HttpError::new("x", StatusCode::CONFLICT).kind(), "Conflict");
        assert_eq!(HttpError::server_error("x").kind(), "ServerError");
    }
}
