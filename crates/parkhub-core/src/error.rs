//! Unified error handling for Parkhub
//!
//! This module provides a comprehensive error type that covers all possible
//! failure scenarios in the application, with automatic HTTP response mapping.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Main application error type
///
/// All errors in the application should be converted to this type.
/// It implements `ResponseError` for automatic HTTP response generation.
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Validation Errors ====================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    // ==================== Resource Errors ====================
    #[error("Slot not found: {0}")]
    SlotNotFound(Uuid),

    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // ==================== State Transition Errors ====================
    #[error("Slot unavailable: {0}")]
    SlotUnavailable(Uuid),

    #[error("Slot is not locked: {0}")]
    NotLocked(Uuid),

    #[error("Conflict: {0}")]
    Conflict(String),

    // ==================== Authorization Errors ====================
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Ownership mismatch: cannot act on another party's booking")]
    OwnershipMismatch,

    // ==================== Payment Gateway Errors ====================
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Webhook signature verification failed: {0}")]
    SignatureInvalid(String),

    // ==================== Internal Errors ====================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation(_)
            | AppError::MissingField(_)
            | AppError::SignatureInvalid(_) => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            AppError::Forbidden(_) | AppError::OwnershipMismatch => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::SlotNotFound(_)
            | AppError::BookingNotFound(_)
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::SlotUnavailable(_)
            | AppError::NotLocked(_)
            | AppError::Conflict(_)
            | AppError::AlreadyExists(_) => StatusCode::CONFLICT,

            // 502 Bad Gateway
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,

            // 500 Internal Server Error
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::MissingField(_) => "missing_field",
            AppError::SlotNotFound(_) => "slot_not_found",
            AppError::BookingNotFound(_) => "booking_not_found",
            AppError::NotFound(_) => "not_found",
            AppError::AlreadyExists(_) => "already_exists",
            AppError::SlotUnavailable(_) => "slot_unavailable",
            AppError::NotLocked(_) => "not_locked",
            AppError::Conflict(_) => "conflict",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::OwnershipMismatch => "ownership_mismatch",
            AppError::Gateway(_) => "gateway_error",
            AppError::SignatureInvalid(_) => "signature_invalid",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
            "status": status.as_u16(),
        });

        HttpResponse::build(status).json(body)
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}
