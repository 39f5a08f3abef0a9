//! Error responses.
//!
//! # Responsibilities
//! - Map every failure a handler or stage can classify to a status code
//! - Render it as `{"error": ...}` through the JSON codec
//! - Keep internal fault detail in the logs, never in the response body

use std::collections::BTreeMap;
use std::fmt;

use axum::{
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use thiserror::Error;

use crate::data::StoreError;
use crate::http::json::{write_json, DecodeError, EncodeError, Envelope};

/// A request failure, rendered as a JSON error envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("failed validation")]
    FailedValidation(BTreeMap<String, String>),

    #[error("the requested resource could not be found")]
    NotFound,

    #[error("the {0} method is not supported for this resource")]
    MethodNotAllowed(Method),

    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,

    #[error("invalid authentication credentials")]
    InvalidCredentials,

    #[error("invalid or missing authentication token")]
    InvalidAuthenticationToken,

    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,

    #[error("your user account must be activated to access this resource")]
    InactiveAccount,

    #[error("your user account doesn't have the necessary permissions to access this resource")]
    NotPermitted,

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// Detail is logged, the client only sees the generic message.
    #[error("the server encountered a problem and could not process your request")]
    Internal(String),
}

impl ApiError {
    pub fn internal(err: impl fmt::Display) -> Self {
        ApiError::Internal(err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::EditConflict => StatusCode::CONFLICT,
            ApiError::InvalidCredentials
            | ApiError::InvalidAuthenticationToken
            | ApiError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            ApiError::InactiveAccount | ApiError::NotPermitted => StatusCode::FORBIDDEN,
            ApiError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> Value {
        match self {
            ApiError::FailedValidation(errors) => Value::Object(
                errors
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
            other => Value::String(other.to_string()),
        }
    }
}

impl From<DecodeError> for ApiError {
    fn from(err: DecodeError) -> Self {
        if err.is_client_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl From<EncodeError> for ApiError {
    fn from(err: EncodeError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EditConflict => ApiError::EditConflict,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(error = %detail, "Internal server error");
        }

        let mut headers = HeaderMap::new();
        if matches!(self, ApiError::InvalidAuthenticationToken) {
            headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        let envelope = Envelope::new().with("error", self.detail());
        match write_json(self.status(), &envelope, headers) {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(error = %err, "Failed to encode error response");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
