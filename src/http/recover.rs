//! Panic isolation.
//!
//! The outermost pipeline stage. A panic anywhere below it becomes a 500
//! with `Connection: close` and `Vary: Authorization` for that one request; the task serving the
//! connection and every other in-flight request carry on.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::FutureExt;

use crate::http::response::ApiError;
use crate::observability::metrics;

pub async fn recover_panic(request: Request, next: Next) -> Response {
    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            metrics::record_panic_recovered();
            let detail = format!("panic: {}", panic_message(payload.as_ref()));
            let mut response = ApiError::Internal(detail).into_response();
            let headers = response.headers_mut();
            headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
            // Unwinding skipped the authentication stage that normally sets this.
            headers.insert(header::VARY, HeaderValue::from_static("Authorization"));
            response
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
