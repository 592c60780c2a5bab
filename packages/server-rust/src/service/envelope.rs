//! Uniform JSON response envelope.

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use topo_core::codes;
use tracing::error;

/// `{ "result", "code", "message", "data" }` written for every request.
///
/// All four fields are always serialized; absent values are `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T = Value> {
    pub result: bool,
    pub code: i32,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Success envelope: `result=true`, `code=0`, `message="success"`.
    pub fn success(data: T) -> Self {
        Self {
            result: true,
            code: codes::CC_SUCCESS,
            message: Some(codes::CC_SUCCESS_STR.to_string()),
            data: Some(data),
        }
    }

    /// Failure envelope. A `code` of 0 is never produced here.
    pub fn failure(code: i32, message: impl Into<String>) -> Self {
        Self {
            result: false,
            code,
            message: Some(message.into()),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    /// Writes the envelope as `application/json`. If the envelope cannot be
    /// serialized the error is logged and the body is left empty.
    fn into_response(self) -> Response {
        let content_type = [(CONTENT_TYPE, HeaderValue::from_static("application/json"))];
        match serde_json::to_vec(&self) {
            Ok(body) => (content_type, body).into_response(),
            Err(err) => {
                error!("failed to send response, error info is {}", err);
                (content_type, Body::empty()).into_response()
            }
        }
    }
}
