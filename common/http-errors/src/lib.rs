use axum::{http::{StatusCode, HeaderValue}, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub trace_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")] pub message: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    Forbidden { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    BadRequest { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    NotFound { code: &'static str, trace_id: Option<Uuid> },
    Conflict { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    Internal { trace_id: Option<Uuid>, message: Option<String> },
}

impl ApiError {
    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        Self::Unauthorized { code, trace_id: None, message: Some(message.into()) }
    }
    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        Self::Forbidden { code, trace_id: None, message: Some(message.into()) }
    }
    pub fn bad_request(code: &'static str, trace_id: Option<Uuid>) -> Self {
        Self::BadRequest { code, trace_id, message: None }
    }
    pub fn internal<E: std::fmt::Display>(e: E, trace_id: Option<Uuid>) -> Self {
        Self::Internal { trace_id, message: Some(e.to_string()) }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body, error_code) = match self {
            ApiError::Unauthorized { code, trace_id, message } => (
                StatusCode::UNAUTHORIZED,
                ErrorBody { code: code.into(), trace_id, message },
                code,
            ),
            ApiError::Forbidden { code, trace_id, message } => (
                StatusCode::FORBIDDEN,
                ErrorBody { code: code.into(), trace_id, message },
                code,
            ),
            ApiError::BadRequest { code, trace_id, message } => (
                StatusCode::BAD_REQUEST,
                ErrorBody { code: code.into(), trace_id, message },
                code,
            ),
            ApiError::NotFound { code, trace_id } => (
                StatusCode::NOT_FOUND,
                ErrorBody { code: code.into(), trace_id, message: None },
                code,
            ),
            ApiError::Conflict { code, trace_id, message } => (
                StatusCode::CONFLICT,
                ErrorBody { code: code.into(), trace_id, message },
                code,
            ),
            ApiError::Internal { trace_id, message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody { code: "INTERNAL_ERROR".into(), trace_id, message },
                "INTERNAL_ERROR",
            ),
        };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
