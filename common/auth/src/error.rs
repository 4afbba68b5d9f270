use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header malformed")]
    InvalidAuthorization,
    #[error("token has expired")]
    Expired,
    #[error("token verification failed: {0}")]
    Verification(String),
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("malformed claim payload: {0}")]
    InvalidJson(String),
    #[error("no signing secret configured")]
    MissingSecret,
}

impl AuthError {
    /// Machine-readable reason code surfaced to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthorization | AuthError::InvalidAuthorization => "NO_TOKEN",
            AuthError::Expired => "EXPIRED_TOKEN",
            AuthError::Verification(_)
            | AuthError::InvalidClaim(_, _)
            | AuthError::InvalidJson(_) => "INVALID_TOKEN",
            AuthError::MissingSecret => "AUTH_CONFIG",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // MissingSecret is a startup error; it only renders here if a
        // misconfigured verifier was constructed anyway.
        let status = match &self {
            AuthError::MissingSecret => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        };

        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
