use std::env;

use crate::error::{AuthError, AuthResult};

/// Runtime configuration for JWT verification.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HS256 signing secret shared with the token issuer.
    pub secret: String,
    /// Expected issuer claim (iss).
    pub issuer: String,
    /// Expected audience claim (aud).
    pub audience: String,
    /// Allowable clock skew in seconds when validating exp/nbf.
    pub leeway_seconds: u32,
}

impl JwtConfig {
    /// Construct config with sensible defaults (30 second leeway).
    pub fn new(
        secret: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            leeway_seconds: 30,
        }
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    /// Load from `JWT_SECRET` / `JWT_ISSUER` / `JWT_AUDIENCE` /
    /// `JWT_LEEWAY_SECONDS`. A missing or empty secret fails here, at
    /// startup, never per request.
    pub fn from_env() -> AuthResult<Self> {
        let secret = env::var("JWT_SECRET")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or(AuthError::MissingSecret)?;
        let issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "havenpm".to_string());
        let audience = env::var("JWT_AUDIENCE").unwrap_or_else(|_| "havenpm-api".to_string());

        let mut config = Self::new(secret, issuer, audience);
        if let Some(leeway) = env::var("JWT_LEEWAY_SECONDS")
            .ok()
            .and_then(|value| value.trim().parse::<u32>().ok())
        {
            config.leeway_seconds = leeway;
        }
        Ok(config)
    }
}
