use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::debug;

use crate::claims::Claims;
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};

/// Verifies HS256 bearer tokens against the server-held secret.
///
/// Verification is a pure function of (secret, token, current time); the
/// verifier performs no I/O and is cheap to share behind an `Arc`.
#[derive(Clone)]
pub struct TokenVerifier {
    config: JwtConfig,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("config", &self.config)
            .field("decoding_key", &"<redacted>")
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(config: JwtConfig) -> AuthResult<Self> {
        if config.secret.trim().is_empty() {
            return Err(AuthError::MissingSecret);
        }
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Ok(Self {
            config,
            decoding_key,
        })
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.issuer.clone()]);
        validation.set_audience(&[self.config.audience.clone()]);
        validation.leeway = self.config.leeway_seconds.into();

        let token_data =
            decode::<Value>(token, &self.decoding_key, &validation).map_err(map_decode_error)?;
        let claims = Claims::try_from(token_data.claims)?;
        debug!(subject = %claims.subject, "verified bearer token");
        Ok(claims)
    }
}

fn map_decode_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        _ => AuthError::Verification(err.to_string()),
    }
}
