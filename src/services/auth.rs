use jsonwebtoken::{decode, DecodingKey, Validation};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::Claims;

/// Authentication service
pub struct AuthService;

impl AuthService {
    /// Validate a JWT against the current secret, then any rotated ones
    pub fn validate_token(token: &str, config: &Config) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let keys = std::iter::once(config.jwt.secret.as_str())
            .chain(config.jwt.previous_secrets.iter().map(|s| s.as_str()));

        for secret in keys {
            match decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation) {
                Ok(token_data) => return Ok(token_data.claims),
                Err(e) => tracing::debug!("Token rejected by one key: {}", e),
            }
        }

        Err(AppError::Unauthorized("Token inválido o expirado".to_string()))
    }
}
