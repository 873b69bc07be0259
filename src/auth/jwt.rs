//! Access Token Issuer
//!
//! Mints and verifies the short-lived HS256 tokens that assert a user's
//! identity on each request.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, ConfigError};

fn signing_secret(config: &JwtSettings) -> Result<&[u8], AppError> {
    if config.secret.trim().is_empty() {
        tracing::error!("JWT signing secret is not configured");
        return Err(AppError::Config(ConfigError::MissingRequired(
            "jwt.secret".to_string(),
        )));
    }
    Ok(config.secret.as_bytes())
}

/// Generate a new access token for a user
///
/// # Errors
/// Returns a configuration error when no signing secret is set
pub fn generate_access_token(user_id: &Uuid, config: &JwtSettings) -> Result<String, AppError> {
    let secret = signing_secret(config)?;
    let claims = Claims::new(*user_id, config.access_token_expiry, config.issuer.clone());

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Validate and extract claims from an access token
///
/// # Errors
/// Returns an auth error if the token is invalid, expired, or tampered with
pub fn validate_access_token(token: &str, config: &JwtSettings) -> Result<Claims, AppError> {
    let secret = signing_secret(config)?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.leeway = 0;

    decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!("JWT validation error: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::Auth(AuthError::TokenExpired)
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AppError::Auth(AuthError::InvalidSignature)
                }
                _ => AppError::Auth(AuthError::MalformedToken),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
        }
    }

    #[test]
    fn test_generate_and_validate_token() {
        let config = get_test_config();
        let user_id = Uuid::new_v4();

        let token = generate_access_token(&user_id, &config).expect("Failed to generate token");
        let claims = validate_access_token(&token, &config).expect("Failed to validate token");

        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.iss, "test");
    }

    #[test]
    fn test_missing_secret_is_a_configuration_error() {
        let mut config = get_test_config();
        config.secret = String::new();

        let result = generate_access_token(&Uuid::new_v4(), &config);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_invalid_token() {
        let config = get_test_config();
        let result = validate_access_token("invalid.token.here", &config);

        assert!(matches!(result, Err(AppError::Auth(_))));
    }

    #[test]
    fn test_tampered_token() {
        let config = get_test_config();
        let token = generate_access_token(&Uuid::new_v4(), &config)
            .expect("Failed to generate token");

        let tampered = format!("{}X", token);
        assert!(validate_access_token(&tampered, &config).is_err());
    }

    #[test]
    fn test_token_signed_with_other_secret() {
        let config = get_test_config();
        let token = generate_access_token(&Uuid::new_v4(), &config)
            .expect("Failed to generate token");

        let mut other = get_test_config();
        other.secret = "a-completely-different-secret-value".to_string();

        assert!(matches!(
            validate_access_token(&token, &other),
            Err(AppError::Auth(AuthError::InvalidSignature))
        ));
    }

    #[test]
    fn test_expired_token() {
        let mut config = get_test_config();
        config.access_token_expiry = -60;
        let token = generate_access_token(&Uuid::new_v4(), &config)
            .expect("Failed to generate token");

        assert!(matches!(
            validate_access_token(&token, &config),
            Err(AppError::Auth(AuthError::TokenExpired))
        ));
    }

    #[test]
    fn test_wrong_issuer() {
        let mut config = get_test_config();
        let token = generate_access_token(&Uuid::new_v4(), &config)
            .expect("Failed to generate token");

        config.issuer = "wrong-issuer".to_string();
        assert!(validate_access_token(&token, &config).is_err());
    }
}
