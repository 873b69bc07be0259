//! Authentication Routes
//!
//! Registration, login, refresh token rotation and logout. The access token
//! travels in the JSON body; the refresh token only ever travels in the
//! HttpOnly `refresh_token` cookie.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{
    clear_refresh_cookie, generate_access_token, refresh_cookie, RefreshTokenStore,
    REFRESH_COOKIE_NAME,
};
use crate::configuration::{CookieSettings, JwtSettings};
use crate::domain::UserResponse;
use crate::error::{AppError, AuthError, ErrorContext, ErrorHandler, StorageError};
use crate::middleware::AuthenticatedUser;
use crate::services::UserService;

/// Registration and login request
#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Body returned whenever a new access token is handed out
#[derive(Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    pub token: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub user: UserResponse,
}

#[derive(Serialize)]
struct LogoutResponse {
    success: bool,
    message: String,
    token: String,
}

fn presented_refresh_token(req: &HttpRequest) -> Option<String> {
    req.cookie(REFRESH_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Mint an access token and a refresh token for a freshly authenticated user
async fn start_session(
    user_id: Uuid,
    tokens: &RefreshTokenStore,
    jwt_config: &JwtSettings,
) -> Result<(String, String), AppError> {
    let access_token = generate_access_token(&user_id, jwt_config)?;
    let refresh_token = tokens.issue(user_id).await?;
    Ok((access_token, refresh_token))
}

/// POST /auth/register
///
/// # Errors
/// - 400: invalid email or password
/// - 409: email already registered
pub async fn register(
    form: web::Json<CredentialsRequest>,
    users: web::Data<UserService>,
    tokens: web::Data<RefreshTokenStore>,
    jwt_config: web::Data<JwtSettings>,
    cookie_settings: web::Data<CookieSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");

    let user = users.register(&form.email, &form.password).await?;
    let (access_token, refresh_token) =
        start_session(user.id, tokens.get_ref(), jwt_config.get_ref()).await?;

    tracing::info!(request_id = %context.request_id, user_id = %user.id, "Registration complete");

    Ok(HttpResponse::Created()
        .cookie(refresh_cookie(refresh_token, cookie_settings.get_ref()))
        .json(AuthResponse {
            token: access_token,
            success: true,
            message: Some("Registration successful".to_string()),
            user: UserResponse::from(&user),
        }))
}

/// POST /auth/login
///
/// Unknown email and wrong password get the same 401.
pub async fn login(
    form: web::Json<CredentialsRequest>,
    users: web::Data<UserService>,
    tokens: web::Data<RefreshTokenStore>,
    jwt_config: web::Data<JwtSettings>,
    cookie_settings: web::Data<CookieSettings>,
) -> Result<HttpResponse, AppError> {
    let user = users.login(&form.email, &form.password).await?;
    let (access_token, refresh_token) =
        start_session(user.id, tokens.get_ref(), jwt_config.get_ref()).await?;

    Ok(HttpResponse::Ok()
        .cookie(refresh_cookie(refresh_token, cookie_settings.get_ref()))
        .json(AuthResponse {
            token: access_token,
            success: true,
            message: Some("Login successful".to_string()),
            user: UserResponse::from(&user),
        }))
}

async fn rotate_session(
    raw: &str,
    users: &UserService,
    tokens: &RefreshTokenStore,
    jwt_config: &JwtSettings,
) -> Result<(String, String, UserResponse), AppError> {
    let (refresh_token, user_id) = tokens.validate_and_rotate(raw).await?;

    let user = match users.get_user(user_id).await {
        Ok(user) => user,
        Err(AppError::Storage(StorageError::NotFound(_))) => {
            tracing::warn!(user_id = %user_id, "Refresh token belongs to a deleted user");
            tokens.revoke(&refresh_token).await?;
            return Err(AppError::Auth(AuthError::TokenNotFound));
        }
        Err(e) => {
            // The presented token is already consumed; do not leave an
            // unreachable replacement behind.
            if let Err(revoke_err) = tokens.revoke(&refresh_token).await {
                ErrorContext::new("token_refresh")
                    .with_user_id(user_id.to_string())
                    .log_error(&revoke_err);
            }
            return Err(e);
        }
    };

    let access_token = generate_access_token(&user.id, jwt_config)?;
    Ok((access_token, refresh_token, UserResponse::from(&user)))
}

/// POST /auth/refresh
///
/// Consumes the `refresh_token` cookie and sets its replacement.
///
/// # Errors
/// - 401 with the cookie cleared: missing, malformed, unknown, expired or
///   forged token. The body never says which.
/// - 500: storage or internal failure. The cookie is not touched, but the
///   presented token may already have been consumed, in which case the
///   client has to log in again.
pub async fn refresh(
    req: HttpRequest,
    users: web::Data<UserService>,
    tokens: web::Data<RefreshTokenStore>,
    jwt_config: web::Data<JwtSettings>,
    cookie_settings: web::Data<CookieSettings>,
) -> HttpResponse {
    let context = ErrorContext::new("token_refresh");

    let result = match presented_refresh_token(&req) {
        Some(raw) => rotate_session(&raw, users.get_ref(), tokens.get_ref(), jwt_config.get_ref()).await,
        None => Err(AppError::Auth(AuthError::MissingToken)),
    };

    match result {
        Ok((access_token, refresh_token, user)) => HttpResponse::Ok()
            .cookie(refresh_cookie(refresh_token, cookie_settings.get_ref()))
            .json(AuthResponse {
                token: access_token,
                success: true,
                message: None,
                user,
            }),
        Err(e) if e.is_auth() => {
            context.log_error(&e);
            // One public shape for every rejection reason
            let public = AppError::Auth(AuthError::TokenNotFound);
            let (status, body) = ErrorHandler::error_response(&public, &context.request_id);
            HttpResponse::build(status)
                .cookie(clear_refresh_cookie(cookie_settings.get_ref()))
                .json(body)
        }
        Err(e) => {
            context.log_error(&e);
            let public = AppError::Internal(String::new());
            let (status, body) = ErrorHandler::error_response(&public, &context.request_id);
            HttpResponse::build(status).json(body)
        }
    }
}

/// POST /auth/logout
///
/// Always succeeds and clears the cookie; a storage failure while revoking
/// is logged only.
pub async fn logout(
    req: HttpRequest,
    tokens: web::Data<RefreshTokenStore>,
    cookie_settings: web::Data<CookieSettings>,
) -> HttpResponse {
    if let Some(raw) = presented_refresh_token(&req) {
        if let Err(e) = tokens.revoke(&raw).await {
            ErrorContext::new("logout").log_error(&e);
        }
    }

    HttpResponse::Ok()
        .cookie(clear_refresh_cookie(cookie_settings.get_ref()))
        .json(LogoutResponse {
            success: true,
            message: "Logged out".to_string(),
            token: String::new(),
        })
}

/// POST /auth/logout-all
///
/// Ends every session of the authenticated user.
pub async fn logout_all(
    user: AuthenticatedUser,
    tokens: web::Data<RefreshTokenStore>,
    cookie_settings: web::Data<CookieSettings>,
) -> Result<HttpResponse, AppError> {
    let revoked = tokens.revoke_all_for_user(user.user_id).await.map_err(|e| {
        ErrorContext::new("logout_all")
            .with_user_id(user.user_id.to_string())
            .log_error(&e);
        e
    })?;

    Ok(HttpResponse::Ok()
        .cookie(clear_refresh_cookie(cookie_settings.get_ref()))
        .json(serde_json::json!({
            "success": true,
            "message": "Logged out of all sessions",
            "revoked": revoked,
        })))
}
