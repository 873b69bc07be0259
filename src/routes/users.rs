use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::auth::{refresh_cookie, RefreshTokenStore};
use crate::configuration::CookieSettings;
use crate::domain::{UserResponse, UserUpdate};
use crate::error::{AppError, ErrorContext};
use crate::middleware::AuthenticatedUser;
use crate::services::UserService;

#[derive(Serialize)]
struct UpdateUserResponse {
    success: bool,
    user: UserResponse,
}

/// GET /api/me
pub async fn get_current_user(
    user: AuthenticatedUser,
    users: web::Data<UserService>,
) -> Result<HttpResponse, AppError> {
    let user = users.get_user(user.user_id).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}

/// PATCH /api/me
///
/// A password change ends every other session. The user's refresh tokens
/// are revoked before the new hash is stored, so a storage failure leaves
/// the old password and its sessions in place; the caller then gets a
/// fresh refresh token.
pub async fn update_current_user(
    user: AuthenticatedUser,
    form: web::Json<UserUpdate>,
    users: web::Data<UserService>,
    tokens: web::Data<RefreshTokenStore>,
    cookie_settings: web::Data<CookieSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("update_user").with_user_id(user.user_id.to_string());

    let (updated, password_changed) = users.prepare_update(user.user_id, form.into_inner()).await?;

    if !password_changed {
        users.save(&updated).await?;
        return Ok(HttpResponse::Ok().json(UpdateUserResponse {
            success: true,
            user: UserResponse::from(&updated),
        }));
    }

    let revoked = tokens.revoke_all_for_user(updated.id).await.map_err(|e| {
        context.log_error(&e);
        e
    })?;
    users.save(&updated).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %updated.id,
        revoked,
        "Password changed, sessions reset"
    );

    let mut response = HttpResponse::Ok();
    // The password is already stored; a missing cookie only means the
    // client has to log in again.
    match tokens.issue(updated.id).await {
        Ok(refresh_token) => {
            response.cookie(refresh_cookie(refresh_token, cookie_settings.get_ref()));
        }
        Err(e) => context.log_error(&e),
    }

    Ok(response.json(UpdateUserResponse {
        success: true,
        user: UserResponse::from(&updated),
    }))
}
